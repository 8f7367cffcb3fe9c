use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::{routing::get, routing::post, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use storage::MariaDbStore;
use tracing::info;

use catalog::CatalogClient;
use refit_intent::IntentClassifier;
use refit_llm::OpenAiChat;

use crate::chatlog::ChatLog;
use crate::config::AppConfig;
use crate::handlers::{chat_echo, filter_message, generate_graph, voice_chat};
use crate::state::AppState;

pub async fn start_server(config: AppConfig) -> anyhow::Result<()> {
    // Initialize logging with custom format
    tracing_subscriber::fmt()
        .with_target(false) // Remove module path
        .with_file(true)
        .with_line_number(true)
        .compact()
        .init();

    info!(
        "Refit Chatbot Backend starting on port {}...",
        config.listen_port
    );

    info!("Connecting to MariaDB at {}:{}...", config.db.host, config.db.port);
    let store = Arc::new(
        MariaDbStore::connect(&config.db)
            .await
            .context("failed to connect to database")?,
    );

    let model = Arc::new(OpenAiChat::new(&config.openai_api_key).with_model(&config.openai_model));

    info!("Using catalog service at {}", config.catalog_base_url);
    let catalog = Arc::new(CatalogClient::new(&config.catalog_base_url));

    let app_state = Arc::new(AppState {
        classifier: IntentClassifier::new(model.clone()),
        model,
        store,
        catalog,
        chat_log: ChatLog::new(&config.chat_log_dir),
    });

    // The web frontend is served separately during development.
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/chat", post(chat_echo))
        .route("/voice", post(voice_chat))
        .route("/filter", post(filter_message))
        .route("/graph", post(generate_graph))
        .with_state(app_state)
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root_handler() -> &'static str {
    "Hello from Refit Chatbot Backend!"
}
