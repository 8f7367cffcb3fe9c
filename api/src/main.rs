mod cart;
mod chart;
mod chatlog;
mod config;
mod handlers;
mod navigation;
mod server;
mod state;

use anyhow::Result;

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    server::start_server(config).await
}
