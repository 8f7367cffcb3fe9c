//! Process configuration, resolved once at startup from the environment
//! (a `.env` file is loaded first when present).

use anyhow::{Context, Result};
use std::path::PathBuf;
use storage::DbConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_port: u16,
    pub db: DbConfig,
    pub openai_api_key: String,
    pub openai_model: String,
    pub catalog_base_url: String,
    pub chat_log_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            listen_port: var_or("REFIT_CHATBOT_PORT", "8000")
                .parse()
                .context("REFIT_CHATBOT_PORT is not a valid port")?,
            db: DbConfig {
                host: var_or("REFIT_DB_HOST", "localhost"),
                port: var_or("REFIT_DB_PORT", "3306")
                    .parse()
                    .context("REFIT_DB_PORT is not a valid port")?,
                user: var("REFIT_DB_USER")?,
                password: var("REFIT_DB_PASSWORD")?,
                database: var("REFIT_DB_NAME")?,
            },
            openai_api_key: var("OPENAI_API_KEY")?,
            openai_model: var_or("REFIT_CHAT_MODEL", "gpt-4o-mini"),
            catalog_base_url: var_or("REFIT_CATALOG_URL", "http://localhost:8080/api"),
            chat_log_dir: var_or("REFIT_CHAT_LOG_DIR", "chat_logs").into(),
        })
    }
}

fn var(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} is not set", name))
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
