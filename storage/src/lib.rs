//! Relational-store capability for the Refit chatbot backend.
//!
//! The chatbot reads whole-table snapshots and runs one model-generated
//! query per chart request; nothing here writes to the database. Results
//! come back as a dynamic [`TableData`] frame because the schema is only
//! known at runtime.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::Value;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, MySqlPool, Row, TypeInfo};
use tracing::{debug, warn};

/// Connection parameters, resolved once at startup and passed by handle.
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A dynamically-typed result frame: column names plus row cells as JSON
/// values (numbers stay numeric, dates become `YYYY-MM-DD` strings).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TableData {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Render the frame as compact text for inclusion in a model prompt.
    pub fn to_prompt_text(&self) -> String {
        let mut out = self.columns.join(" | ");
        for row in &self.rows {
            out.push('\n');
            let line: Vec<String> = row
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect();
            out.push_str(&line.join(" | "));
        }
        out
    }
}

/// Opaque store capability consumed by the chatbot core.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Names of every table in the configured database.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Column names of one table, without reading its data.
    async fn table_columns(&self, table: &str) -> Result<Vec<String>>;

    /// Full contents of one table. `None` when the table is absent or the
    /// read fails; callers fall back to a default table instead of crashing.
    async fn read_table(&self, table: &str) -> Option<TableData>;

    /// Run one read query. Failures come back as an empty frame with a
    /// logged diagnostic; this boundary never raises.
    async fn run_query(&self, sql: &str) -> TableData;
}

/// MariaDB-backed store using a shared connection pool.
#[derive(Clone)]
pub struct MariaDbStore {
    pool: MySqlPool,
}

impl MariaDbStore {
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn with_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_frame(&self, sql: &str) -> Result<TableData> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let data = rows
            .iter()
            .map(|row| (0..row.columns().len()).map(|i| decode_cell(row, i)).collect())
            .collect();

        Ok(TableData::new(columns, data))
    }
}

#[async_trait]
impl TableStore for MariaDbStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SHOW TABLES").fetch_all(&self.pool).await?;
        let tables = rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>(0).ok())
            .collect();
        Ok(tables)
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("SHOW COLUMNS FROM `{}`", table);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let columns = rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>(0).ok())
            .collect();
        Ok(columns)
    }

    async fn read_table(&self, table: &str) -> Option<TableData> {
        let sql = format!("SELECT * FROM `{}`", table);
        match self.fetch_frame(&sql).await {
            Ok(frame) => {
                debug!(table, rows = frame.rows.len(), "table read");
                Some(frame)
            }
            Err(e) => {
                warn!(table, error = %e, "table read failed");
                None
            }
        }
    }

    async fn run_query(&self, sql: &str) -> TableData {
        match self.fetch_frame(sql).await {
            Ok(frame) => {
                debug!(rows = frame.rows.len(), "query executed");
                frame
            }
            Err(e) => {
                warn!(error = %e, "query failed, returning empty frame");
                TableData::default()
            }
        }
    }
}

/// Decode one cell into a JSON value. Numeric types stay numeric so the
/// chart shaper can use them directly; date types are formatted as
/// `YYYY-MM-DD` strings; anything unrecognized falls back to a string.
fn decode_cell(row: &MySqlRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_info().name().to_uppercase();

    if type_name == "BOOLEAN" {
        if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
            return v.map(Value::Bool).unwrap_or(Value::Null);
        }
    }

    if type_name.contains("INT") || type_name == "YEAR" {
        if type_name.contains("UNSIGNED") {
            if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
                return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
            }
        } else if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
        }
    }

    if type_name == "FLOAT" || type_name == "DOUBLE" {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null);
        }
    }

    if type_name.contains("DECIMAL") {
        if let Ok(v) = row.try_get::<Option<rust_decimal::Decimal>, _>(idx) {
            return v
                .and_then(|d| d.to_f64())
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null);
        }
    }

    if type_name == "DATE" {
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            return v
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null);
        }
    }

    if type_name == "DATETIME" || type_name == "TIMESTAMP" {
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return v
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null);
        }
    }

    match row.try_get::<Option<String>, _>(idx) {
        Ok(v) => v.map(Value::String).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_frame() -> TableData {
        TableData::new(
            vec!["name".into(), "price".into()],
            vec![
                vec![json!("티셔츠"), json!(19000)],
                vec![json!("니트"), json!(42000)],
            ],
        )
    }

    #[test]
    fn test_column_index() {
        let frame = sample_frame();
        assert_eq!(frame.column_index("price"), Some(1));
        assert_eq!(frame.column_index("rating"), None);
    }

    #[test]
    fn test_empty_frame() {
        assert!(TableData::default().is_empty());
        assert!(!sample_frame().is_empty());
    }

    #[test]
    fn test_prompt_text_layout() {
        let text = sample_frame().to_prompt_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "name | price");
        assert_eq!(lines[1], "티셔츠 | 19000");
        assert_eq!(lines.len(), 3);
    }
}
