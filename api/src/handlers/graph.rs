//! Chart generation: gate the question twice, generate one SELECT over
//! the live schema, run it, and shape the frame for the widget.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::chart::{self, ChartPayload, GateDecision};
use crate::handlers::internal_error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GraphRequest {
    pub message: String,
}

type GraphError = (StatusCode, Json<Value>);

fn rejection(status: StatusCode, message: &str) -> GraphError {
    (status, Json(json!({ "message": message })))
}

pub async fn generate_graph(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GraphRequest>,
) -> Result<Json<ChartPayload>, GraphError> {
    let question = request.message.as_str();
    info!(question, "graph request");

    // Both gates fail open when the model is unreachable: a chart drawn
    // from a weird question beats refusing every question during an
    // outage.
    match chart::is_graph_request(state.model.as_ref(), question).await {
        GateDecision::Classified(false) => {
            return Err(rejection(
                StatusCode::BAD_REQUEST,
                "그래프 생성과 관련없는 질문입니다. 데이터 분석이나 통계 관련 질문을 해주세요.",
            ));
        }
        GateDecision::Unavailable => warn!("graph gate unavailable, failing open"),
        GateDecision::Classified(true) => {}
    }

    match chart::is_db_related(state.model.as_ref(), question).await {
        GateDecision::Classified(false) => {
            return Err(rejection(
                StatusCode::BAD_REQUEST,
                "데이터베이스에 저장된 정보와 관련없는 질문입니다. 상품, 브랜드, 카테고리 등에 대한 질문을 해주세요.",
            ));
        }
        GateDecision::Unavailable => warn!("db gate unavailable, failing open"),
        GateDecision::Classified(true) => {}
    }

    // Live schema description, one line per table.
    let tables = state
        .store
        .list_tables()
        .await
        .map_err(|e| internal_json(internal_error(e)))?;
    let mut schema = String::new();
    for table in &tables {
        match state.store.table_columns(table).await {
            Ok(columns) => {
                schema.push_str(&format!("{}: {}\n", table, columns.join(", ")));
            }
            Err(e) => warn!(table, error = %e, "skipping table in schema description"),
        }
    }

    let sql = chart::generate_sql(state.model.as_ref(), question, &schema)
        .await
        .map_err(|e| internal_json(internal_error(e)))?;

    if !chart::is_select(&sql) {
        warn!(sql, "generated statement is not a SELECT");
        return Err(rejection(
            StatusCode::BAD_REQUEST,
            "그래프 생성에 적합한 데이터를 찾지 못했습니다.",
        ));
    }

    info!(sql, "running generated query");
    let frame = state.store.run_query(&sql).await;
    if frame.is_empty() {
        return Err(rejection(
            StatusCode::NOT_FOUND,
            "관련 데이터가 없어 그래프를 생성할 수 없습니다.",
        ));
    }

    Ok(Json(chart::shape_chart(&frame, question)))
}

fn internal_json((status, message): (StatusCode, String)) -> GraphError {
    (status, Json(json!({ "message": message })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog::{CartAddRequest, CatalogApi, Product, ProductOption};
    use refit_intent::IntentClassifier;
    use refit_llm::{ChatModel, LlmError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use storage::{Result as StorageResult, TableData, TableStore};

    use crate::chart::{DB_GATE_PROMPT, GRAPH_GATE_PROMPT};
    use crate::chatlog::ChatLog;

    /// Answers the two gates by prompt, counts everything else as a SQL
    /// generation call.
    struct GateModel {
        graph_gate: &'static str,
        db_gate: &'static str,
        sql: &'static str,
        sql_calls: AtomicU32,
    }

    #[async_trait]
    impl ChatModel for GateModel {
        async fn complete(
            &self,
            system_prompt: &str,
            _user_text: &str,
        ) -> std::result::Result<String, LlmError> {
            if system_prompt == GRAPH_GATE_PROMPT {
                return Ok(self.graph_gate.to_string());
            }
            if system_prompt == DB_GATE_PROMPT {
                return Ok(self.db_gate.to_string());
            }
            self.sql_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.sql.to_string())
        }
    }

    struct StubStore {
        frame: TableData,
    }

    #[async_trait]
    impl TableStore for StubStore {
        async fn list_tables(&self) -> StorageResult<Vec<String>> {
            Ok(vec!["products".to_string()])
        }

        async fn table_columns(&self, _table: &str) -> StorageResult<Vec<String>> {
            Ok(self.frame.columns.clone())
        }

        async fn read_table(&self, _table: &str) -> Option<TableData> {
            Some(self.frame.clone())
        }

        async fn run_query(&self, _sql: &str) -> TableData {
            self.frame.clone()
        }
    }

    struct NoCatalog;

    #[async_trait]
    impl CatalogApi for NoCatalog {
        async fn search_products(&self, _keyword: &str, _page: u32, _size: u32) -> Vec<Product> {
            Vec::new()
        }

        async fn product_options(&self, _product_id: i64) -> Vec<ProductOption> {
            Vec::new()
        }

        async fn add_to_cart(&self, _request: &CartAddRequest, _access_token: &str) -> bool {
            false
        }
    }

    fn state_with(model: Arc<GateModel>, frame: TableData) -> Arc<AppState> {
        Arc::new(AppState {
            classifier: IntentClassifier::new(model.clone()),
            model,
            store: Arc::new(StubStore { frame }),
            catalog: Arc::new(NoCatalog),
            chat_log: ChatLog::new(tempfile::tempdir().unwrap().into_path()),
        })
    }

    fn product_frame() -> TableData {
        TableData::new(
            vec!["product_id".into(), "name".into(), "price".into()],
            vec![
                vec![1.into(), "티셔츠".into(), 19000.into()],
                vec![2.into(), "니트".into(), 42000.into()],
            ],
        )
    }

    #[tokio::test]
    async fn test_off_topic_question_rejected_before_sql() {
        let model = Arc::new(GateModel {
            graph_gate: "NO",
            db_gate: "YES",
            sql: "SELECT name, price FROM products",
            sql_calls: AtomicU32::new(0),
        });
        let state = state_with(model.clone(), product_frame());

        let err = generate_graph(
            State(state),
            Json(GraphRequest {
                message: "오늘 날씨는 어때?".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(err.1["message"]
            .as_str()
            .unwrap()
            .contains("그래프 생성과 관련없는"));
        // The rejected question never reached SQL generation.
        assert_eq!(model.sql_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_db_question_rejected_before_sql() {
        let model = Arc::new(GateModel {
            graph_gate: "YES",
            db_gate: "NO",
            sql: "SELECT name, price FROM products",
            sql_calls: AtomicU32::new(0),
        });
        let state = state_with(model.clone(), product_frame());

        let err = generate_graph(
            State(state),
            Json(GraphRequest {
                message: "주식 시세 그래프 그려줘".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(err.1["message"]
            .as_str()
            .unwrap()
            .contains("데이터베이스에 저장된 정보와 관련없는"));
        assert_eq!(model.sql_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_select_statement_rejected() {
        let model = Arc::new(GateModel {
            graph_gate: "YES",
            db_gate: "YES",
            sql: "DROP TABLE products",
            sql_calls: AtomicU32::new(0),
        });
        let state = state_with(model, product_frame());

        let err = generate_graph(
            State(state),
            Json(GraphRequest {
                message: "상품 테이블 지워줘".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(err.1["message"].as_str().unwrap().contains("적합한 데이터"));
    }

    #[tokio::test]
    async fn test_empty_result_maps_to_not_found() {
        let model = Arc::new(GateModel {
            graph_gate: "YES",
            db_gate: "YES",
            sql: "SELECT name, price FROM products WHERE price > 999999",
            sql_calls: AtomicU32::new(0),
        });
        let state = state_with(model, TableData::default());

        let err = generate_graph(
            State(state),
            Json(GraphRequest {
                message: "가장 비싼 상품".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_happy_path_shapes_payload() {
        let model = Arc::new(GateModel {
            graph_gate: "YES",
            db_gate: "YES",
            sql: "```sql\nSELECT product_id, name, price FROM products\n```",
            sql_calls: AtomicU32::new(0),
        });
        let state = state_with(model, product_frame());

        let Json(payload) = generate_graph(
            State(state),
            Json(GraphRequest {
                message: "가장 비싼 상품 보여줘".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(payload.title, "가장 비싼 상품 순위");
        assert_eq!(payload.categories, vec!["티셔츠", "니트"]);
        assert_eq!(payload.product_ids, vec![Some(1), Some(2)]);
        assert_eq!(payload.x_axis_title, "상품명");
    }
}
