//! NL→SQL→chart pipeline pieces: the two yes/no gates, SQL generation,
//! and shaping a dynamic result frame into a chart payload.
//!
//! Shaping never fails outward — a frame the shaper cannot make sense of
//! becomes an empty-series payload with an `error` field, because the
//! widget renders that more gracefully than a 500.

use serde::Serialize;
use serde_json::Value;
use storage::TableData;
use tracing::warn;

use refit_llm::ChatModel;

/// Column names treated as row identifiers: carried as `productIds` for
/// click-through, never plotted as an axis. Resolved once per frame.
pub const ID_COLUMN_ALIASES: [&str; 4] = ["id", "product_id", "productId", "p_id"];

pub(crate) const GRAPH_GATE_PROMPT: &str = "너는 질문 분류기야. 사용자의 질문이 데이터 분석, 통계, 순위, 비교, 분포 등 \
     그래프로 표현할 만한 질문인지 판단해줘.\n\
     그래프로 표현할 만한 질문이면 \"YES\", 아니면 \"NO\"로만 답해줘.";

pub(crate) const DB_GATE_PROMPT: &str = "너는 질문 분류기야. 사용자의 질문이 의류 쇼핑몰 데이터베이스(상품, 브랜드, \
     카테고리, 주문, 리뷰, 회원 등)로 답할 수 있는 질문인지 판단해줘.\n\
     데이터베이스로 답할 수 있으면 \"YES\", 아니면 \"NO\"로만 답해줘.";

/// A yes/no gate either classified the question or could not run at all.
/// Callers choose what an unavailable gate means; the graph pipeline
/// fails open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Classified(bool),
    Unavailable,
}

impl GateDecision {
    pub fn allow_failing_open(self) -> bool {
        match self {
            GateDecision::Classified(allowed) => allowed,
            GateDecision::Unavailable => true,
        }
    }
}

async fn yes_no_gate(model: &dyn ChatModel, prompt: &str, question: &str) -> GateDecision {
    match model.complete(prompt, question).await {
        Ok(response) => match response.trim().to_uppercase().as_str() {
            "YES" => GateDecision::Classified(true),
            "NO" => GateDecision::Classified(false),
            other => {
                // Unexpected verdicts count as a pass, same as an outage.
                warn!(verdict = %other, "gate returned unexpected verdict");
                GateDecision::Classified(true)
            }
        },
        Err(e) => {
            warn!(error = %e, "gate unavailable");
            GateDecision::Unavailable
        }
    }
}

pub async fn is_graph_request(model: &dyn ChatModel, question: &str) -> GateDecision {
    yes_no_gate(model, GRAPH_GATE_PROMPT, question).await
}

pub async fn is_db_related(model: &dyn ChatModel, question: &str) -> GateDecision {
    yes_no_gate(model, DB_GATE_PROMPT, question).await
}

/// Ask the model for one SELECT over the given schema. The response is
/// only cleaned up here; the caller enforces the SELECT-prefix check.
pub async fn generate_sql(
    model: &dyn ChatModel,
    question: &str,
    schema_description: &str,
) -> refit_llm::Result<String> {
    let prompt = format!(
        "너는 MariaDB SQL 전문가야. 아래 스키마를 보고 사용자 질문에 답하는 SELECT 쿼리 하나를 작성해줘.\n\n\
         스키마:\n{}\n\n\
         규칙:\n\
         - 상품 차트라면 상품명(name) 컬럼을 먼저 선택하고, 클릭 이동을 위해 product_id도 포함해\n\
         - 집계 질문이면 GROUP BY와 적절한 집계 함수를 사용해\n\
         - 결과는 10행 이내로 LIMIT을 걸어줘\n\
         - SELECT 쿼리만 작성해. INSERT, UPDATE, DELETE, DROP은 절대 금지\n\
         - 세미콜론 없이 SQL 문장만 반환해. 설명도 붙이지 마",
        schema_description
    );

    let response = model.complete(&prompt, question).await?;
    Ok(clean_sql(&response))
}

/// Strip markdown fences and quote wrapping from a generated query.
pub fn clean_sql(response: &str) -> String {
    response
        .trim()
        .trim_start_matches("```sql")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .trim_matches(|c| c == '\'' || c == '"' || c == '`')
        .trim()
        .to_string()
}

/// Advisory check only: the real protection is the read-only DB account.
pub fn is_select(sql: &str) -> bool {
    sql.trim_start().to_lowercase().starts_with("select")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub data: Vec<f64>,
}

/// Wire payload for the chart widget.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartPayload {
    pub series: Vec<ChartSeries>,
    pub categories: Vec<String>,
    pub title: String,
    pub x_axis_title: String,
    pub y_axis_title: String,
    pub chart_type: ChartType,
    pub product_ids: Vec<Option<i64>>,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shape a result frame into a chart. Infallible: unshapeable frames
/// degrade to an empty payload carrying an error message.
pub fn shape_chart(frame: &TableData, question: &str) -> ChartPayload {
    match try_shape(frame, question) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "chart shaping failed");
            ChartPayload {
                series: Vec::new(),
                categories: Vec::new(),
                title: "상품 데이터 분석".to_string(),
                x_axis_title: String::new(),
                y_axis_title: String::new(),
                chart_type: ChartType::Bar,
                product_ids: Vec::new(),
                question: question.to_string(),
                error: Some("데이터 변환 중 오류가 발생했습니다.".to_string()),
            }
        }
    }
}

fn try_shape(frame: &TableData, question: &str) -> anyhow::Result<ChartPayload> {
    if frame.columns.is_empty() {
        anyhow::bail!("result frame has no columns");
    }

    let id_index = frame
        .columns
        .iter()
        .position(|c| ID_COLUMN_ALIASES.contains(&c.as_str()));
    let plotted: Vec<usize> = (0..frame.columns.len())
        .filter(|i| Some(*i) != id_index)
        .collect();

    let product_ids: Vec<Option<i64>> = match id_index {
        Some(idx) => frame
            .rows
            .iter()
            .map(|row| row.get(idx).and_then(Value::as_i64))
            .collect(),
        None => vec![None; frame.rows.len()],
    };

    let mut payload = match plotted.len() {
        // Identifier-only result: nothing to plot, so render fixed
        // placeholder bars the widget can still draw.
        0 => ChartPayload {
            series: vec![ChartSeries {
                name: "값".to_string(),
                data: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            }],
            categories: (1..=5).map(|i| format!("항목 {}", i)).collect(),
            title: String::new(),
            x_axis_title: "항목".to_string(),
            y_axis_title: "값".to_string(),
            chart_type: ChartType::Bar,
            product_ids: vec![None; 5],
            question: String::new(),
            error: None,
        },
        // Single value column: synthetic category labels.
        1 => {
            let col = plotted[0];
            ChartPayload {
                series: vec![ChartSeries {
                    name: frame.columns[col].clone(),
                    data: frame.rows.iter().map(|row| cell_number(row, col)).collect(),
                }],
                categories: (1..=frame.rows.len()).map(|i| format!("항목 {}", i)).collect(),
                title: String::new(),
                x_axis_title: "항목".to_string(),
                y_axis_title: frame.columns[col].clone(),
                chart_type: ChartType::Bar,
                product_ids,
                question: String::new(),
                error: None,
            }
        }
        // Two columns: first is the category axis, second the values.
        2 => {
            let x_col = plotted[0];
            let y_col = plotted[1];
            let all_labels = frame
                .rows
                .iter()
                .all(|row| row.get(x_col).map_or(false, Value::is_string));
            ChartPayload {
                series: vec![ChartSeries {
                    name: frame.columns[y_col].clone(),
                    data: frame.rows.iter().map(|row| cell_number(row, y_col)).collect(),
                }],
                categories: frame.rows.iter().map(|row| cell_label(row, x_col)).collect(),
                title: String::new(),
                x_axis_title: frame.columns[x_col].clone(),
                y_axis_title: frame.columns[y_col].clone(),
                chart_type: if all_labels { ChartType::Bar } else { ChartType::Line },
                product_ids,
                question: String::new(),
                error: None,
            }
        }
        // Wide result: one series per remaining column.
        _ => {
            let x_col = plotted[0];
            let series = plotted[1..]
                .iter()
                .map(|&col| ChartSeries {
                    name: frame.columns[col].clone(),
                    data: frame.rows.iter().map(|row| cell_number(row, col)).collect(),
                })
                .collect();
            ChartPayload {
                series,
                categories: frame.rows.iter().map(|row| cell_label(row, x_col)).collect(),
                title: String::new(),
                x_axis_title: frame.columns[x_col].clone(),
                y_axis_title: "값".to_string(),
                chart_type: ChartType::Bar,
                product_ids,
                question: String::new(),
                error: None,
            }
        }
    };

    payload.title = title_for(question).to_string();
    payload.x_axis_title = x_axis_title(&payload.x_axis_title);
    payload.y_axis_title = y_axis_title(&payload.y_axis_title);
    apply_type_override(&mut payload, question);
    payload.question = question.to_string();

    Ok(payload)
}

// Short rows read as zero/empty so one ragged row cannot take down the
// whole payload.
fn cell_number(row: &[Value], idx: usize) -> f64 {
    row.get(idx).and_then(Value::as_f64).unwrap_or(0.0)
}

fn cell_label(row: &[Value], idx: usize) -> String {
    match row.get(idx) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Chart title from question phrasing, first match wins.
fn title_for(question: &str) -> &'static str {
    if question.contains("가장 비싼") {
        "가장 비싼 상품 순위"
    } else if question.contains("가장 싼") || question.contains("가장 저렴한") {
        "가장 저렴한 상품 순위"
    } else if question.contains("평점 높은") || question.contains("평점이 높은") {
        "평점 높은 상품 순위"
    } else if question.contains("평점 낮은") || question.contains("평점이 낮은") {
        "평점 낮은 상품 순위"
    } else if question.contains("인기") {
        "인기 상품 순위"
    } else if question.contains("리뷰") && question.contains("많은") {
        "리뷰가 많은 상품 순위"
    } else if question.contains("리뷰") && question.contains("적은") {
        "리뷰가 적은 상품 순위"
    } else if question.contains("브랜드별") {
        "브랜드별 상품 분석"
    } else if question.contains("카테고리별") {
        "카테고리별 상품 분석"
    } else if question.contains("가격대별") || question.contains("가격별") {
        "가격대별 상품 분포"
    } else {
        "상품 데이터 분석"
    }
}

fn x_axis_title(column: &str) -> String {
    if column == "name" {
        "상품명".to_string()
    } else if column == "brand_name" || column.contains("브랜드") {
        "브랜드".to_string()
    } else if column == "category_name" || column.contains("카테고리") {
        "카테고리".to_string()
    } else if column.contains("price") {
        "가격".to_string()
    } else if column.contains("rating") {
        "평점".to_string()
    } else {
        column.to_string()
    }
}

fn y_axis_title(column: &str) -> String {
    if column == "price" {
        "가격 (원)".to_string()
    } else if column == "rating" {
        "평점".to_string()
    } else if column.contains("count") || column.contains("개수") {
        "개수".to_string()
    } else if column.contains("평균") || column.contains("average") {
        "평균값".to_string()
    } else if column.contains("합계") || column.contains("sum") {
        "합계".to_string()
    } else {
        column.to_string()
    }
}

/// Question phrasing overrides the structural chart-type choice.
fn apply_type_override(payload: &mut ChartPayload, question: &str) {
    if question.contains("선") || question.contains("트렌드") || question.contains("변화") {
        payload.chart_type = ChartType::Line;
    } else if question.contains("비율") || question.contains("분포") {
        payload.chart_type = ChartType::Pie;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use refit_llm::LlmError;
    use serde_json::json;

    struct DownModel;

    #[async_trait]
    impl ChatModel for DownModel {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_text: &str,
        ) -> std::result::Result<String, LlmError> {
            Err(LlmError::Network("connection refused".into()))
        }
    }

    fn frame(columns: &[&str], rows: Vec<Vec<Value>>) -> TableData {
        TableData::new(columns.iter().map(|s| s.to_string()).collect(), rows)
    }

    #[tokio::test]
    async fn test_gate_outage_is_distinguishable_and_fails_open() {
        let decision = is_graph_request(&DownModel, "브랜드별 상품 수").await;
        assert_eq!(decision, GateDecision::Unavailable);
        assert!(decision.allow_failing_open());
        assert!(!GateDecision::Classified(false).allow_failing_open());
    }

    #[test]
    fn test_clean_sql_strips_fences_and_quotes() {
        let sql = clean_sql("```sql\nSELECT name, price FROM products\n```");
        assert_eq!(sql, "SELECT name, price FROM products");
        assert!(is_select(&sql));
        assert!(is_select("  select 1"));
        assert!(!is_select("DROP TABLE products"));
    }

    #[test]
    fn test_two_columns_with_id_keeps_lengths_aligned() {
        let data = frame(
            &["product_id", "name", "price"],
            vec![
                vec![json!(3), json!("나이키 에어맥스"), json!(129000)],
                vec![json!(7), json!("아디다스 삼바"), json!(99000)],
            ],
        );
        let payload = shape_chart(&data, "가장 비싼 상품 보여줘");

        assert_eq!(payload.series.len(), 1);
        assert_eq!(payload.series[0].data.len(), 2);
        assert_eq!(payload.categories.len(), 2);
        assert_eq!(payload.product_ids, vec![Some(3), Some(7)]);
        // The id column must never become an axis.
        assert_eq!(payload.x_axis_title, "상품명");
        assert_eq!(payload.y_axis_title, "가격 (원)");
        assert_eq!(payload.title, "가장 비싼 상품 순위");
        assert_eq!(payload.chart_type, ChartType::Bar);
        assert!(payload.error.is_none());
    }

    #[test]
    fn test_identifier_only_result_renders_placeholders() {
        let data = frame(&["product_id"], vec![vec![json!(1)], vec![json!(2)]]);
        let payload = shape_chart(&data, "상품 아이디");

        assert_eq!(payload.series[0].data, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let expected: Vec<String> = (1..=5).map(|i| format!("항목 {}", i)).collect();
        assert_eq!(payload.categories, expected);
        assert_eq!(payload.product_ids, vec![None; 5]);
    }

    #[test]
    fn test_single_value_column_gets_synthetic_categories() {
        let data = frame(&["price"], vec![vec![json!(1000)], vec![json!(2000)]]);
        let payload = shape_chart(&data, "가격만");
        assert_eq!(payload.categories, vec!["항목 1", "항목 2"]);
        assert_eq!(payload.series[0].data, vec![1000.0, 2000.0]);
        assert_eq!(payload.x_axis_title, "항목");
    }

    #[test]
    fn test_numeric_x_axis_selects_line() {
        let data = frame(
            &["price", "rating"],
            vec![vec![json!(1000), json!(4.5)], vec![json!(2000), json!(3.9)]],
        );
        let payload = shape_chart(&data, "가격과 평점");
        assert_eq!(payload.chart_type, ChartType::Line);
    }

    #[test]
    fn test_question_phrasing_overrides_chart_type() {
        let data = frame(
            &["brand_name", "cnt"],
            vec![vec![json!("나이키"), json!(4)], vec![json!("아디다스"), json!(6)]],
        );
        let payload = shape_chart(&data, "브랜드별 상품 분포 알려줘");
        assert_eq!(payload.chart_type, ChartType::Pie);

        let payload = shape_chart(&data, "브랜드별 상품 수 변화");
        assert_eq!(payload.chart_type, ChartType::Line);
    }

    #[test]
    fn test_wide_result_builds_one_series_per_column() {
        let data = frame(
            &["id", "name", "price", "rating"],
            vec![
                vec![json!(1), json!("티셔츠"), json!(19000), json!(4.2)],
                vec![json!(2), json!("니트"), json!(42000), json!(4.8)],
            ],
        );
        let payload = shape_chart(&data, "상품 지표 비교");
        assert_eq!(payload.series.len(), 2);
        assert_eq!(payload.series[0].name, "price");
        assert_eq!(payload.series[1].name, "rating");
        assert_eq!(payload.categories, vec!["티셔츠", "니트"]);
        assert_eq!(payload.y_axis_title, "값");
    }

    #[test]
    fn test_empty_column_set_degrades_to_error_payload() {
        let payload = shape_chart(&TableData::default(), "뭐든");
        assert!(payload.series.is_empty());
        assert!(payload.error.is_some());
    }
}
