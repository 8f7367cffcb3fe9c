use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use refit_intent::{response_template, Intent};

use crate::handlers::internal_error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VoiceRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct VoiceResponse {
    pub response: String,
}

/// Voice turn: the model picks one table for the transcribed question,
/// then answers grounded in that table's data. There is no intent
/// classification on this path; the general template is used throughout.
pub async fn voice_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VoiceRequest>,
) -> Result<Json<VoiceResponse>, (StatusCode, String)> {
    let tables = state.store.list_tables().await.map_err(internal_error)?;

    let pick_prompt = format!(
        "이 질문을 해결하기 위해 어떤 테이블을 참조해야 할까?\n\
         내가 가진 테이블 목록: {}\n\
         테이블 이름만 반환해줘. 예시: products",
        tables.join(", ")
    );
    let pick = state
        .model
        .complete(&pick_prompt, &request.text)
        .await
        .map_err(internal_error)?;
    let table = pick
        .trim()
        .trim_matches(|c| c == '\'' || c == '"' || c == '`')
        .to_string();

    let frame = match state.store.read_table(&table).await {
        Some(frame) if !frame.is_empty() => frame,
        _ => {
            info!(table, "voice table pick empty or absent, falling back to products");
            state.store.read_table("products").await.unwrap_or_default()
        }
    };

    let system_prompt = format!(
        "{}\n\n참고할 DB 정보:\n{}",
        response_template(&Intent::GeneralInquiry),
        frame.to_prompt_text()
    );
    let answer = state
        .model
        .complete(&system_prompt, &request.text)
        .await
        .map_err(internal_error)?;

    Ok(Json(VoiceResponse { response: answer }))
}
