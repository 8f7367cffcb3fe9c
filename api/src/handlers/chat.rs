use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Connectivity check for the chat widget: echoes the message back.
pub async fn chat_echo(Json(request): Json<ChatRequest>) -> Json<ChatResponse> {
    Json(ChatResponse {
        response: request.message,
    })
}
