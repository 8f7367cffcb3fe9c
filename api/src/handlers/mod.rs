mod chat;
mod filter;
mod graph;
mod voice;

pub use chat::chat_echo;
pub use filter::filter_message;
pub use graph::generate_graph;
pub use voice::voice_chat;

use axum::http::StatusCode;

/// Map an internal failure to a 500 with a terse body; details go to the
/// log, not to the client.
pub(crate) fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error = %e, "handler failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "요청 처리 중 오류가 발생했습니다.".to_string(),
    )
}
