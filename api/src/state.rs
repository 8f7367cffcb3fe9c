use std::sync::Arc;

use catalog::CatalogApi;
use refit_intent::IntentClassifier;
use refit_llm::ChatModel;
use storage::TableStore;

use crate::chatlog::ChatLog;

/// Shared handler state. Every external capability sits behind a trait
/// object so handler tests can inject stubs.
pub struct AppState {
    pub model: Arc<dyn ChatModel>,
    pub store: Arc<dyn TableStore>,
    pub catalog: Arc<dyn CatalogApi>,
    pub classifier: IntentClassifier,
    pub chat_log: ChatLog,
}
