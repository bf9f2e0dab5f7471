//! Explicit dependency bundle for the Ask Worker: no ambient service
//! container — a single struct built once in `main.rs` and threaded through
//! by reference, the same shape as an `AppState`, minus the implicit
//! global access.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::ChatUserCache;
use crate::collaborators::{ChatGateway, EmbeddingClient, MemoryContextProvider, ModelRouter};
use crate::config::queue::QueueConfig;
use crate::config::retrieval::RetrievalConfig;
use crate::context_window::ContextWindowService;
use crate::fusion::FusionOrchestrator;
use crate::intent::{IntentClassifier, NicknameResolver};
use crate::queue::AskQueue;

pub struct Dependencies {
    pub db: PgPool,
    /// Kept alongside the pool because `QueueNotifier` needs a raw connection
    /// string to establish its own `PgListener`, not a pooled connection.
    pub database_url: String,
    pub ask_queue: Arc<AskQueue>,
    pub embed: Arc<dyn EmbeddingClient>,
    pub router: Arc<ModelRouter>,
    pub classifier: Arc<IntentClassifier>,
    pub nickname_resolver: Arc<NicknameResolver>,
    pub user_cache: Arc<ChatUserCache>,
    pub fusion: Arc<FusionOrchestrator>,
    pub context_window: Arc<ContextWindowService>,
    pub chat: Arc<dyn ChatGateway>,
    pub memory: Arc<dyn MemoryContextProvider>,
    pub queue_config: Arc<QueueConfig>,
    pub retrieval_config: Arc<RetrievalConfig>,
}
