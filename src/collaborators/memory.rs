//! External memory service: builds a short user/chat
//! profile used by the answer generator, out of scope to implement here
//! (opaque collaborator, matching the persisted-config-store and
//! admin/debug reporting exclusions elsewhere in this crate).

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait MemoryContextProvider: Send + Sync {
    async fn build_context(&self, chat_id: i64, user_id: i64) -> Result<Option<String>>;

    /// Fire-and-forget update after an ask completes.
    async fn record_interaction(&self, chat_id: i64, user_id: i64, question: &str, answer: &str);
}

/// Used when no external memory service is configured: every call returns
/// no context and the recorder is a no-op.
pub struct NullMemoryContextProvider;

#[async_trait]
impl MemoryContextProvider for NullMemoryContextProvider {
    async fn build_context(&self, _chat_id: i64, _user_id: i64) -> Result<Option<String>> {
        Ok(None)
    }

    async fn record_interaction(&self, _chat_id: i64, _user_id: i64, _question: &str, _answer: &str) {}
}
