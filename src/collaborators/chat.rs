//! `ChatSendMessage`/`ChatSendChatAction`: the chat transport
//! itself is out of scope; this trait is the seam the worker calls through,
//! modeled the same way `MemoryStore` is a trait seam for a storage backend
//! the core never constructs directly.

use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
}

#[derive(Debug)]
pub enum SendOutcome {
    Sent,
    /// HTML parse failure: caller should
    /// strip tags and resend as plain text.
    ParseError,
    /// Chat is permanently unreachable; abort without retry.
    DeactivatedChat,
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        html: bool,
    ) -> Result<SendOutcome>;

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> Result<()>;
}

/// Placeholder until the real chat adapter (e.g. a Telegram bot client) is
/// wired in — the transport itself is out of scope here, but
/// the worker still needs a concrete `ChatGateway` to construct against.
pub struct LoggingChatGateway;

#[async_trait]
impl ChatGateway for LoggingChatGateway {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        _reply_to: Option<i64>,
        _html: bool,
    ) -> Result<SendOutcome> {
        tracing::info!(chat_id, chars = text.len(), "would send message (no chat transport configured)");
        Ok(SendOutcome::Sent)
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> Result<()> {
        tracing::debug!(chat_id, ?action, "would send chat action (no chat transport configured)");
        Ok(())
    }
}
