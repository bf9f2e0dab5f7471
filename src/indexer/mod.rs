//! Sliding-Window Indexer: segments chat history into
//! dialogs, builds overlapping windows, embeds each with the passage task
//! and a "late chunking" hint, upserts by `(chat_id, center_message_id)`.

pub mod segmentation;
pub mod windows;

use std::sync::Arc;

use anyhow::Result;
use pgvector::Vector;
use sqlx::PgPool;
use tracing::info;

use crate::collaborators::{EmbedTask, EmbeddingClient};
use crate::models::Message;

pub use segmentation::segment_into_dialogs;
pub use windows::{build_windows, DialogWindow};

pub struct SlidingWindowIndexer {
    db: PgPool,
    embed: Arc<dyn EmbeddingClient>,
}

impl SlidingWindowIndexer {
    pub fn new(db: PgPool, embed: Arc<dyn EmbeddingClient>) -> Self {
        Self { db, embed }
    }

    /// Rebuilds window embeddings for an entire chat's message history.
    pub async fn rebuild(&self, chat_id: i64, messages: &[Message]) -> Result<usize> {
        let dialogs = segment_into_dialogs(messages);
        let all_windows: Vec<DialogWindow> =
            dialogs.iter().flat_map(|d| build_windows(d)).collect();

        if all_windows.is_empty() {
            return Ok(0);
        }

        // Late chunking: embed all windows from this rebuild together so
        // each one's embedding is computed with awareness of the batch.
        let texts: Vec<String> = all_windows.iter().map(|w| w.text.clone()).collect();
        let embeddings = self.embed.embed_batch(&texts, EmbedTask::Passage, true).await?;

        let mut tx = self.db.begin().await?;
        for (window, embedding) in all_windows.iter().zip(embeddings.into_iter()) {
            sqlx::query(
                r#"
                INSERT INTO context_embeddings
                    (chat_id, center_message_id, window_start_id, window_end_id, message_ids,
                     context_text, embedding, window_size, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
                ON CONFLICT (chat_id, center_message_id)
                DO UPDATE SET window_start_id = EXCLUDED.window_start_id,
                              window_end_id = EXCLUDED.window_end_id,
                              message_ids = EXCLUDED.message_ids,
                              context_text = EXCLUDED.context_text,
                              embedding = EXCLUDED.embedding,
                              window_size = EXCLUDED.window_size,
                              created_at = now()
                "#,
            )
            .bind(chat_id)
            .bind(window.center_id)
            .bind(window.start_id)
            .bind(window.end_id)
            .bind(&window.message_ids)
            .bind(&window.text)
            .bind(Vector::from(embedding))
            .bind(window.message_ids.len() as i32)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(chat_id, dialogs = dialogs.len(), windows = all_windows.len(), "rebuilt sliding windows");
        Ok(all_windows.len())
    }
}
