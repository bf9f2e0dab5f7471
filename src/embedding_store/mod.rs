//! Embedding Store: upsert of per-utterance embeddings,
//! batch grouping of consecutive same-author messages, rename, and GC.
//!
//! Batching/retry idiom grounded on `backend/src/memory/features/
//! embedding.rs`'s `batch_embed_texts`; the storage seam follows the shape
//! of `backend/src/memory/core/traits.rs`'s `MemoryStore` trait, retargeted
//! from an ad-hoc Qdrant/SQLite pair to a single Postgres+pgvector table.

pub mod grouping;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use pgvector::Vector;
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::{info, warn};

use crate::collaborators::{EmbedTask, EmbeddingClient};
use crate::config::llm::EmbeddingConfig;
use crate::models::Message;

pub use grouping::{group_consecutive_messages, MessageGroup};

pub struct EmbeddingStore {
    db: PgPool,
    embed: Arc<dyn EmbeddingClient>,
    config: Arc<EmbeddingConfig>,
}

#[derive(Debug, Default)]
pub struct EmbeddingStats {
    pub total_rows: i64,
    pub chats: i64,
}

impl EmbeddingStore {
    pub fn new(db: PgPool, embed: Arc<dyn EmbeddingClient>, config: Arc<EmbeddingConfig>) -> Self {
        Self { db, embed, config }
    }

    /// Upsert a single message as a passage embedding.
    pub async fn store(&self, message: &Message) -> Result<()> {
        self.store_batch(std::slice::from_ref(message)).await
    }

    /// Groups consecutive same-author messages, embeds each
    /// group in batches of `max_batch_size` with a bounded retry loop, and
    /// upserts.
    pub async fn store_batch(&self, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        let groups = group_consecutive_messages(messages);
        let texts: Vec<String> = groups.iter().map(|g| g.embedding_text()).collect();

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.max_batch_size) {
            let mut retry = 0u32;
            let embeddings = loop {
                match self.embed.embed_batch(chunk, EmbedTask::Passage, true).await {
                    Ok(e) => break e,
                    Err(e) if retry < 3 => {
                        retry += 1;
                        warn!(attempt = retry, err = %e, "batch embedding failed, retrying");
                        tokio::time::sleep(Duration::from_millis(500 * retry as u64)).await;
                    }
                    Err(e) => return Err(e).context("batch embedding failed after retries"),
                }
            };
            all_embeddings.extend(embeddings);
        }

        let mut tx = self.db.begin().await?;
        for (group, embedding) in groups.iter().zip(all_embeddings.into_iter()) {
            let metadata = group.metadata_json();
            sqlx::query(
                r#"
                INSERT INTO message_embeddings
                    (chat_id, message_id, chunk_index, chunk_text, embedding, metadata, is_question, created_at)
                VALUES ($1, $2, 0, $3, $4, $5, false, now())
                ON CONFLICT (chat_id, message_id, chunk_index)
                DO UPDATE SET chunk_text = EXCLUDED.chunk_text,
                              embedding = EXCLUDED.embedding,
                              metadata = EXCLUDED.metadata,
                              created_at = now()
                "#,
            )
            .bind(group.chat_id)
            .bind(group.keyed_message_id())
            .bind(group.embedding_text())
            .bind(Vector::from(embedding))
            .bind(metadata)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(groups = groups.len(), messages = messages.len(), "stored utterance embeddings");
        Ok(())
    }

    /// Store a Q→A bridge row: a "hypothetical question" alongside a real
    /// message so question-shaped queries can find answer-shaped messages
    /// by similarity.
    pub async fn store_question_bridge(
        &self,
        chat_id: i64,
        message_id: i64,
        question_text: &str,
    ) -> Result<()> {
        let embedding = self.embed.embed(question_text, EmbedTask::Passage).await?;
        sqlx::query(
            r#"
            INSERT INTO message_embeddings
                (chat_id, message_id, chunk_index, chunk_text, embedding, metadata, is_question, created_at)
            VALUES ($1, $2, 1, $3, $4, $5, true, now())
            ON CONFLICT (chat_id, message_id, chunk_index)
            DO UPDATE SET chunk_text = EXCLUDED.chunk_text, embedding = EXCLUDED.embedding, created_at = now()
            "#,
        )
        .bind(chat_id)
        .bind(message_id)
        .bind(question_text)
        .bind(Vector::from(embedding))
        .bind(json!({}))
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn delete_chat(&self, chat_id: i64) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM message_embeddings WHERE chat_id = $1")
            .bind(chat_id)
            .execute(&self.db)
            .await?
            .rows_affected();
        let _ = sqlx::query("DELETE FROM context_embeddings WHERE chat_id = $1")
            .bind(chat_id)
            .execute(&self.db)
            .await?;
        Ok(deleted)
    }

    pub async fn delete_all(&self) -> Result<()> {
        sqlx::query("TRUNCATE message_embeddings, context_embeddings")
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Rename: replaces the current `"Name: ..."` and legacy `"] Name: ..."`
    /// prefixes in `chunk_text` where present, and independently patches
    /// `DisplayName` in `metadata` where it equals `old` — a batch-grouped
    /// row's `chunk_text` may not carry either prefix at all, so the text
    /// rewrite and the metadata patch are applied separately rather than
    /// gating one on the other. Returns the number of modified rows.
    pub async fn rename(&self, chat_id: Option<i64>, old: &str, new: &str) -> Result<u64> {
        let current_from = format!("{old}: ");
        let current_to = format!("{new}: ");
        let legacy_from = format!("] {old}: ");
        let legacy_to = format!("] {new}: ");

        let rows = if let Some(chat_id) = chat_id {
            sqlx::query(
                "SELECT chat_id, message_id, chunk_index, chunk_text, metadata FROM message_embeddings WHERE chat_id = $1",
            )
            .bind(chat_id)
            .fetch_all(&self.db)
            .await?
        } else {
            sqlx::query("SELECT chat_id, message_id, chunk_index, chunk_text, metadata FROM message_embeddings")
                .fetch_all(&self.db)
                .await?
        };

        let mut modified = 0u64;
        let mut tx = self.db.begin().await?;
        for row in rows {
            let text: String = row.get("chunk_text");
            let mut metadata: serde_json::Value = row.get("metadata");

            let mut new_text = text.clone();
            let mut text_changed = false;
            if new_text.starts_with(&current_from) {
                new_text = format!("{current_to}{}", &new_text[current_from.len()..]);
                text_changed = true;
            } else if new_text.contains(&legacy_from) {
                new_text = new_text.replace(&legacy_from, &legacy_to);
                text_changed = true;
            }

            let mut metadata_changed = false;
            if metadata.get("DisplayName").and_then(|v| v.as_str()) == Some(old) {
                metadata["DisplayName"] = json!(new);
                metadata_changed = true;
            }

            if !text_changed && !metadata_changed {
                continue;
            }

            sqlx::query(
                "UPDATE message_embeddings SET chunk_text = $1, metadata = $2 WHERE chat_id = $3 AND message_id = $4 AND chunk_index = $5",
            )
            .bind(&new_text)
            .bind(&metadata)
            .bind(row.get::<i64, _>("chat_id"))
            .bind(row.get::<i64, _>("message_id"))
            .bind(row.get::<i32, _>("chunk_index"))
            .execute(&mut *tx)
            .await?;
            modified += 1;
        }
        tx.commit().await?;
        Ok(modified)
    }

    pub async fn stats(&self, chat_id: Option<i64>) -> Result<EmbeddingStats> {
        let row = if let Some(chat_id) = chat_id {
            sqlx::query("SELECT COUNT(*) AS total, COUNT(DISTINCT chat_id) AS chats FROM message_embeddings WHERE chat_id = $1")
                .bind(chat_id)
                .fetch_one(&self.db)
                .await?
        } else {
            sqlx::query("SELECT COUNT(*) AS total, COUNT(DISTINCT chat_id) AS chats FROM message_embeddings")
                .fetch_one(&self.db)
                .await?
        };
        Ok(EmbeddingStats { total_rows: row.get("total"), chats: row.get("chats") })
    }
}

pub fn age_days(since: chrono::DateTime<Utc>) -> f32 {
    (Utc::now() - since).num_seconds() as f32 / 86_400.0
}
