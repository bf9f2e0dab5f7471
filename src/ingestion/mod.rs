//! Ingestion Hook: on every new chat message,
//! persists the row, embeds it, and generates its Q→A bridge row;
//! periodically rebuilds sliding-window embeddings for chats that have
//! been active recently. Spawn idiom: `tokio::spawn` plus
//! `interval().set_missed_tick_behavior`, the same background-task shape
//! used by the Ask Worker.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sqlx::{PgPool, Row};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ingestion::IngestionConfig;
use crate::embedding_store::EmbeddingStore;
use crate::indexer::SlidingWindowIndexer;
use crate::intent::QuestionGenerator;
use crate::models::Message;

pub struct IngestionHook {
    db: PgPool,
    embedding_store: Arc<EmbeddingStore>,
    indexer: Arc<SlidingWindowIndexer>,
    question_generator: Arc<QuestionGenerator>,
    config: Arc<IngestionConfig>,
}

impl IngestionHook {
    pub fn new(
        db: PgPool,
        embedding_store: Arc<EmbeddingStore>,
        indexer: Arc<SlidingWindowIndexer>,
        question_generator: Arc<QuestionGenerator>,
        config: Arc<IngestionConfig>,
    ) -> Self {
        Self { db, embedding_store, indexer, question_generator, config }
    }

    /// Data flow for ingestion, first half: store the row,
    /// embed it as a passage immediately rather than deferring to a
    /// separate queue (utterance embedding is cheap enough to run inline),
    /// then generate and store its Q→A bridge row. Bridge generation never
    /// fails the ingest: a generator error is logged and the message is
    /// still considered ingested.
    pub async fn ingest_message(&self, message: &Message) -> Result<()> {
        self.store_message_row(message).await?;
        self.embedding_store.store(message).await?;

        if let Some(text) = &message.text {
            if let Some(question) = self.question_generator.generate(&message.author_label(), text).await {
                if let Err(err) = self.embedding_store.store_question_bridge(message.chat_id, message.id, &question).await {
                    error!(chat_id = message.chat_id, message_id = message.id, %err, "failed to store question bridge");
                }
            }
        }
        Ok(())
    }

    async fn store_message_row(&self, message: &Message) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO messages
                (chat_id, id, from_user_id, username, display_name, text, date_utc,
                 is_forwarded, forward_origin_type, forward_from_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (chat_id, id) DO NOTHING
            "#,
        )
        .bind(message.chat_id)
        .bind(message.id)
        .bind(message.from_user_id)
        .bind(&message.username)
        .bind(&message.display_name)
        .bind(&message.text)
        .bind(message.date_utc)
        .bind(message.is_forwarded)
        .bind(&message.forward_origin_type)
        .bind(&message.forward_from_name)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub fn spawn_periodic_rebuild(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let hook = self.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(hook.config.window_rebuild_interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {}
                }
                if let Err(err) = hook.rebuild_active_chats().await {
                    error!(%err, "sliding-window rebuild sweep failed");
                }
            }
        })
    }

    /// Data flow for ingestion, second half: re-segment and re-embed
    /// sliding windows for every chat with recent activity.
    async fn rebuild_active_chats(&self) -> Result<()> {
        let cutoff = Utc::now() - chrono::Duration::days(self.config.active_chat_window_days);
        let rows = sqlx::query("SELECT DISTINCT chat_id FROM messages WHERE date_utc >= $1")
            .bind(cutoff)
            .fetch_all(&self.db)
            .await?;

        for row in rows {
            let chat_id: i64 = row.get("chat_id");
            let messages = self.load_chat_history(chat_id).await?;
            match self.indexer.rebuild(chat_id, &messages).await {
                Ok(windows) => info!(chat_id, windows, "rebuilt sliding windows"),
                Err(err) => error!(chat_id, %err, "window rebuild failed for chat"),
            }
        }
        Ok(())
    }

    async fn load_chat_history(&self, chat_id: i64) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT chat_id, id, from_user_id, username, display_name, text, date_utc,
                   is_forwarded, forward_origin_type, forward_from_name
            FROM messages
            WHERE chat_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.db)
        .await?;
        Ok(messages)
    }
}
