use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use crate::config::queue::QueueConfig;
use crate::error::AskResult;
use crate::models::{AskJob, AskKind};

/// Durable FIFO for `/ask` and `/smart` requests.
pub struct AskQueue {
    db: PgPool,
    config: Arc<QueueConfig>,
}

impl AskQueue {
    pub fn new(db: PgPool, config: Arc<QueueConfig>) -> Self {
        Self { db, config }
    }

    /// Idempotent enqueue: `on conflict do nothing` against the partial
    /// unique index on `idempotency_key where processed = false`.
    pub async fn enqueue(
        &self,
        chat_id: i64,
        reply_to_message_id: i64,
        question: &str,
        kind: AskKind,
        asker_id: i64,
        asker_name: &str,
        asker_username: Option<&str>,
    ) -> AskResult<Option<i64>> {
        let idempotency_key = AskJob::idempotency_key(chat_id, reply_to_message_id, kind);

        let row = sqlx::query(
            r#"
            INSERT INTO ask_queue
                (chat_id, reply_to_message_id, question, kind, asker_id, asker_name,
                 asker_username, created_at, attempt_count, processed, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now(), 0, false, $8)
            ON CONFLICT (idempotency_key) WHERE NOT processed DO NOTHING
            RETURNING id
            "#,
        )
        .bind(chat_id)
        .bind(reply_to_message_id)
        .bind(question)
        .bind(kind)
        .bind(asker_id)
        .bind(asker_name)
        .bind(asker_username)
        .bind(&idempotency_key)
        .fetch_optional(&self.db)
        .await?;

        let id = row.map(|r| r.get::<i64, _>("id"));
        if id.is_some() {
            sqlx::query("SELECT pg_notify('ask_queue_channel', $1)")
                .bind(id.unwrap().to_string())
                .execute(&self.db)
                .await?;
        } else {
            debug!(chat_id, reply_to_message_id, "ask already queued, deduped");
        }
        Ok(id)
    }

    /// Atomic pick: one statement that claims the oldest eligible row using
    /// `FOR UPDATE SKIP LOCKED` so concurrent pickers never observe the same
    /// job.
    pub async fn pick(&self) -> AskResult<Option<AskJob>> {
        let lease = Duration::seconds(self.config.ask_lease_timeout_secs as i64);
        let cutoff = Utc::now() - lease;

        let mut tx = self.db.begin().await?;

        let candidate = sqlx::query(
            r#"
            SELECT id FROM ask_queue
            WHERE NOT processed
              AND attempt_count < $1
              AND (started_at IS NULL OR started_at < $2)
            ORDER BY created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(self.config.max_attempts)
        .bind(cutoff)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(candidate) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };
        let id: i64 = candidate.get("id");

        let row = sqlx::query_as::<_, AskJob>(
            r#"
            UPDATE ask_queue
            SET started_at = now(), picked_at = now(), attempt_count = attempt_count + 1
            WHERE id = $1
            RETURNING id, chat_id, reply_to_message_id, question, kind, asker_id, asker_name,
                      asker_username, created_at, started_at, picked_at, completed_at,
                      attempt_count, processed, error, idempotency_key
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row))
    }

    pub async fn complete(&self, id: i64) -> AskResult<()> {
        sqlx::query(
            "UPDATE ask_queue SET processed = true, completed_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// `fail`: retries with exponential backoff until `MaxAttempts`, then
    /// closes the row permanently. Returns whether the caller should expect
    /// a further retry.
    pub async fn fail(&self, id: i64, attempt_count: i32, error: &str) -> AskResult<bool> {
        if attempt_count < self.config.max_attempts {
            let backoff_secs = (self.config.base_retry_delay_secs
                * 2u64.pow((attempt_count - 1).max(0) as u32))
            .min(self.config.max_retry_delay_secs);
            let lease = Duration::seconds(self.config.ask_lease_timeout_secs as i64);
            let backoff = Duration::seconds(backoff_secs as i64);
            let eligible_at = Utc::now() - lease + backoff;

            sqlx::query("UPDATE ask_queue SET started_at = $1, error = $2 WHERE id = $3")
                .bind(eligible_at)
                .bind(error)
                .bind(id)
                .execute(&self.db)
                .await?;
            Ok(true)
        } else {
            sqlx::query(
                "UPDATE ask_queue SET processed = true, completed_at = now(), error = $1 WHERE id = $2",
            )
            .bind(error)
            .bind(id)
            .execute(&self.db)
            .await?;
            Ok(false)
        }
    }

    /// Periodic sweep: returns rows whose lease expired back
    /// to pending; closes rows that have exhausted their attempts.
    pub async fn recover_stale(&self) -> AskResult<u64> {
        let lease = Duration::seconds(self.config.ask_lease_timeout_secs as i64);
        let cutoff = Utc::now() - lease;

        let recovered = sqlx::query(
            r#"
            UPDATE ask_queue
            SET started_at = NULL, picked_at = NULL
            WHERE NOT processed AND started_at < $1 AND attempt_count < $2
            "#,
        )
        .bind(cutoff)
        .bind(self.config.max_attempts)
        .execute(&self.db)
        .await?
        .rows_affected();

        let dead = sqlx::query(
            r#"
            UPDATE ask_queue
            SET processed = true, completed_at = now(), error = '[DEAD] lease expired after max attempts'
            WHERE NOT processed AND started_at < $1 AND attempt_count >= $2
            "#,
        )
        .bind(cutoff)
        .bind(self.config.max_attempts)
        .execute(&self.db)
        .await?
        .rows_affected();

        if recovered > 0 || dead > 0 {
            warn!(recovered, dead, "stale recovery swept ask_queue");
        }
        Ok(recovered)
    }

    pub async fn cleanup_old(&self, days: i64) -> AskResult<u64> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::days(days);
        let deleted = sqlx::query("DELETE FROM ask_queue WHERE processed AND completed_at < $1")
            .bind(cutoff)
            .execute(&self.db)
            .await?
            .rows_affected();
        Ok(deleted)
    }

    pub fn lease_timeout(&self) -> Duration {
        Duration::seconds(self.config.ask_lease_timeout_secs as i64)
    }
}
