use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::warn;

use crate::config::queue::QueueConfig;
use crate::error::AskResult;
use crate::models::TruthJob;

/// Analogous queue for `/truth` requests; same
/// lease/retry/stale-recovery contract as `AskQueue`, keyed by chat and a
/// requested message count instead of a question string.
pub struct TruthQueue {
    db: PgPool,
    config: Arc<QueueConfig>,
}

impl TruthQueue {
    pub fn new(db: PgPool, config: Arc<QueueConfig>) -> Self {
        Self { db, config }
    }

    pub async fn enqueue(&self, chat_id: i64, message_count: i32) -> AskResult<Option<i64>> {
        let idempotency_key = format!("{chat_id}:truth:{message_count}");
        let row = sqlx::query(
            r#"
            INSERT INTO truth_queue
                (chat_id, message_count, created_at, attempt_count, processed, idempotency_key)
            VALUES ($1, $2, now(), 0, false, $3)
            ON CONFLICT (idempotency_key) WHERE NOT processed DO NOTHING
            RETURNING id
            "#,
        )
        .bind(chat_id)
        .bind(message_count)
        .bind(&idempotency_key)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| r.get::<i64, _>("id")))
    }

    pub async fn pick(&self) -> AskResult<Option<TruthJob>> {
        let lease = Duration::seconds(self.config.truth_lease_timeout_secs as i64);
        let cutoff = Utc::now() - lease;

        let mut tx = self.db.begin().await?;

        let candidate = sqlx::query(
            r#"
            SELECT id FROM truth_queue
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

        let row = sqlx::query_as::<_, TruthJob>(
            r#"
            UPDATE truth_queue
            SET started_at = now(), picked_at = now(), attempt_count = attempt_count + 1
            WHERE id = $1
            RETURNING id, chat_id, message_count, created_at, started_at, picked_at,
                      completed_at, attempt_count, processed, error, idempotency_key
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row))
    }

    pub async fn complete(&self, id: i64) -> AskResult<()> {
        sqlx::query("UPDATE truth_queue SET processed = true, completed_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn fail(&self, id: i64, attempt_count: i32, error: &str) -> AskResult<bool> {
        if attempt_count < self.config.max_attempts {
            let backoff_secs = (self.config.base_retry_delay_secs
                * 2u64.pow((attempt_count - 1).max(0) as u32))
            .min(self.config.max_retry_delay_secs);
            let lease = Duration::seconds(self.config.truth_lease_timeout_secs as i64);
            let backoff = Duration::seconds(backoff_secs as i64);
            let eligible_at = Utc::now() - lease + backoff;

            sqlx::query("UPDATE truth_queue SET started_at = $1, error = $2 WHERE id = $3")
                .bind(eligible_at)
                .bind(error)
                .bind(id)
                .execute(&self.db)
                .await?;
            Ok(true)
        } else {
            sqlx::query(
                "UPDATE truth_queue SET processed = true, completed_at = now(), error = $1 WHERE id = $2",
            )
            .bind(error)
            .bind(id)
            .execute(&self.db)
            .await?;
            Ok(false)
        }
    }

    pub async fn recover_stale(&self) -> AskResult<u64> {
        let lease = Duration::seconds(self.config.truth_lease_timeout_secs as i64);
        let cutoff = Utc::now() - lease;

        let recovered = sqlx::query(
            r#"
            UPDATE truth_queue
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
            UPDATE truth_queue
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
            warn!(recovered, dead, "stale recovery swept truth_queue");
        }
        Ok(recovered)
    }

    pub async fn cleanup_old(&self, days: i64) -> AskResult<u64> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::days(days);
        let deleted = sqlx::query("DELETE FROM truth_queue WHERE processed AND completed_at < $1")
            .bind(cutoff)
            .execute(&self.db)
            .await?
            .rows_affected();
        Ok(deleted)
    }
}
