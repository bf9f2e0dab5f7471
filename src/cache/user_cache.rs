//! Chat User Cache: an in-memory
//! `chat_id -> (loaded_at, authors)` map with a 30 minute TTL, protected by a
//! mutex rather than a bare global (per the redesign flag on global mutable
//! caches). Used by nickname resolution to avoid hitting the database on
//! every ask.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Result;
use sqlx::{PgPool, Row};

#[derive(Debug, Clone)]
pub struct ChatAuthor {
    pub from_user_id: i64,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub message_count: i64,
}

struct CacheEntry {
    loaded_at: Instant,
    authors: Vec<ChatAuthor>,
}

pub struct ChatUserCache {
    db: PgPool,
    ttl: Duration,
    entries: Mutex<HashMap<i64, CacheEntry>>,
}

impl ChatUserCache {
    pub fn new(db: PgPool, ttl: Duration) -> Self {
        Self { db, ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// Returns the top-N authors by message count for `chat_id`, refreshing
    /// from the database if the cached entry is missing or stale.
    pub async fn top_authors(&self, chat_id: i64, limit: usize) -> Result<Vec<ChatAuthor>> {
        if let Some(cached) = self.cached_if_fresh(chat_id) {
            return Ok(cached.into_iter().take(limit).collect());
        }

        let rows = sqlx::query(
            r#"
            SELECT from_user_id, display_name, username, count(*) AS message_count
            FROM messages
            WHERE chat_id = $1
            GROUP BY from_user_id, display_name, username
            ORDER BY message_count DESC
            LIMIT 50
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.db)
        .await?;

        let authors: Vec<ChatAuthor> = rows
            .into_iter()
            .map(|row| ChatAuthor {
                from_user_id: row.get("from_user_id"),
                display_name: row.get("display_name"),
                username: row.get("username"),
                message_count: row.get("message_count"),
            })
            .collect();

        self.entries
            .lock()
            .unwrap()
            .insert(chat_id, CacheEntry { loaded_at: Instant::now(), authors: authors.clone() });

        Ok(authors.into_iter().take(limit).collect())
    }

    fn cached_if_fresh(&self, chat_id: i64) -> Option<Vec<ChatAuthor>> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(&chat_id)?;
        if entry.loaded_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.authors.clone())
    }

    pub fn invalidate(&self, chat_id: i64) {
        self.entries.lock().unwrap().remove(&chat_id);
    }
}
