//! Context Window Service: expands hit message ids into
//! before/after windows and merges overlapping ones.

use anyhow::Result;
use sqlx::{PgPool, Row};

use crate::models::ContextMessage;

pub struct ContextWindowService {
    db: PgPool,
    radius: usize,
}

impl ContextWindowService {
    pub fn new(db: PgPool, radius: usize) -> Self {
        Self { db, radius }
    }

    /// Fetches `W` qualifying (text-bearing) messages before/after each hit
    /// in one query, then merges windows sharing any message id. The query
    /// range is wider than `W` on purpose: non-text rows (media, service
    /// messages) consume ids without counting toward the window, so the
    /// window itself is picked by position among qualifying rows, not by
    /// raw id distance from the hit.
    pub async fn expand(&self, chat_id: i64, hit_message_ids: &[i64]) -> Result<Vec<Vec<ContextMessage>>> {
        if hit_message_ids.is_empty() {
            return Ok(Vec::new());
        }
        let radius = self.radius as i64;
        let fetch_radius = radius * FETCH_RADIUS_MULTIPLIER + FETCH_RADIUS_PADDING;

        let min_id = hit_message_ids.iter().map(|&hit| hit - fetch_radius).min().unwrap();
        let max_id = hit_message_ids.iter().map(|&hit| hit + fetch_radius).max().unwrap();

        let rows = sqlx::query(
            r#"
            SELECT id, from_user_id, display_name, username, text, date_utc, is_forwarded, forward_from_name
            FROM messages
            WHERE chat_id = $1 AND id BETWEEN $2 AND $3 AND text IS NOT NULL
            ORDER BY id ASC
            "#,
        )
        .bind(chat_id)
        .bind(min_id)
        .bind(max_id)
        .fetch_all(&self.db)
        .await?;

        let all: Vec<ContextMessage> = rows
            .into_iter()
            .map(|row| ContextMessage {
                message_id: row.get("id"),
                author: row
                    .get::<Option<String>, _>("display_name")
                    .or_else(|| row.get::<Option<String>, _>("username"))
                    .unwrap_or_else(|| row.get::<i64, _>("from_user_id").to_string()),
                text: row.get::<Option<String>, _>("text").unwrap_or_default(),
                date: row.get("date_utc"),
                is_forwarded: row.get("is_forwarded"),
                forward_origin: row.get("forward_from_name"),
            })
            .collect();

        let mut windows: Vec<Vec<ContextMessage>> = hit_message_ids
            .iter()
            .map(|&hit| window_around(&all, hit, self.radius))
            .filter(|w: &Vec<ContextMessage>| !w.is_empty())
            .collect();

        merge_overlapping(&mut windows);
        Ok(windows)
    }
}

const FETCH_RADIUS_MULTIPLIER: i64 = 5;
const FETCH_RADIUS_PADDING: i64 = 10;

/// Picks up to `radius` qualifying messages immediately before the hit, the
/// hit itself if it is among the qualifying rows, and up to `radius` after —
/// counted by position in `all` (already chat-scoped, text-filtered, and
/// sorted by id), not by raw id distance.
fn window_around(all: &[ContextMessage], hit: i64, radius: usize) -> Vec<ContextMessage> {
    let center_idx = all.partition_point(|m| m.message_id < hit);
    let has_center = all.get(center_idx).map(|m| m.message_id == hit).unwrap_or(false);

    let start = center_idx.saturating_sub(radius);
    let end_excl = if has_center { (center_idx + 1 + radius).min(all.len()) } else { (center_idx + radius).min(all.len()) };

    if start >= end_excl {
        return Vec::new();
    }
    all[start..end_excl].to_vec()
}

/// Merges windows that share any message id into longer coherent threads.
fn merge_overlapping(windows: &mut Vec<Vec<ContextMessage>>) {
    let mut merged: Vec<Vec<ContextMessage>> = Vec::new();

    'outer: for window in windows.drain(..) {
        let window_ids: std::collections::HashSet<i64> = window.iter().map(|m| m.message_id).collect();
        for existing in merged.iter_mut() {
            let existing_ids: std::collections::HashSet<i64> =
                existing.iter().map(|m| m.message_id).collect();
            if !window_ids.is_disjoint(&existing_ids) {
                for msg in window {
                    if !existing.iter().any(|m| m.message_id == msg.message_id) {
                        existing.push(msg);
                    }
                }
                existing.sort_by_key(|m| m.message_id);
                continue 'outer;
            }
        }
        merged.push(window);
    }

    *windows = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(id: i64) -> ContextMessage {
        ContextMessage {
            message_id: id,
            author: "a".into(),
            text: "t".into(),
            date: Utc::now(),
            is_forwarded: false,
            forward_origin: None,
        }
    }

    #[test]
    fn merges_windows_sharing_a_message_id() {
        let mut windows = vec![vec![msg(1), msg(2), msg(3)], vec![msg(3), msg(4), msg(5)], vec![msg(100)]];
        merge_overlapping(&mut windows);
        assert_eq!(windows.len(), 2);
        let merged = windows.iter().find(|w| w.len() == 5).unwrap();
        let ids: Vec<i64> = merged.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn window_around_counts_qualifying_messages_not_ids() {
        // ids 10 and 11 are missing from `all` (media/service messages with
        // no text), so an id-distance window of ±2 around the hit (12) would
        // only find one message on the left instead of two.
        let all = vec![msg(8), msg(9), msg(12), msg(13), msg(14), msg(15)];
        let window = window_around(&all, 12, 2);
        let ids: Vec<i64> = window.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![8, 9, 12, 13, 14]);
    }

    #[test]
    fn window_around_clamps_at_list_edges() {
        let all = vec![msg(1), msg(2), msg(3)];
        let window = window_around(&all, 1, 2);
        let ids: Vec<i64> = window.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn window_around_is_empty_when_nothing_is_fetched() {
        let all: Vec<ContextMessage> = Vec::new();
        let window = window_around(&all, 1, 2);
        assert!(window.is_empty());
    }
}
