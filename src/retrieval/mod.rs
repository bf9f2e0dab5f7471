//! Hybrid Retriever: two-stage vector candidate retrieval
//! plus in-memory hybrid re-ranking, pool-restricted search, full-text
//! fallback. Postgres query style (raw SQL constants, `$n` placeholders,
//! `RETURNING`-free upserts) grounded on
//! `other_examples/.../postgres-chat.rs`; the parallel multi-branch idiom
//! this module is called from is grounded on `hybrid_search.rs`.

pub mod scoring;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use pgvector::Vector;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::config::retrieval::RetrievalConfig;
use crate::confidence::news_dump::is_news_dump;
use crate::models::SearchResult;
use crate::normalize::{extract_ilike_words, extract_search_terms};

pub struct HybridRetriever {
    db: PgPool,
    config: Arc<RetrievalConfig>,
}

impl HybridRetriever {
    pub fn new(db: PgPool, config: Arc<RetrievalConfig>) -> Self {
        Self { db, config }
    }

    /// `search(chat_id, query_vector, limit, query_text?)`.
    pub async fn search(
        &self,
        chat_id: i64,
        query_vector: &[f32],
        limit: usize,
        query_text: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let sparse_terms = query_text.map(extract_search_terms).unwrap_or_default();
        let keywords = query_text.map(|q| extract_ilike_words(q, 5)).unwrap_or_default();
        let candidate_n = scoring::candidate_limit(limit, !sparse_terms.is_empty(), &self.config);

        let rows = sqlx::query(
            r#"
            SELECT chat_id, message_id, chunk_index, chunk_text, metadata, is_question,
                   created_at, embedding <=> $1 AS distance
            FROM message_embeddings
            WHERE chat_id = $2
            ORDER BY embedding <=> $1
            LIMIT $3
            "#,
        )
        .bind(Vector::from(query_vector.to_vec()))
        .bind(chat_id)
        .bind(candidate_n as i64)
        .fetch_all(&self.db)
        .await?;

        Ok(self.rerank_candidates(rows, &sparse_terms, &keywords, limit))
    }

    /// Pool-restricted variant: same hybrid score, results
    /// constrained to `message_id ∈ pool`.
    pub async fn search_in_pool(
        &self,
        chat_id: i64,
        query_vector: &[f32],
        pool: &[i64],
        limit: usize,
        query_text: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        if pool.is_empty() {
            return Ok(Vec::new());
        }
        let sparse_terms = query_text.map(extract_search_terms).unwrap_or_default();
        let keywords = query_text.map(|q| extract_ilike_words(q, 5)).unwrap_or_default();
        let candidate_n = scoring::candidate_limit(limit, !sparse_terms.is_empty(), &self.config);

        let rows = sqlx::query(
            r#"
            SELECT chat_id, message_id, chunk_index, chunk_text, metadata, is_question,
                   created_at, embedding <=> $1 AS distance
            FROM message_embeddings
            WHERE chat_id = $2 AND message_id = ANY($3)
            ORDER BY embedding <=> $1
            LIMIT $4
            "#,
        )
        .bind(Vector::from(query_vector.to_vec()))
        .bind(chat_id)
        .bind(pool)
        .bind(candidate_n as i64)
        .fetch_all(&self.db)
        .await?;

        let mut results = self.rerank_candidates(rows, &sparse_terms, &keywords, limit);
        // Secondary tie-break for personal search: DateUtc descending.
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap()
                .then_with(|| {
                    let da = a.metadata.get("DateUtc").and_then(|v| v.as_str()).unwrap_or("");
                    let db_ = b.metadata.get("DateUtc").and_then(|v| v.as_str()).unwrap_or("");
                    db_.cmp(da)
                })
        });
        Ok(results)
    }

    /// `full_text_search`: the database's Russian text-search index with
    /// `websearch_to_tsquery`/`ts_rank_cd`.
    pub async fn full_text_search(
        &self,
        chat_id: i64,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let rows = sqlx::query(
            r#"
            SELECT chat_id, message_id, chunk_index, chunk_text, metadata, is_question, created_at,
                   ts_rank_cd(to_tsvector('russian', chunk_text), websearch_to_tsquery('russian', $1)) AS rank
            FROM message_embeddings
            WHERE chat_id = $2
              AND to_tsvector('russian', chunk_text) @@ websearch_to_tsquery('russian', $1)
            ORDER BY rank DESC
            LIMIT $3
            "#,
        )
        .bind(query_text)
        .bind(chat_id)
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let rank: f32 = row.get("rank");
                self.row_to_result(&row, rank.min(1.0), 1.0 - rank.min(1.0))
            })
            .collect())
    }

    /// `simple_text_search`: `ILIKE` over stem-expanded keywords against
    /// embeddings, falling back to raw messages within 30 days if empty.
    pub async fn simple_text_search(
        &self,
        chat_id: i64,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let keywords = extract_ilike_words(query_text, 5);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = sqlx::QueryBuilder::<sqlx::Postgres>::new(
            "SELECT chat_id, message_id, chunk_index, chunk_text, metadata, is_question, created_at FROM message_embeddings WHERE chat_id = ",
        );
        query.push_bind(chat_id);
        query.push(" AND (");
        for (i, kw) in keywords.iter().enumerate() {
            if i > 0 {
                query.push(" OR ");
            }
            query.push("chunk_text ILIKE ");
            query.push_bind(format!("%{kw}%"));
        }
        query.push(") LIMIT ");
        query.push_bind(limit as i64);

        let rows = query.build().fetch_all(&self.db).await?;
        if !rows.is_empty() {
            return Ok(rows.into_iter().map(|row| self.row_to_result(&row, 0.0, 0.5)).collect());
        }

        let cutoff = Utc::now() - chrono::Duration::days(30);
        let mut fallback = sqlx::QueryBuilder::<sqlx::Postgres>::new(
            "SELECT id AS message_id, chat_id, text AS chunk_text, from_user_id, date_utc FROM messages WHERE chat_id = ",
        );
        fallback.push_bind(chat_id);
        fallback.push(" AND date_utc >= ");
        fallback.push_bind(cutoff);
        fallback.push(" AND (");
        for (i, kw) in keywords.iter().enumerate() {
            if i > 0 {
                fallback.push(" OR ");
            }
            fallback.push("text ILIKE ");
            fallback.push_bind(format!("%{kw}%"));
        }
        fallback.push(") LIMIT ");
        fallback.push_bind(limit as i64);

        let rows = fallback.build().fetch_all(&self.db).await?;
        Ok(rows
            .into_iter()
            .map(|row| SearchResult {
                chat_id: row.get("chat_id"),
                message_id: row.get("message_id"),
                chunk_index: 0,
                chunk_text: row.get("chunk_text"),
                metadata: Value::Null,
                distance: 1.0,
                similarity: 0.4,
                is_news_dump: false,
                is_question_embedding: false,
                is_context_window: false,
            })
            .collect())
    }

    fn row_to_result(&self, row: &sqlx::postgres::PgRow, distance: f32, similarity: f32) -> SearchResult {
        SearchResult {
            chat_id: row.get("chat_id"),
            message_id: row.get("message_id"),
            chunk_index: row.get("chunk_index"),
            chunk_text: row.get("chunk_text"),
            metadata: row.get("metadata"),
            distance,
            similarity,
            is_news_dump: false,
            is_question_embedding: row.get("is_question"),
            is_context_window: false,
        }
    }

    /// Stage 2: in-memory hybrid rerank, near-duplicate filter, and
    /// news-dump tagging.
    fn rerank_candidates(
        &self,
        rows: Vec<sqlx::postgres::PgRow>,
        sparse_terms: &[String],
        keywords: &[String],
        limit: usize,
    ) -> Vec<SearchResult> {
        let mut scored: Vec<(f32, SearchResult)> = rows
            .into_iter()
            .filter_map(|row| {
                let distance: f32 = row.get("distance");
                let similarity = 1.0 - distance;
                if similarity >= self.config.near_duplicate_similarity {
                    return None; // discard near-exact matches
                }

                let chunk_text: String = row.get("chunk_text");
                let created_at: chrono::DateTime<Utc> = row.get("created_at");
                let age = crate::embedding_store::age_days(created_at);
                let score = scoring::composite_score(
                    distance,
                    &chunk_text,
                    sparse_terms,
                    keywords,
                    age,
                    &self.config,
                );

                let mut result = self.row_to_result(&row, distance, similarity);
                result.chunk_text = chunk_text;
                result.is_news_dump = is_news_dump(&result.chunk_text);
                Some((score, result))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
        scored.truncate(limit);
        scored.into_iter().map(|(_, r)| r).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_limit_used_in_search_matches_config() {
        let config = RetrievalConfig::from_env();
        assert_eq!(
            scoring::candidate_limit(60, true, &config),
            (60 * config.candidate_multiplier_sparse).min(config.candidate_limit_cap)
        );
    }
}
