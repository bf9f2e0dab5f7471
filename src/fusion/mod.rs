//! RAG Fusion Orchestrator: the query-time retrieval path.
//! Parallel vector/keyword branches are grounded on `hybrid_search.rs`'s
//! `tokio::try_join!` fan-out idiom; Reciprocal Rank Fusion itself is pure
//! logic in `rrf.rs`.

pub mod personal_pool;
pub mod rrf;

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;
use tracing::debug;

use crate::collaborators::{EmbedTask, EmbeddingClient, Reranker};
use crate::config::retrieval::RetrievalConfig;
use crate::confidence;
use crate::models::{ClassifiedQuery, Confidence, Intent, SearchResponse, SearchResult};
use crate::normalize::extract_keywords;
use crate::retrieval::HybridRetriever;

pub struct FusionOrchestrator {
    retriever: Arc<HybridRetriever>,
    embed: Arc<dyn EmbeddingClient>,
    reranker: Option<Arc<dyn Reranker>>,
    db: PgPool,
    config: Arc<RetrievalConfig>,
}

impl FusionOrchestrator {
    pub fn new(
        retriever: Arc<HybridRetriever>,
        embed: Arc<dyn EmbeddingClient>,
        reranker: Option<Arc<dyn Reranker>>,
        db: PgPool,
        config: Arc<RetrievalConfig>,
    ) -> Self {
        Self { retriever, embed, reranker, db, config }
    }

    /// Dispatches to the personal/temporal/multi-entity pool search or the
    /// default RAG Fusion path, per the specialized-search rule below.
    pub async fn search(
        &self,
        chat_id: i64,
        question: &str,
        classified: &ClassifiedQuery,
        stable_user_id: Option<i64>,
        search_names: &[String],
    ) -> Result<SearchResponse> {
        if classified.needs_specialized_search() {
            self.personal_pool_search(chat_id, question, classified, stable_user_id, search_names).await
        } else {
            self.rag_fusion_search(chat_id, question).await
        }
    }

    async fn personal_pool_search(
        &self,
        chat_id: i64,
        question: &str,
        classified: &ClassifiedQuery,
        stable_user_id: Option<i64>,
        search_names: &[String],
    ) -> Result<SearchResponse> {
        let names: Vec<String> = if !classified.mentioned_people.is_empty() {
            classified.mentioned_people.clone()
        } else {
            search_names.to_vec()
        };

        let pool = personal_pool::build_pool(
            &self.db,
            chat_id,
            stable_user_id,
            &names,
            self.config.personal_pool_days,
            self.config.personal_pool_self_cap as i64,
            self.config.personal_pool_mentions_cap as i64,
        )
        .await?;

        let query_vector = self.embed.embed(question, EmbedTask::Query).await?;
        let mut results = self
            .retriever
            .search_in_pool(chat_id, &query_vector, &pool, self.config.personal_pool_search_limit, Some(question))
            .await?;

        confidence::apply_news_dump_penalty(&mut results, self.config.news_dump_penalty);
        results.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());

        let (best, gap) = confidence::best_and_gap(&results);
        let has_full_text = !self.retriever.full_text_search(chat_id, question, 1).await?.is_empty();
        let level = confidence::evaluate(best, gap, has_full_text);

        Ok(SearchResponse {
            results,
            confidence: level,
            confidence_reason: format!("[Personal pool: {}] intent={:?}", pool.len(), classified.intent),
            best_score: best,
            score_gap: gap,
            has_full_text_match: has_full_text,
        })
    }

    /// Public so the Ask Worker can also use this as the speculative
    /// default search run concurrently with intent classification.
    pub async fn rag_fusion_search(&self, chat_id: i64, question: &str) -> Result<SearchResponse> {
        let query_vector = self.embed.embed(question, EmbedTask::Query).await?;
        let keywords = extract_keywords(question);

        let vector_future = self.retriever.search(chat_id, &query_vector, self.config.results_per_query, Some(question));

        let (vector_results, keyword_results) = if keywords.is_empty() {
            (vector_future.await?, Vec::new())
        } else {
            let keyword_query = keywords.join(" ");
            let keyword_future =
                self.retriever.simple_text_search(chat_id, &keyword_query, 2 * self.config.results_per_query);
            tokio::try_join!(vector_future, keyword_future)?
        };

        debug!(chat_id, vector = vector_results.len(), keyword = keyword_results.len(), "fusion branches returned");

        let branches = if keyword_results.is_empty() { 1usize } else { 2usize };
        let mut scored: Vec<(f32, SearchResult)> = rrf::reciprocal_rank_fusion(
            &vector_results,
            &keyword_results,
            self.config.rrf_k as usize,
            self.config.near_duplicate_similarity,
        );

        for (score, result) in scored.iter_mut() {
            if result.is_news_dump {
                *score -= self.config.news_dump_penalty;
                result.similarity -= self.config.news_dump_penalty;
            }
        }

        let used_reranker = if let Some(reranker) = &self.reranker {
            let mut results: Vec<SearchResult> = scored.into_iter().map(|(_, r)| r).collect();
            self.apply_reranker(reranker.as_ref(), question, &mut results).await?;
            // The reranker score now replaces the fused RRF score as the
            // confidence-gate input, since the results are reordered by it.
            scored = results.into_iter().map(|r| (r.similarity, r)).collect();
            true
        } else {
            false
        };

        let (level, best, gap) = fusion_confidence(&scored, branches, used_reranker, self.config.rrf_k as usize);
        let has_full_text_match = !keyword_results.is_empty();
        let results: Vec<SearchResult> = scored.into_iter().map(|(_, r)| r).collect();

        Ok(SearchResponse {
            results,
            confidence: level,
            confidence_reason: format!(
                "{} branches, {}, best={:.3}",
                branches,
                if used_reranker { "reranked" } else { "rrf" },
                best
            ),
            best_score: best,
            score_gap: gap,
            has_full_text_match,
        })
    }

    async fn apply_reranker(&self, reranker: &dyn Reranker, question: &str, results: &mut Vec<SearchResult>) -> Result<()> {
        let top_n = results.len().min(100);
        results.truncate(top_n);
        if results.is_empty() {
            return Ok(());
        }
        let docs: Vec<String> = results.iter().map(|r| r.chunk_text.clone()).collect();
        let hits = reranker.rerank(question, &docs, top_n).await?;

        for hit in &hits {
            if let Some(result) = results.get_mut(hit.index) {
                result.similarity = hit.score;
            }
        }
        results.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        Ok(())
    }
}

/// Confidence for the fusion path — distinct from
/// the generic `confidence::evaluate` used by the personal pool path, since
/// fusion scores are RRF-derived (or reranker scores), not raw cosine
/// similarities. Kept as a free function so the formula is testable without
/// constructing a full orchestrator.
fn fusion_confidence(
    scored: &[(f32, SearchResult)],
    branches: usize,
    used_reranker: bool,
    rrf_k: usize,
) -> (Confidence, f32, f32) {
    let scores: Vec<f32> = scored.iter().map(|(score, _)| *score).collect();
    let best = scores.first().copied().unwrap_or(0.0);
    let gap = confidence::score_gap(&scores);

    let level = if used_reranker {
        if best >= 0.8 {
            Confidence::High
        } else if best >= 0.5 {
            Confidence::Medium
        } else if best >= 0.3 || scored.len() >= 5 {
            Confidence::Low
        } else {
            Confidence::None
        }
    } else {
        let k = rrf_k as f32;
        let normalized = if branches > 0 { best / (branches as f32 * (1.0 / (k + 1.0))) } else { 0.0 };
        let multi_branch_strong = branches == 2 && best > 2.0 / (k + 5.0);

        if normalized >= 0.7 || multi_branch_strong {
            Confidence::High
        } else if normalized >= 0.4 {
            Confidence::Medium
        } else if normalized >= 0.2 || scored.len() >= 5 {
            Confidence::Low
        } else {
            Confidence::None
        }
    };

    (level, best, gap)
}

/// True when the classified intent should route through personal/temporal
/// search rather than default RAG Fusion.
pub fn is_specialized_intent(classified: &ClassifiedQuery) -> bool {
    matches!(
        classified.intent,
        Intent::PersonalSelf | Intent::PersonalOther | Intent::Temporal | Intent::Comparison | Intent::MultiEntity
    ) && classified.needs_specialized_search()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn result(id: i64, similarity: f32) -> SearchResult {
        SearchResult {
            chat_id: 1,
            message_id: id,
            chunk_index: 0,
            chunk_text: "t".into(),
            metadata: Value::Null,
            distance: 1.0 - similarity,
            similarity,
            is_news_dump: false,
            is_question_embedding: false,
            is_context_window: false,
        }
    }

    /// `score` is the fused RRF score fed to `fusion_confidence`; `similarity`
    /// is a realistic raw cosine similarity carried along on the result for
    /// display only, deliberately picked to differ from `score` in
    /// magnitude so these tests actually exercise the RRF-vs-cosine
    /// distinction rather than accidentally passing with either one.
    fn scored(id: i64, score: f32, similarity: f32) -> (f32, SearchResult) {
        (score, result(id, similarity))
    }

    #[test]
    fn fusion_confidence_without_reranker_is_high_for_near_maximal_best() {
        let k = 60;
        // Both branches rank this hit first: RRF score is 2/(k+1), but the
        // raw cosine similarity is a modest 0.4 — confidence must follow
        // the RRF score, not the similarity.
        let scored_results = vec![scored(1, 2.0 / (k as f32 + 1.0), 0.4)];
        let (level, _, _) = fusion_confidence(&scored_results, 2, false, k);
        assert_eq!(level, Confidence::High);
    }

    #[test]
    fn fusion_confidence_without_reranker_is_none_for_weak_single_branch() {
        let k = 60;
        // Weak single-branch RRF contribution (low rank), paired with a high
        // raw cosine similarity — confidence must still be None because the
        // fused score, not the similarity, drives the gate.
        let scored_results = vec![scored(1, 1.0 / (k as f32 + 60.0), 0.9)];
        let (level, _, _) = fusion_confidence(&scored_results, 1, false, k);
        assert_eq!(level, Confidence::None);
    }

    #[test]
    fn fusion_confidence_with_reranker_uses_reranker_thresholds() {
        let scored_results = vec![scored(1, 0.85, 0.85)];
        let (level, _, _) = fusion_confidence(&scored_results, 1, true, 60);
        assert_eq!(level, Confidence::High);
    }

    #[test]
    fn specialized_intent_requires_entities_for_comparison() {
        let classified = ClassifiedQuery {
            intent: Intent::Comparison,
            confidence: 0.8,
            entities: Vec::new(),
            mentioned_people: Vec::new(),
            temporal_ref: None,
            reasoning: String::new(),
        };
        assert!(!is_specialized_intent(&classified));
    }
}
