//! Reciprocal Rank Fusion: pure scoring logic with
//! no I/O, kept separate from the orchestrator so the fusion math is
//! independently testable.

use std::collections::HashMap;

use crate::models::SearchResult;

/// Fuses two ranked branches into one list, summing `1/(K+rank+1)` per
/// branch appearance. When the same `message_id` appears in both branches,
/// keeps one representative result per this tie rule: a non-question
/// embedding wins over a question-embedding bridge row; otherwise the one
/// with higher raw similarity wins. Near-exact matches (similarity >= 0.98)
/// are discarded. The returned list is sorted by fused score descending.
pub fn reciprocal_rank_fusion(
    vector_branch: &[SearchResult],
    keyword_branch: &[SearchResult],
    k: usize,
    near_duplicate_similarity: f32,
) -> Vec<(f32, SearchResult)> {
    let mut fused: HashMap<i64, (f32, SearchResult)> = HashMap::new();

    for branch in [vector_branch, keyword_branch] {
        for (rank, result) in branch.iter().enumerate() {
            let contribution = 1.0 / (k + rank + 1) as f32;
            fused
                .entry(result.message_id)
                .and_modify(|(score, existing)| {
                    *score += contribution;
                    if prefer(result, existing) {
                        *existing = result.clone();
                    }
                })
                .or_insert_with(|| (contribution, result.clone()));
        }
    }

    let mut ranked: Vec<(f32, SearchResult)> = fused
        .into_values()
        .filter(|(_, result)| result.similarity < near_duplicate_similarity)
        .collect();

    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    ranked
}

/// True if `candidate` should replace `current` as the representative for
/// a message that appears in both branches.
fn prefer(candidate: &SearchResult, current: &SearchResult) -> bool {
    match (candidate.is_question_embedding, current.is_question_embedding) {
        (false, true) => true,
        (true, false) => false,
        _ => candidate.similarity > current.similarity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn result(message_id: i64, similarity: f32, is_question: bool) -> SearchResult {
        SearchResult {
            chat_id: 1,
            message_id,
            chunk_index: if is_question { 1 } else { 0 },
            chunk_text: "text".into(),
            metadata: Value::Null,
            distance: 1.0 - similarity,
            similarity,
            is_news_dump: false,
            is_question_embedding: is_question,
            is_context_window: false,
        }
    }

    #[test]
    fn sums_contributions_from_both_branches() {
        let vector = vec![result(1, 0.6, false)];
        let keyword = vec![result(1, 0.6, false)];
        let fused = reciprocal_rank_fusion(&vector, &keyword, 60, 0.98);
        assert_eq!(fused.len(), 1);
        let expected = 1.0 / 61.0 + 1.0 / 61.0;
        assert!((fused[0].0 - expected).abs() < 1e-6);
    }

    #[test]
    fn prefers_non_question_embedding_representative() {
        let vector = vec![result(1, 0.9, true)];
        let keyword = vec![result(1, 0.5, false)];
        let fused = reciprocal_rank_fusion(&vector, &keyword, 60, 0.98);
        assert_eq!(fused.len(), 1);
        assert!(!fused[0].1.is_question_embedding);
    }

    #[test]
    fn discards_near_exact_matches() {
        let vector = vec![result(1, 0.99, false)];
        let fused = reciprocal_rank_fusion(&vector, &[], 60, 0.98);
        assert!(fused.is_empty());
    }

    #[test]
    fn sorted_descending_by_fused_score() {
        let vector = vec![result(1, 0.4, false), result(2, 0.9, false)];
        let fused = reciprocal_rank_fusion(&vector, &[], 60, 0.98);
        assert_eq!(fused[0].1.message_id, 2);
    }
}
