//! Hybrid composite scoring. Pure functions — the
//! continuous exponential time-decay formula here replaces the stepped
//! retention-bucket approach of `backend/src/memory/features/decay.rs`
//! (that one is the long-lived-memory salience decay; this is a per-query
//! recency boost, and the formula here is exact and exponential).

use crate::config::retrieval::RetrievalConfig;

/// `time_decay = weight * exp(-max(0, age_days) * ln(2) / half_life)`.
pub fn time_decay(age_days: f32, config: &RetrievalConfig) -> f32 {
    let age = age_days.max(0.0);
    config.time_decay_weight * (-age * std::f32::consts::LN_2 / config.time_decay_half_life_days).exp()
}

/// `exact_boost = boost if any stem-expanded keyword occurs as a substring
/// of `text`, else 0`.
pub fn exact_boost(text: &str, keywords: &[String], config: &RetrievalConfig) -> f32 {
    let lower = text.to_lowercase();
    if keywords.iter().any(|kw| lower.contains(kw.as_str())) {
        config.exact_boost
    } else {
        0.0
    }
}

/// Fraction of sparse terms present in `text`.
pub fn text_score(text: &str, sparse_terms: &[String]) -> f32 {
    if sparse_terms.is_empty() {
        return 0.0;
    }
    let lower = text.to_lowercase();
    let hits = sparse_terms.iter().filter(|t| lower.contains(t.as_str())).count();
    hits as f32 / sparse_terms.len() as f32
}

/// `score = Wd*(1-distance) + Ws*text_score + exact_boost + time_decay`
/// when hybrid (sparse terms present); otherwise
/// `score = (1-distance) + exact_boost + time_decay`.
pub fn composite_score(
    distance: f32,
    text: &str,
    sparse_terms: &[String],
    keywords: &[String],
    age_days: f32,
    config: &RetrievalConfig,
) -> f32 {
    let dense = 1.0 - distance;
    let decay = time_decay(age_days, config);
    let boost = exact_boost(text, keywords, config);

    if sparse_terms.is_empty() {
        dense + boost + decay
    } else {
        config.dense_weight * dense + config.sparse_weight * text_score(text, sparse_terms) + boost + decay
    }
}

/// Candidate fetch size for stage 1: `min(limit*M, cap)`,
/// `M` depends on whether the query has sparse terms.
pub fn candidate_limit(limit: usize, has_sparse_terms: bool, config: &RetrievalConfig) -> usize {
    let m = if has_sparse_terms {
        config.candidate_multiplier_sparse
    } else {
        config.candidate_multiplier_dense
    };
    (limit * m).min(config.candidate_limit_cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RetrievalConfig {
        RetrievalConfig::from_env()
    }

    #[test]
    fn time_decay_is_maximal_at_zero_age() {
        let c = cfg();
        assert!((time_decay(0.0, &c) - c.time_decay_weight).abs() < 1e-6);
    }

    #[test]
    fn time_decay_decreases_with_age() {
        let c = cfg();
        assert!(time_decay(1.0, &c) < time_decay(0.0, &c));
        assert!(time_decay(28.0, &c) < time_decay(14.0, &c));
    }

    #[test]
    fn time_decay_halves_at_half_life() {
        let c = cfg();
        let at_half_life = time_decay(c.time_decay_half_life_days, &c);
        assert!((at_half_life - c.time_decay_weight / 2.0).abs() < 1e-4);
    }

    #[test]
    fn monotone_in_distance_for_equal_text_and_time() {
        let c = cfg();
        let terms = vec!["hello".to_string()];
        let a = composite_score(0.1, "hello world", &terms, &[], 1.0, &c);
        let b = composite_score(0.3, "hello world", &terms, &[], 1.0, &c);
        assert!(a > b, "smaller distance must score strictly higher");
    }

    #[test]
    fn exact_boost_applies_on_substring_match() {
        let c = cfg();
        let boost = exact_boost("мы ходили в кино вчера", &["кино".to_string()], &c);
        assert_eq!(boost, c.exact_boost);
        let none = exact_boost("мы ходили в театр вчера", &["кино".to_string()], &c);
        assert_eq!(none, 0.0);
    }

    #[test]
    fn candidate_limit_respects_cap() {
        let c = cfg();
        assert_eq!(candidate_limit(60, true, &c), c.candidate_limit_cap);
        assert_eq!(candidate_limit(5, false, &c), 25);
    }
}
