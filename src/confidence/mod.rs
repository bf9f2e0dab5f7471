//! Confidence Evaluator. Pure gate logic; the news-dump
//! detector lives alongside it since both operate purely on retrieval
//! signals with no I/O.

pub mod news_dump;

use crate::models::{Confidence, SearchResult};

/// `evaluate(best, gap, has_full_text)`.
pub fn evaluate(best: f32, gap: f32, has_full_text: bool) -> Confidence {
    if has_full_text {
        if best >= 0.5 {
            Confidence::High
        } else if best >= 0.35 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    } else if best >= 0.5 && gap >= 0.05 {
        Confidence::High
    } else if best >= 0.4 || (best >= 0.35 && gap >= 0.03) {
        Confidence::Medium
    } else if best >= 0.25 {
        Confidence::Low
    } else {
        Confidence::None
    }
}

/// Gap is `best_similarity - fifth_similarity` (or last if fewer than
/// five), computed from results already sorted by score descending.
pub fn score_gap(sorted_similarities: &[f32]) -> f32 {
    let Some(&best) = sorted_similarities.first() else {
        return 0.0;
    };
    let nth = sorted_similarities.get(4).or_else(|| sorted_similarities.last()).copied().unwrap_or(best);
    best - nth
}

/// Applies the news-dump penalty and re-sorts.
pub fn apply_news_dump_penalty(results: &mut [SearchResult], penalty: f32) {
    for result in results.iter_mut() {
        if result.is_news_dump {
            result.similarity -= penalty;
        }
    }
}

pub fn best_and_gap(results: &[SearchResult]) -> (f32, f32) {
    let similarities: Vec<f32> = results.iter().map(|r| r.similarity).collect();
    let best = similarities.first().copied().unwrap_or(0.0);
    (best, score_gap(&similarities))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_e_high() {
        let sims = [0.62, 0.55, 0.52, 0.50, 0.49];
        let gap = score_gap(&sims);
        assert!((gap - 0.13).abs() < 1e-6);
        assert_eq!(evaluate(0.62, gap, false), Confidence::High);
    }

    #[test]
    fn scenario_e_medium() {
        let sims = [0.38, 0.36, 0.35, 0.34, 0.33];
        let gap = score_gap(&sims);
        assert_eq!(evaluate(0.38, gap, false), Confidence::Medium);
    }

    #[test]
    fn scenario_e_low() {
        let sims = [0.28, 0.27, 0.26];
        let gap = score_gap(&sims);
        assert_eq!(evaluate(0.28, gap, false), Confidence::Low);
    }

    #[test]
    fn scenario_e_none() {
        let sims = [0.21, 0.10];
        let gap = score_gap(&sims);
        assert_eq!(evaluate(0.21, gap, false), Confidence::None);
    }

    #[test]
    fn full_text_match_short_circuits_to_high() {
        assert_eq!(evaluate(0.5, 0.0, true), Confidence::High);
        assert_eq!(evaluate(0.4, 0.0, true), Confidence::Medium);
        assert_eq!(evaluate(0.1, 0.0, true), Confidence::Low);
    }

    #[test]
    fn monotone_in_best_for_fixed_gap() {
        let gap = 0.02;
        let low = evaluate(0.26, gap, false);
        let higher = evaluate(0.45, gap, false);
        assert!(higher >= low);
    }
}
