//! Text / Query Normalizer. Pure functions; Russian
//! stop-word list and suffix table are fixed, representative tables per the
//! Open Question decision in DESIGN.md, not an exhaustive linguistic
//! resource.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref STOP_WORDS: HashSet<&'static str> = [
        "и", "в", "во", "не", "что", "он", "на", "я", "с", "со", "как", "а", "то", "все",
        "она", "так", "его", "но", "да", "ты", "к", "у", "же", "вы", "за", "бы", "по",
        "только", "ее", "мне", "было", "вот", "от", "меня", "еще", "нет", "о", "из", "ему",
        "теперь", "когда", "даже", "ну", "вдруг", "ли", "если", "уже", "или", "ни", "быть",
        "был", "него", "до", "вас", "нибудь", "опять", "уж", "вам", "ведь", "там", "потом",
        "себя", "ничего", "им", "этой", "этот", "тут", "где", "есть", "надо", "этом",
    ]
    .into_iter()
    .collect();

    // Longest suffix first: stripping must try the longest match before a
    // shorter one that is also a suffix of it.
    static ref STEM_SUFFIXES: Vec<&'static str> = {
        let mut suffixes = vec![
            "иями", "ями", "ами", "его", "ому", "ыми", "ими", "ать", "ять", "еть",
            "ешь", "ишь", "ете", "ите", "ют", "ят", "ем", "им", "ах", "ях", "ов",
            "ев", "ой", "ый", "ая", "яя", "ое", "ее", "ых", "их", "ую", "юю", "ал",
            "ял", "ла", "ло", "ли", "на", "но", "ны", "та", "то", "ты", "у", "ю",
            "а", "я", "о", "е", "ы", "и",
        ];
        suffixes.sort_by_key(|s| std::cmp::Reverse(s.chars().count()));
        suffixes
    };

    static ref ONLY_INVISIBLE_OR_PUNCT: Regex =
        Regex::new(r"^[\s\p{P}\p{S}\p{Cf}\p{Cc}\p{So}\p{C}]*$").unwrap();
}

/// `extract_search_terms(q)`: space-joined, lower-cased, length>2, not a
/// stop word, deduplicated.
pub fn extract_search_terms(q: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    for word in q.split_whitespace() {
        let lower: String = word.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_lowercase();
        if lower.chars().count() > 2 && !STOP_WORDS.contains(lower.as_str()) && seen.insert(lower.clone()) {
            terms.push(lower);
        }
    }
    terms
}

fn stem(word: &str) -> String {
    for suffix in STEM_SUFFIXES.iter() {
        if let Some(stripped) = word.strip_suffix(suffix) {
            if stripped.chars().count() >= 3 {
                return stripped.to_string();
            }
        }
    }
    word.to_string()
}

/// `extract_ilike_words(q, max)`: length≥3, not stop-word, augmented with
/// Russian suffix-stripped stems.
pub fn extract_ilike_words(q: &str, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut words = Vec::new();
    for word in q.split_whitespace() {
        if words.len() >= max {
            break;
        }
        let lower: String = word.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_lowercase();
        if lower.chars().count() < 3 || STOP_WORDS.contains(lower.as_str()) {
            continue;
        }
        if seen.insert(lower.clone()) {
            words.push(lower.clone());
        }
        let stemmed = stem(&lower);
        if stemmed != lower && seen.insert(stemmed.clone()) {
            words.push(stemmed);
        }
    }
    words
}

/// Keyword extraction for the fusion orchestrator's keyword branch
///: same rule as `extract_search_terms`, no dedicated limit.
pub fn extract_keywords(q: &str) -> Vec<String> {
    extract_search_terms(q)
}

/// `normalize(q)`: rejects strings that are only invisible characters,
/// punctuation, or emoji; otherwise returns the trimmed original.
pub fn normalize(q: &str) -> String {
    let trimmed = q.trim();
    if trimmed.is_empty() || ONLY_INVISIBLE_OR_PUNCT.is_match(trimmed) {
        return String::new();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_terms_drop_stop_words_and_short_tokens() {
        let terms = extract_search_terms("я помню что мы делали вчера");
        assert!(!terms.contains(&"я".to_string()));
        assert!(!terms.contains(&"что".to_string()));
        assert!(terms.contains(&"помню".to_string()));
        assert!(terms.contains(&"делали".to_string()));
    }

    #[test]
    fn search_terms_dedup() {
        let terms = extract_search_terms("кошка кошка собака");
        assert_eq!(terms, vec!["кошка".to_string(), "собака".to_string()]);
    }

    #[test]
    fn ilike_words_respects_max() {
        let words = extract_ilike_words("один два три четыре пять шесть", 3);
        assert!(words.len() <= 3 * 2); // stems may add one per word
    }

    #[test]
    fn normalize_rejects_punctuation_only() {
        assert_eq!(normalize("..."), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("🙂🙂"), "");
    }

    #[test]
    fn normalize_keeps_real_text() {
        assert_eq!(normalize("  кто тут был вчера?  "), "кто тут был вчера?");
    }
}
