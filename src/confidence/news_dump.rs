//! News-dump detector: an auto-detected message class of
//! low personal relevance that receives a similarity penalty.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r"https?://\S+").unwrap();
    static ref INDICATOR_PHRASES: [&'static str; 8] = [
        "— СМИ", "Подписаться", "⚡", "❗", "🔴", "BREAKING", "Срочно:", "Источник:",
    ];
}

const LENGTH_THRESHOLD: usize = 800;
const URL_THRESHOLD: usize = 2;
const INDICATOR_THRESHOLD: usize = 2;

fn starts_with_high_surrogate(text: &str) -> bool {
    text.chars().next().is_some_and(|c| (0xD800..=0xDFFF).contains(&(c as u32)))
}

/// Counts indicators and flags dumps with ≥2.
pub fn is_news_dump(text: &str) -> bool {
    let mut indicators = 0usize;

    if text.chars().count() > LENGTH_THRESHOLD {
        indicators += 1;
    }
    if URL_RE.find_iter(text).count() >= URL_THRESHOLD {
        indicators += 1;
    }
    if INDICATOR_PHRASES.iter().any(|phrase| text.contains(phrase)) {
        indicators += 1;
    }
    if starts_with_high_surrogate(text) {
        indicators += 1;
    }

    indicators >= INDICATOR_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_long_link_heavy_text() {
        let long_text = "a".repeat(900);
        let text = format!("{long_text} http://a.com http://b.com");
        assert!(is_news_dump(&text));
    }

    #[test]
    fn does_not_flag_ordinary_message() {
        assert!(!is_news_dump("ты сегодня придешь на встречу?"));
    }

    #[test]
    fn flags_phrase_plus_two_urls_as_two_indicators() {
        assert!(is_news_dump("⚡ Срочно: подробности тут http://a.com и тут http://b.com"));
    }

    #[test]
    fn single_indicator_is_not_enough() {
        assert!(!is_news_dump("⚡ короткое сообщение"));
    }
}
