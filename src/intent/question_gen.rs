//! Question Generator: synthesizes a "hypothetical question" that a
//! message would answer, so the Q→A bridge embedding can match a future
//! question-shaped query against answer-shaped chat messages. Follows the
//! same LLM-call-then-parse-JSON shape as `classifier.rs` and
//! `nickname.rs`, falling back to a keyword-templated question on parse
//! failure or provider exception.

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::collaborators::{LlmMessage, LlmProvider};
use crate::intent::json_extract::extract_json;
use crate::normalize::extract_keywords;

const GENERATOR_SYSTEM_PROMPT: &str = r#"Given a single chat message, write one short question in the
same language that this message would be a natural answer to. Respond with a single JSON object:
{"question": "...", "confidence": 0.0-1.0}
Respond with JSON only, no commentary."#;

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    confidence: f32,
}

/// Minimum message length worth bridging: very short messages ("ок",
/// "+1", "lol") don't carry enough content to answer any question.
const MIN_TEXT_LEN: usize = 12;

pub struct QuestionGenerator {
    llm: Arc<dyn LlmProvider>,
}

impl QuestionGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Generates a hypothetical question for `text`, or `None` when the
    /// message is too short to bridge. Never returns an error: an LLM
    /// failure or malformed response falls back to a keyword-templated
    /// question rather than skipping the bridge row entirely.
    pub async fn generate(&self, author: &str, text: &str) -> Option<String> {
        if text.trim().chars().count() < MIN_TEXT_LEN {
            return None;
        }

        let prompt = format!("{author}: {text}");
        let response = match self.llm.chat(GENERATOR_SYSTEM_PROMPT, &[LlmMessage::user(prompt)], 0.4).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(err = %e, "question generator llm call failed, using pattern fallback");
                return Some(fallback_question(author, text));
            }
        };

        match extract_json(&response.content).and_then(|v| serde_json::from_value::<RawQuestion>(v).ok()) {
            Some(raw) if !raw.question.trim().is_empty() && raw.confidence > 0.0 => Some(raw.question),
            _ => {
                warn!("question generator response failed to parse, using pattern fallback");
                Some(fallback_question(author, text))
            }
        }
    }
}

/// Keyword-templated fallback: "What did {author} say about {keywords}?",
/// or just "What did {author} say?" when no keywords survive extraction.
fn fallback_question(author: &str, text: &str) -> String {
    let keywords = extract_keywords(text);
    if keywords.is_empty() {
        format!("What did {author} say?")
    } else {
        format!("What did {author} say about {}?", keywords.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::LlmResponse;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FixedProvider(String);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn chat(&self, _: &str, _: &[LlmMessage], _: f32) -> Result<LlmResponse> {
            Ok(LlmResponse { content: self.0.clone(), model: "fixed".into(), input_tokens: 1, output_tokens: 1 })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }
        async fn chat(&self, _: &str, _: &[LlmMessage], _: f32) -> Result<LlmResponse> {
            anyhow::bail!("provider down")
        }
    }

    #[tokio::test]
    async fn returns_none_for_short_messages() {
        let generator = QuestionGenerator::new(Arc::new(FixedProvider("{}".to_string())));
        assert!(generator.generate("sasha", "ок").await.is_none());
    }

    #[tokio::test]
    async fn parses_well_formed_json_response() {
        let body = r#"{"question": "What time is the meeting?", "confidence": 0.9}"#;
        let generator = QuestionGenerator::new(Arc::new(FixedProvider(body.to_string())));
        let question = generator.generate("sasha", "the meeting starts at 5pm tomorrow").await;
        assert_eq!(question, Some("What time is the meeting?".to_string()));
    }

    #[tokio::test]
    async fn falls_back_to_template_on_provider_failure() {
        let generator = QuestionGenerator::new(Arc::new(FailingProvider));
        let question = generator.generate("sasha", "the new deploy pipeline is finally green").await;
        assert!(question.unwrap().starts_with("What did sasha say about"));
    }

    #[tokio::test]
    async fn falls_back_to_template_on_malformed_response() {
        let generator = QuestionGenerator::new(Arc::new(FixedProvider("not json at all".to_string())));
        let question = generator.generate("sasha", "the new deploy pipeline is finally green").await;
        assert!(question.unwrap().starts_with("What did sasha say about"));
    }

    #[tokio::test]
    async fn falls_back_to_generic_template_when_no_keywords_survive() {
        let generator = QuestionGenerator::new(Arc::new(FailingProvider));
        let question = generator.generate("sasha", "а мы а мы а мы а мы").await;
        assert_eq!(question, Some("What did sasha say?".to_string()));
    }
}
