//! Intent Classifier: an LLM call parsed into a
//! `ClassifiedQuery`, falling back to hand-written patterns on parse failure
//! or provider exception so a flaky classifier never fails the whole ask.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::collaborators::LlmProvider;
use crate::intent::json_extract::extract_json;
use crate::models::{ClassifiedQuery, Entity, EntityType, Intent, TemporalRef, TemporalRefType};

const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You classify a chat question into exactly one intent:
PersonalSelf (about the asker), PersonalOther (about a named person), Factual, Event,
Temporal (about a time period), Comparison (between entities), MultiEntity (about several people).
Respond with a single JSON object:
{"intent": "...", "confidence": 0.0-1.0, "entities": [{"type": "person|topic|object", "text": "...", "mentioned_as": "..."}],
 "mentioned_people": ["..."], "temporal_ref": {"text": "...", "type": "relative|absolute", "relative_days": 0} or null,
 "reasoning": "..."}
Respond with JSON only, no commentary."#;

lazy_static! {
    static ref SELF_PRONOUNS: [&'static str; 7] = ["я", "мне", "меня", "мой", "моя", "моё", "мои"];
    static ref HANDLE_RE: Regex = Regex::new(r"@(\w+)").unwrap();
    static ref TEMPORAL_MARKERS: [(&'static str, i64); 6] = [
        ("сегодня", 0),
        ("вчера", 1),
        ("позавчера", 2),
        ("на этой неделе", 3),
        ("на прошлой неделе", 7),
        ("в прошлом месяце", 30),
    ];
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    confidence: f32,
    #[serde(default)]
    entities: Vec<RawEntity>,
    #[serde(default)]
    mentioned_people: Vec<String>,
    temporal_ref: Option<RawTemporalRef>,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    #[serde(rename = "type")]
    kind: String,
    text: String,
    mentioned_as: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTemporalRef {
    text: String,
    #[serde(rename = "type")]
    kind: String,
    relative_days: Option<i64>,
}

fn parse_intent(raw: &str) -> Option<Intent> {
    match raw {
        "PersonalSelf" => Some(Intent::PersonalSelf),
        "PersonalOther" => Some(Intent::PersonalOther),
        "Factual" => Some(Intent::Factual),
        "Event" => Some(Intent::Event),
        "Temporal" => Some(Intent::Temporal),
        "Comparison" => Some(Intent::Comparison),
        "MultiEntity" => Some(Intent::MultiEntity),
        _ => None,
    }
}

fn parse_entity_type(raw: &str) -> EntityType {
    match raw {
        "person" => EntityType::Person,
        "object" => EntityType::Object,
        _ => EntityType::Topic,
    }
}

fn try_parse(response: &str) -> Option<ClassifiedQuery> {
    let value = extract_json(response)?;
    let raw: RawClassification = serde_json::from_value(value).ok()?;
    let intent = parse_intent(&raw.intent)?;

    Some(ClassifiedQuery {
        intent,
        confidence: raw.confidence.clamp(0.0, 1.0),
        entities: raw
            .entities
            .into_iter()
            .map(|e| Entity { kind: parse_entity_type(&e.kind), text: e.text, mentioned_as: e.mentioned_as })
            .collect(),
        mentioned_people: raw.mentioned_people,
        temporal_ref: raw.temporal_ref.map(|t| TemporalRef {
            text: t.text,
            kind: if t.kind == "absolute" { TemporalRefType::Absolute } else { TemporalRefType::Relative },
            relative_days: t.relative_days,
        }),
        reasoning: raw.reasoning,
    })
}

/// Self-pronoun / `@handle` / temporal-marker heuristics, checked in that
/// priority order: a self-pronoun wins over an `@handle` mention even when
/// both appear in the same question.
fn fallback_classify(question: &str) -> ClassifiedQuery {
    let lower = question.to_lowercase();

    let words: Vec<&str> = lower.split_whitespace().collect();
    if words.iter().any(|w| SELF_PRONOUNS.contains(&w.trim_matches(|c: char| !c.is_alphabetic()))) {
        return ClassifiedQuery {
            intent: Intent::PersonalSelf,
            confidence: 0.6,
            entities: Vec::new(),
            mentioned_people: Vec::new(),
            temporal_ref: None,
            reasoning: "pattern fallback: self-pronoun".to_string(),
        };
    }

    if let Some(capture) = HANDLE_RE.captures(question) {
        let handle = capture.get(1).unwrap().as_str().to_string();
        return ClassifiedQuery {
            intent: Intent::PersonalOther,
            confidence: 0.6,
            entities: vec![Entity { kind: EntityType::Person, text: handle.clone(), mentioned_as: Some(format!("@{handle}")) }],
            mentioned_people: vec![handle],
            temporal_ref: None,
            reasoning: "pattern fallback: @handle mention".to_string(),
        };
    }

    if let Some(&(marker, relative_days)) = TEMPORAL_MARKERS.iter().find(|(m, _)| lower.contains(m)) {
        return ClassifiedQuery {
            intent: Intent::Temporal,
            confidence: 0.6,
            entities: Vec::new(),
            mentioned_people: Vec::new(),
            temporal_ref: Some(TemporalRef {
                text: marker.to_string(),
                kind: TemporalRefType::Relative,
                relative_days: Some(relative_days),
            }),
            reasoning: "pattern fallback: temporal marker".to_string(),
        };
    }

    ClassifiedQuery {
        intent: Intent::Factual,
        confidence: 0.5,
        entities: Vec::new(),
        mentioned_people: Vec::new(),
        temporal_ref: None,
        reasoning: "pattern fallback: default".to_string(),
    }
}

pub struct IntentClassifier {
    llm: Arc<dyn LlmProvider>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn classify(&self, question: &str) -> ClassifiedQuery {
        let response = match self.llm.chat(CLASSIFIER_SYSTEM_PROMPT, &[crate::collaborators::LlmMessage::user(question)], 0.1).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(err = %e, "intent classifier llm call failed, using pattern fallback");
                return fallback_classify(question);
            }
        };

        try_parse(&response.content).unwrap_or_else(|| {
            warn!("intent classifier response failed to parse, using pattern fallback");
            fallback_classify(question)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::collaborators::{LlmMessage, LlmResponse};
    use anyhow::Result;

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
    async fn parses_well_formed_json_response() {
        let body = r#"{"intent":"Factual","confidence":0.9,"entities":[],"mentioned_people":[],"temporal_ref":null,"reasoning":"ok"}"#;
        let classifier = IntentClassifier::new(Arc::new(FixedProvider(body.to_string())));
        let result = classifier.classify("What is the capital of France?").await;
        assert_eq!(result.intent, Intent::Factual);
        assert!((result.confidence - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn falls_back_to_pattern_on_provider_failure() {
        let classifier = IntentClassifier::new(Arc::new(FailingProvider));
        let result = classifier.classify("что говорили вчера?").await;
        assert_eq!(result.intent, Intent::Temporal);
    }

    #[tokio::test]
    async fn falls_back_to_pattern_on_malformed_response() {
        let classifier = IntentClassifier::new(Arc::new(FixedProvider("not json at all".to_string())));
        let result = classifier.classify("@sasha что говорил?").await;
        assert_eq!(result.intent, Intent::PersonalOther);
        assert_eq!(result.mentioned_people, vec!["sasha".to_string()]);
    }

    #[test]
    fn self_pronoun_fallback_is_personal_self() {
        let result = fallback_classify("что я говорил о работе?");
        assert_eq!(result.intent, Intent::PersonalSelf);
    }

    #[test]
    fn self_pronoun_takes_priority_over_handle_mention() {
        let result = fallback_classify("я спрашивал, что думает @sasha?");
        assert_eq!(result.intent, Intent::PersonalSelf);
    }

    #[test]
    fn default_fallback_is_factual() {
        let result = fallback_classify("какая погода завтра в городе");
        assert_eq!(result.intent, Intent::Factual);
    }
}
