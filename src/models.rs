//! Data model types. Plain structs; no I/O here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub chat_id: i64,
    pub id: i64,
    pub from_user_id: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub text: Option<String>,
    pub date_utc: DateTime<Utc>,
    pub is_forwarded: bool,
    pub forward_origin_type: Option<String>,
    pub forward_from_name: Option<String>,
}

impl Message {
    /// `"{display_name || username || id}: {text}"` — the passage-embedding
    /// formatting rule.
    pub fn author_label(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.username.clone())
            .unwrap_or_else(|| self.from_user_id.to_string())
    }

    pub fn formatted_for_embedding(&self) -> String {
        format!("{}: {}", self.author_label(), self.text.as_deref().unwrap_or(""))
    }
}

/// Metadata JSON stored alongside an utterance embedding row.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UtteranceMetadata {
    #[serde(rename = "Username")]
    pub username: Option<String>,
    #[serde(rename = "DisplayName")]
    pub display_name: Option<String>,
    #[serde(rename = "FromUserId")]
    pub from_user_id: i64,
    #[serde(rename = "DateUtc")]
    pub date_utc: DateTime<Utc>,
    #[serde(rename = "StartDate", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(rename = "EndDate", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(rename = "MessageCount", skip_serializing_if = "Option::is_none")]
    pub message_count: Option<usize>,
    #[serde(rename = "MessageIds", skip_serializing_if = "Option::is_none")]
    pub message_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UtteranceEmbedding {
    pub chat_id: i64,
    pub message_id: i64,
    pub chunk_index: i32,
    pub chunk_text: String,
    #[sqlx(json)]
    pub metadata: Json,
    pub is_question: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SlidingWindowEmbedding {
    pub id: i64,
    pub chat_id: i64,
    pub center_message_id: i64,
    pub window_start_id: i64,
    pub window_end_id: i64,
    pub message_ids: Vec<i64>,
    pub context_text: String,
    pub window_size: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum AskKind {
    Ask,
    Smart,
}

impl std::fmt::Display for AskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ask => write!(f, "ask"),
            Self::Smart => write!(f, "smart"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AskJob {
    pub id: i64,
    pub chat_id: i64,
    pub reply_to_message_id: i64,
    pub question: String,
    pub kind: AskKind,
    pub asker_id: i64,
    pub asker_name: String,
    pub asker_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub picked_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub processed: bool,
    pub error: Option<String>,
    pub idempotency_key: String,
}

impl AskJob {
    pub fn idempotency_key(chat_id: i64, reply_to_message_id: i64, kind: AskKind) -> String {
        format!("{chat_id}:{reply_to_message_id}:{kind}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TruthJob {
    pub id: i64,
    pub chat_id: i64,
    pub message_count: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub picked_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub processed: bool,
    pub error: Option<String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    PersonalSelf,
    PersonalOther,
    Factual,
    Event,
    Temporal,
    Comparison,
    MultiEntity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    Person,
    Topic,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: EntityType,
    pub text: String,
    pub mentioned_as: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalRefType {
    Relative,
    Absolute,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalRef {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: TemporalRefType,
    pub relative_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedQuery {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: Vec<Entity>,
    pub mentioned_people: Vec<String>,
    pub temporal_ref: Option<TemporalRef>,
    pub reasoning: String,
}

impl ClassifiedQuery {
    pub fn temporal_detected(&self) -> bool {
        self.temporal_ref.is_some()
    }

    /// Specialized-search selection rule.
    pub fn needs_specialized_search(&self) -> bool {
        match self.intent {
            Intent::PersonalSelf => true,
            Intent::PersonalOther => !self.mentioned_people.is_empty(),
            Intent::Temporal => self.temporal_detected(),
            Intent::Comparison => self.entities.len() >= 2,
            Intent::MultiEntity => self.mentioned_people.len() >= 2,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chat_id: i64,
    pub message_id: i64,
    pub chunk_index: i32,
    pub chunk_text: String,
    pub metadata: Json,
    pub distance: f32,
    pub similarity: f32,
    pub is_news_dump: bool,
    pub is_question_embedding: bool,
    pub is_context_window: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub confidence: Confidence,
    pub confidence_reason: String,
    pub best_score: f32,
    pub score_gap: f32,
    pub has_full_text_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMessage {
    pub message_id: i64,
    pub author: String,
    pub text: String,
    pub date: DateTime<Utc>,
    pub is_forwarded: bool,
    pub forward_origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindow {
    pub messages: Vec<ContextMessage>,
}
