//! Intent Classifier, Nickname Resolver & Question Generator. Grounded on
//! `backend/src/memory/features/message_pipeline/analyzers/chat_analyzer.rs`'s
//! LLM-call-then-parse-JSON shape and its multi-strategy JSON extraction.

pub mod classifier;
pub mod json_extract;
pub mod nickname;
pub mod question_gen;

pub use classifier::IntentClassifier;
pub use json_extract::extract_json;
pub use nickname::{NicknameResolution, NicknameResolver};
pub use question_gen::QuestionGenerator;
