//! Answer Generator: assembles a prompt from the question,
//! numbered retrieved context, memory context, and a kind-specific system
//! prompt, then calls `ModelRouter::complete_with_fallback`. Sanitization,
//! HTML fallback, and transport stay the caller's responsibility (the Ask
//! Worker). Prompt-assembly style grounded on
//! `backend/src/prompt/builders.rs`'s section-by-section `push_str` builder.

pub mod prompts;

use chrono::{DateTime, Utc};

use crate::collaborators::{LlmResponse, ModelRouter};
use crate::models::{AskKind, ContextMessage};

pub struct AnswerGenerator<'a> {
    router: &'a ModelRouter,
}

impl<'a> AnswerGenerator<'a> {
    pub fn new(router: &'a ModelRouter) -> Self {
        Self { router }
    }

    /// Normal path: answer grounded in retrieved context.
    pub async fn generate(
        &self,
        question: &str,
        context_windows: &[Vec<ContextMessage>],
        memory_context: Option<&str>,
        kind: AskKind,
    ) -> anyhow::Result<LlmResponse> {
        let system = match kind {
            AskKind::Ask => prompts::ASK_SYSTEM_PROMPT,
            AskKind::Smart => prompts::SMART_SYSTEM_PROMPT,
        };
        let prompt = build_prompt(question, context_windows, memory_context);
        self.router.complete_with_fallback(system, &prompt, 0.3).await
    }

    /// Confidence-gate fallback: `None` + `kind=smart`
    /// falls through to the general-purpose model with empty local context.
    pub async fn generate_general_purpose(&self, question: &str) -> anyhow::Result<LlmResponse> {
        let provider = self.router.general_purpose();
        provider
            .chat(prompts::GENERAL_PURPOSE_SYSTEM_PROMPT, &[crate::collaborators::LlmMessage::user(question)], 0.3)
            .await
    }
}

fn build_prompt(question: &str, context_windows: &[Vec<ContextMessage>], memory_context: Option<&str>) -> String {
    let mut prompt = String::new();

    prompt.push_str("Question: ");
    prompt.push_str(question);
    prompt.push_str("\n\n");

    if let Some(memory) = memory_context {
        if !memory.is_empty() {
            prompt.push_str("User/chat profile:\n");
            prompt.push_str(memory);
            prompt.push_str("\n\n");
        }
    }

    if context_windows.is_empty() {
        prompt.push_str("No relevant chat history was found.\n");
        return prompt;
    }

    prompt.push_str("Relevant chat history:\n");
    let mut n = 1;
    for window in context_windows {
        for message in window {
            prompt.push_str(&format!(
                "{n}. [{}] {}: {}\n",
                relative_time(message.date),
                message.author,
                message.text
            ));
            n += 1;
        }
        prompt.push('\n');
    }

    prompt
}

fn relative_time(date: DateTime<Utc>) -> String {
    let delta = Utc::now() - date;
    if delta.num_minutes() < 1 {
        "just now".to_string()
    } else if delta.num_hours() < 1 {
        format!("{}m ago", delta.num_minutes())
    } else if delta.num_days() < 1 {
        format!("{}h ago", delta.num_hours())
    } else if delta.num_days() < 30 {
        format!("{}d ago", delta.num_days())
    } else {
        date.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(minutes_ago: i64, author: &str, text: &str) -> ContextMessage {
        ContextMessage {
            message_id: 1,
            author: author.to_string(),
            text: text.to_string(),
            date: Utc::now() - chrono::Duration::minutes(minutes_ago),
            is_forwarded: false,
            forward_origin: None,
        }
    }

    #[test]
    fn prompt_numbers_messages_across_windows_sequentially() {
        let windows = vec![
            vec![message(120, "Ann", "hi"), message(110, "Bob", "hello")],
            vec![message(5, "Ann", "bye")],
        ];
        let prompt = build_prompt("what happened?", &windows, None);
        assert!(prompt.contains("1. ["));
        assert!(prompt.contains("2. ["));
        assert!(prompt.contains("3. ["));
        assert!(prompt.contains("bye"));
    }

    #[test]
    fn prompt_notes_absence_of_context() {
        let prompt = build_prompt("what happened?", &[], None);
        assert!(prompt.contains("No relevant chat history"));
    }

    #[test]
    fn prompt_includes_memory_context_when_present() {
        let prompt = build_prompt("q", &[], Some("likes rust"));
        assert!(prompt.contains("likes rust"));
    }

    #[test]
    fn relative_time_formats_recent_minutes() {
        let formatted = relative_time(Utc::now() - chrono::Duration::minutes(5));
        assert_eq!(formatted, "5m ago");
    }
}
