//! `LlmComplete`/`LlmCompleteWithFallback`: opaque language
//! model gateway. Trait shape grounded on `backend/src/llm/provider/mod.rs`;
//! the tiered fallback behavior grounded on
//! `backend/src/llm/router/mod.rs::route_with_fallback` (try the primary
//! provider, fall through a tier chain on error).

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

impl LlmRole {
    fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: LlmRole::System, content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: LlmRole::User, content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(
        &self,
        system: &str,
        messages: &[LlmMessage],
        temperature: f32,
    ) -> Result<LlmResponse>;
}

/// Picks a provider tier for every completion, falling back to the next
/// tier when the primary fails.
pub struct ModelRouter {
    primary: Arc<dyn LlmProvider>,
    fallback: Arc<dyn LlmProvider>,
    general_purpose: Arc<dyn LlmProvider>,
    enable_fallback: bool,
}

impl ModelRouter {
    pub fn new(
        primary: Arc<dyn LlmProvider>,
        fallback: Arc<dyn LlmProvider>,
        general_purpose: Arc<dyn LlmProvider>,
        enable_fallback: bool,
    ) -> Self {
        Self { primary, fallback, general_purpose, enable_fallback }
    }

    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<LlmResponse> {
        self.primary.chat(system, &[LlmMessage::user(user)], temperature).await
    }

    /// Tries the primary tier; on failure (if fallback is enabled), tries
    /// the fallback tier, then the general-purpose tier. Returns the last
    /// error if every tier fails.
    pub async fn complete_with_fallback(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<LlmResponse> {
        let messages = [LlmMessage::user(user)];

        match self.primary.chat(system, &messages, temperature).await {
            Ok(resp) => return Ok(resp),
            Err(e) if !self.enable_fallback => return Err(e),
            Err(e) => warn!(provider = self.primary.name(), err = %e, "primary llm failed, falling back"),
        }

        match self.fallback.chat(system, &messages, temperature).await {
            Ok(resp) => return Ok(resp),
            Err(e) => warn!(provider = self.fallback.name(), err = %e, "fallback llm failed, trying general-purpose"),
        }

        self.general_purpose.chat(system, &messages, temperature).await
    }

    /// Used by the confidence gate: when retrieval
    /// confidence is `None` and `kind=smart`, answer with the general model
    /// and no local context rather than refusing outright.
    pub fn general_purpose(&self) -> Arc<dyn LlmProvider> {
        self.general_purpose.clone()
    }
}

pub struct OpenAiCompatProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiCompatProvider {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self { client: Client::new(), api_key, base_url, model }
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        system: &str,
        messages: &[LlmMessage],
        temperature: f32,
    ) -> Result<LlmResponse> {
        let mut body_messages = vec![ChatMessage { role: "system", content: system }];
        body_messages.extend(messages.iter().map(|m| ChatMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        let request = ChatRequest { model: &self.model, messages: body_messages, temperature };

        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            anyhow::bail!("llm provider error {}: {}", status, text);
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("no choices in llm response"))?;

        Ok(LlmResponse {
            content,
            model: parsed.model,
            input_tokens: parsed.usage.prompt_tokens,
            output_tokens: parsed.usage.completion_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProvider {
        name: &'static str,
        fail_times: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn chat(&self, _: &str, _: &[LlmMessage], _: f32) -> Result<LlmResponse> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("{} unavailable", self.name);
            }
            Ok(LlmResponse {
                content: format!("response from {}", self.name),
                model: self.name.to_string(),
                input_tokens: 10,
                output_tokens: 5,
            })
        }
    }

    fn mock(name: &'static str, fail_times: usize) -> Arc<dyn LlmProvider> {
        Arc::new(MockProvider { name, fail_times: AtomicUsize::new(fail_times) })
    }

    #[tokio::test]
    async fn falls_back_when_primary_fails() {
        let router = ModelRouter::new(mock("primary", 1), mock("fallback", 0), mock("general", 0), true);
        let resp = router.complete_with_fallback("sys", "question", 0.2).await.unwrap();
        assert_eq!(resp.content, "response from fallback");
    }

    #[tokio::test]
    async fn falls_through_to_general_purpose() {
        let router = ModelRouter::new(mock("primary", 1), mock("fallback", 1), mock("general", 0), true);
        let resp = router.complete_with_fallback("sys", "question", 0.2).await.unwrap();
        assert_eq!(resp.content, "response from general");
    }

    #[tokio::test]
    async fn no_fallback_when_disabled() {
        let router = ModelRouter::new(mock("primary", 1), mock("fallback", 0), mock("general", 0), false);
        let err = router.complete_with_fallback("sys", "question", 0.2).await;
        assert!(err.is_err());
    }
}
