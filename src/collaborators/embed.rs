//! `Embed`/`EmbedBatch`: opaque embedding provider interface.
//! Request/response shape and batch-order preservation grounded on
//! `backend/src/llm/provider/openai/embeddings.rs`; `task` and
//! `late_chunking` are additive: a sum type over providers with a
//! capability flag for late chunking, rather than one trait per provider.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTask {
    Query,
    Passage,
}

impl EmbedTask {
    fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Passage => "passage",
        }
    }
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>>;

    async fn embed_batch(
        &self,
        texts: &[String],
        task: EmbedTask,
        late_chunking: bool,
    ) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}

/// A sum type over the concrete remote providers this system can speak to.
/// Each variant supplies its own request body; the response parser is
/// shared because all three speak OpenAI-compatible embeddings JSON.
pub enum EmbeddingProvider {
    OpenAiCompat,
    HuggingFace,
    Jina,
}

pub struct HttpEmbeddingClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    provider: EmbeddingProvider,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: EmbeddingInput<'a>,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    late_chunking: Option<bool>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl HttpEmbeddingClient {
    pub fn new(api_key: String, base_url: String, model: String, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
            dimension,
            provider: EmbeddingProvider::OpenAiCompat,
        }
    }

    /// The "late chunking" hint is only meaningful for providers that
    /// support batching all windows together; for every
    /// other provider the flag is silently dropped by the request builder.
    fn supports_late_chunking(&self) -> bool {
        matches!(self.provider, EmbeddingProvider::Jina)
    }

    fn api_url(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    async fn request(&self, input: EmbeddingInput<'_>, late_chunking: bool) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            input,
            model: &self.model,
            late_chunking: self.supports_late_chunking().then_some(late_chunking),
        };

        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("embedding provider error {}: {}", status, error_text));
        }

        let result: EmbeddingResponse = response.json().await?;
        let mut indexed: Vec<(usize, Vec<f32>)> =
            result.data.into_iter().map(|d| (d.index, d.embedding)).collect();
        indexed.sort_by_key(|(idx, _)| *idx);
        Ok(indexed.into_iter().map(|(_, e)| e).collect())
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>> {
        debug!(task = task.as_str(), chars = text.len(), "embedding single text");
        let mut vecs = self.request(EmbeddingInput::Single(text), false).await?;
        vecs.pop().ok_or_else(|| anyhow!("no embedding returned"))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        task: EmbedTask,
        late_chunking: bool,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        info!(task = task.as_str(), n = texts.len(), "embedding batch");
        self.request(EmbeddingInput::Batch(texts), late_chunking).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_construction() {
        let client = HttpEmbeddingClient::new(
            "key".into(),
            "https://api.openai.com/v1".into(),
            "text-embedding-3-small".into(),
            1536,
        );
        assert_eq!(client.api_url(), "https://api.openai.com/v1/embeddings");
    }

    #[test]
    fn late_chunking_only_for_jina() {
        let client = HttpEmbeddingClient::new("k".into(), "u".into(), "m".into(), 1536);
        assert!(!client.supports_late_chunking());
    }
}
