//! `Rerank(query, [doc], top_n) -> [{index, score}]`. No
//! teacher file reranks documents; modeled as a sibling trait to
//! `EmbeddingClient`/`LlmProvider` since it is the same shape of opaque
//! remote-scoring collaborator.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct RerankHit {
    pub index: usize,
    pub score: f32,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, docs: &[String], top_n: usize) -> Result<Vec<RerankHit>>;
}

pub struct HttpReranker {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl HttpReranker {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self { client: Client::new(), api_key, base_url, model }
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, docs: &[String], top_n: usize) -> Result<Vec<RerankHit>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let request = RerankRequest { model: &self.model, query, documents: docs, top_n };

        let response = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(anyhow!("reranker error {}: {}", status, text));
        }

        let parsed: RerankResponse = response.json().await?;
        Ok(parsed
            .results
            .into_iter()
            .map(|r| RerankHit { index: r.index, score: r.relevance_score })
            .collect())
    }
}
