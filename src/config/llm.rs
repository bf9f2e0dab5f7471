use serde::{Deserialize, Serialize};

use super::helpers::{env_or, require_env};

/// Connection details for the opaque language-model, embedding, and
/// reranker collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub general_purpose_model: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: require_env("ASKBOT_LLM_API_KEY"),
            base_url: env_or("ASKBOT_LLM_BASE_URL", "https://api.openai.com/v1"),
            primary_model: env_or("ASKBOT_LLM_PRIMARY_MODEL", "gpt-4o-mini"),
            fallback_model: env_or("ASKBOT_LLM_FALLBACK_MODEL", "gpt-4o-mini"),
            general_purpose_model: env_or("ASKBOT_LLM_GENERAL_MODEL", "gpt-4o-mini"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub max_batch_size: usize,
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: require_env("ASKBOT_EMBEDDING_API_KEY"),
            base_url: env_or("ASKBOT_EMBEDDING_BASE_URL", "https://api.openai.com/v1"),
            model: env_or("ASKBOT_EMBEDDING_MODEL", "text-embedding-3-small"),
            dimension: super::helpers::env_usize("ASKBOT_EMBEDDING_DIMENSION", 1536),
            max_batch_size: super::helpers::env_usize("ASKBOT_EMBEDDING_MAX_BATCH_SIZE", 64),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl RerankConfig {
    pub fn from_env() -> Self {
        let enabled = std::env::var("ASKBOT_RERANK_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        Self {
            enabled,
            api_key: std::env::var("ASKBOT_RERANK_API_KEY").ok(),
            base_url: env_or("ASKBOT_RERANK_BASE_URL", "https://api.cohere.ai/v1"),
            model: env_or("ASKBOT_RERANK_MODEL", "rerank-multilingual-v3.0"),
        }
    }
}
