// Central configuration for the ask/answer pipeline.

pub mod helpers;
pub mod ingestion;
pub mod llm;
pub mod queue;
pub mod retrieval;
pub mod server;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    pub static ref CONFIG: AskbotConfig = AskbotConfig::from_env();
}

/// Composes every domain config. Construction panics on a missing required
/// env var (fail fast at process start, never at first use).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskbotConfig {
    pub database: server::DatabaseConfig,
    pub logging: server::LoggingConfig,
    pub queue: queue::QueueConfig,
    pub retrieval: retrieval::RetrievalConfig,
    pub ingestion: ingestion::IngestionConfig,
    pub llm: llm::LlmConfig,
    pub embedding: llm::EmbeddingConfig,
    pub rerank: llm::RerankConfig,
}

impl AskbotConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            database: server::DatabaseConfig::from_env(),
            logging: server::LoggingConfig::from_env(),
            queue: queue::QueueConfig::from_env(),
            retrieval: retrieval::RetrievalConfig::from_env(),
            ingestion: ingestion::IngestionConfig::from_env(),
            llm: llm::LlmConfig::from_env(),
            embedding: llm::EmbeddingConfig::from_env(),
            rerank: llm::RerankConfig::from_env(),
        }
    }
}

impl Default for AskbotConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
