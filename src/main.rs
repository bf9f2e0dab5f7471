// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use askbot_backend::cache::ChatUserCache;
use askbot_backend::collaborators::{
    HttpEmbeddingClient, HttpReranker, LoggingChatGateway, ModelRouter, NullMemoryContextProvider,
    OpenAiCompatProvider,
};
use askbot_backend::config::CONFIG;
use askbot_backend::context_window::ContextWindowService;
use askbot_backend::embedding_store::EmbeddingStore;
use askbot_backend::fusion::FusionOrchestrator;
use askbot_backend::indexer::SlidingWindowIndexer;
use askbot_backend::ingestion::IngestionHook;
use askbot_backend::intent::{IntentClassifier, NicknameResolver, QuestionGenerator};
use askbot_backend::queue::AskQueue;
use askbot_backend::worker::deps::Dependencies;
use askbot_backend::worker::AskWorker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&CONFIG.logging.level)))
        .init();
    info!("starting askbot worker");

    let db = PgPoolOptions::new()
        .max_connections(CONFIG.database.max_connections)
        .connect(&CONFIG.database.url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let embed: Arc<dyn askbot_backend::collaborators::EmbeddingClient> = Arc::new(HttpEmbeddingClient::new(
        CONFIG.embedding.api_key.clone(),
        CONFIG.embedding.base_url.clone(),
        CONFIG.embedding.model.clone(),
        CONFIG.embedding.dimension,
    ));

    let reranker: Option<Arc<dyn askbot_backend::collaborators::Reranker>> = if CONFIG.rerank.enabled {
        let api_key = CONFIG.rerank.api_key.clone().unwrap_or_default();
        Some(Arc::new(HttpReranker::new(api_key, CONFIG.rerank.base_url.clone(), CONFIG.rerank.model.clone())))
    } else {
        None
    };

    let primary: Arc<dyn askbot_backend::collaborators::LlmProvider> = Arc::new(OpenAiCompatProvider::new(
        CONFIG.llm.api_key.clone(),
        CONFIG.llm.base_url.clone(),
        CONFIG.llm.primary_model.clone(),
    ));
    let fallback: Arc<dyn askbot_backend::collaborators::LlmProvider> = Arc::new(OpenAiCompatProvider::new(
        CONFIG.llm.api_key.clone(),
        CONFIG.llm.base_url.clone(),
        CONFIG.llm.fallback_model.clone(),
    ));
    let general_purpose: Arc<dyn askbot_backend::collaborators::LlmProvider> = Arc::new(OpenAiCompatProvider::new(
        CONFIG.llm.api_key.clone(),
        CONFIG.llm.base_url.clone(),
        CONFIG.llm.general_purpose_model.clone(),
    ));
    let router = Arc::new(ModelRouter::new(primary.clone(), fallback, general_purpose, true));

    let queue_config = Arc::new(CONFIG.queue.clone());
    let retrieval_config = Arc::new(CONFIG.retrieval.clone());
    let ingestion_config = Arc::new(CONFIG.ingestion.clone());

    let ask_queue = Arc::new(AskQueue::new(db.clone(), queue_config.clone()));
    let user_cache = Arc::new(ChatUserCache::new(db.clone(), Duration::from_secs(retrieval_config.user_cache_ttl_secs)));
    let classifier = Arc::new(IntentClassifier::new(primary.clone()));
    let nickname_resolver = Arc::new(NicknameResolver::new(primary.clone(), user_cache.clone()));

    let retriever = Arc::new(askbot_backend::retrieval::HybridRetriever::new(db.clone(), retrieval_config.clone()));
    let fusion = Arc::new(FusionOrchestrator::new(retriever, embed.clone(), reranker, db.clone(), retrieval_config.clone()));
    let context_window = Arc::new(ContextWindowService::new(db.clone(), retrieval_config.context_window_radius));

    let embedding_config = Arc::new(CONFIG.embedding.clone());
    let embedding_store = Arc::new(EmbeddingStore::new(db.clone(), embed.clone(), embedding_config));
    let indexer = Arc::new(SlidingWindowIndexer::new(db.clone(), embed.clone()));
    let question_generator = Arc::new(QuestionGenerator::new(primary.clone()));

    let deps = Arc::new(Dependencies {
        db: db.clone(),
        database_url: CONFIG.database.url.clone(),
        ask_queue,
        embed: embed.clone(),
        router,
        classifier,
        nickname_resolver,
        user_cache,
        fusion,
        context_window,
        chat: Arc::new(LoggingChatGateway),
        memory: Arc::new(NullMemoryContextProvider),
        queue_config,
        retrieval_config,
    });

    let worker = AskWorker::new(deps);
    let worker_handles = worker.start();

    let ingestion =
        Arc::new(IngestionHook::new(db, embedding_store, indexer, question_generator, ingestion_config));
    let ingestion_cancel = CancellationToken::new();
    let ingestion_handle = ingestion.spawn_periodic_rebuild(ingestion_cancel.clone());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    worker_handles.shutdown().await;
    ingestion_cancel.cancel();
    ingestion_handle.abort();

    Ok(())
}
