// src/lib.rs

pub mod answer;
pub mod cache;
pub mod collaborators;
pub mod config;
pub mod confidence;
pub mod context_window;
pub mod embedding_store;
pub mod error;
pub mod fusion;
pub mod indexer;
pub mod ingestion;
pub mod intent;
pub mod models;
pub mod normalize;
pub mod queue;
pub mod retrieval;
pub mod worker;

pub use config::CONFIG;
