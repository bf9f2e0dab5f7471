use serde::{Deserialize, Serialize};

use super::helpers::{env_f32, env_usize};

/// Weights and thresholds for the hybrid retriever and fusion orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub dense_weight: f32,
    pub sparse_weight: f32,
    pub exact_boost: f32,
    pub time_decay_half_life_days: f32,
    pub time_decay_weight: f32,
    pub candidate_limit_cap: usize,
    pub candidate_multiplier_sparse: usize,
    pub candidate_multiplier_dense: usize,
    pub near_duplicate_similarity: f32,
    pub results_per_query: usize,
    pub rrf_k: u32,
    pub context_window_radius: usize,
    pub personal_pool_days: i64,
    pub personal_pool_self_cap: usize,
    pub personal_pool_mentions_cap: usize,
    pub personal_pool_search_limit: usize,
    pub news_dump_penalty: f32,
    pub user_cache_ttl_secs: u64,
}

impl RetrievalConfig {
    pub fn from_env() -> Self {
        Self {
            dense_weight: env_f32("ASKBOT_DENSE_WEIGHT", 0.7),
            sparse_weight: env_f32("ASKBOT_SPARSE_WEIGHT", 0.3),
            exact_boost: env_f32("ASKBOT_EXACT_BOOST", 0.15),
            time_decay_half_life_days: env_f32("ASKBOT_TIME_DECAY_HALF_LIFE_DAYS", 14.0),
            time_decay_weight: env_f32("ASKBOT_TIME_DECAY_WEIGHT", 0.1),
            candidate_limit_cap: env_usize("ASKBOT_CANDIDATE_LIMIT_CAP", 200),
            candidate_multiplier_sparse: env_usize("ASKBOT_CANDIDATE_MULTIPLIER_SPARSE", 10),
            candidate_multiplier_dense: env_usize("ASKBOT_CANDIDATE_MULTIPLIER_DENSE", 5),
            near_duplicate_similarity: env_f32("ASKBOT_NEAR_DUPLICATE_SIMILARITY", 0.98),
            results_per_query: env_usize("ASKBOT_RESULTS_PER_QUERY", 60),
            rrf_k: env_usize("ASKBOT_RRF_K", 60) as u32,
            context_window_radius: env_usize("ASKBOT_CONTEXT_WINDOW_RADIUS", 2),
            personal_pool_days: env_usize("ASKBOT_PERSONAL_POOL_DAYS", 7) as i64,
            personal_pool_self_cap: env_usize("ASKBOT_PERSONAL_POOL_SELF_CAP", 100),
            personal_pool_mentions_cap: env_usize("ASKBOT_PERSONAL_POOL_MENTIONS_CAP", 50),
            personal_pool_search_limit: env_usize("ASKBOT_PERSONAL_POOL_SEARCH_LIMIT", 20),
            news_dump_penalty: env_f32("ASKBOT_NEWS_DUMP_PENALTY", 0.05),
            user_cache_ttl_secs: env_usize("ASKBOT_USER_CACHE_TTL_SECS", 30 * 60) as u64,
        }
    }
}
