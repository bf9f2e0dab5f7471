use serde::{Deserialize, Serialize};

use super::helpers::env_u64;

/// Tuning for the ingestion hook's periodic sliding-window rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub window_rebuild_interval_secs: u64,
    /// Only chats with a message in the last N days are rebuilt per cycle.
    pub active_chat_window_days: i64,
}

impl IngestionConfig {
    pub fn from_env() -> Self {
        Self {
            window_rebuild_interval_secs: env_u64("ASKBOT_WINDOW_REBUILD_INTERVAL_SECS", 10 * 60),
            active_chat_window_days: env_u64("ASKBOT_ACTIVE_CHAT_WINDOW_DAYS", 2) as i64,
        }
    }
}
