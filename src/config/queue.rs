use serde::{Deserialize, Serialize};

use super::helpers::env_u64;

/// Lease, retry, and sweep tuning for the durable queue substrate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub ask_lease_timeout_secs: u64,
    pub truth_lease_timeout_secs: u64,
    pub max_attempts: i32,
    pub base_retry_delay_secs: u64,
    pub max_retry_delay_secs: u64,
    pub stale_sweep_interval_secs: u64,
    pub notification_wait_secs: u64,
    pub cleanup_after_days: i64,
}

impl QueueConfig {
    pub fn from_env() -> Self {
        Self {
            ask_lease_timeout_secs: env_u64("ASKBOT_ASK_LEASE_TIMEOUT_SECS", 5 * 60),
            truth_lease_timeout_secs: env_u64("ASKBOT_TRUTH_LEASE_TIMEOUT_SECS", 10 * 60),
            max_attempts: env_u64("ASKBOT_MAX_ATTEMPTS", 3) as i32,
            base_retry_delay_secs: env_u64("ASKBOT_BASE_RETRY_DELAY_SECS", 30),
            max_retry_delay_secs: env_u64("ASKBOT_MAX_RETRY_DELAY_SECS", 5 * 60),
            stale_sweep_interval_secs: env_u64("ASKBOT_STALE_SWEEP_INTERVAL_SECS", 60),
            notification_wait_secs: env_u64("ASKBOT_NOTIFICATION_WAIT_SECS", 30),
            cleanup_after_days: env_u64("ASKBOT_CLEANUP_AFTER_DAYS", 30) as i64,
        }
    }
}
