//! Notification stream: each enqueue emits the new row's id
//! on a named channel via `pg_notify`; the worker blocks on this with a
//! timeout and, on wake or timeout, falls back to polling `pick`.
//! Notification delivery is a latency hint only — it must never be the sole
//! trigger, which is why `Worker` always re-polls after this returns.

use std::time::Duration;

use sqlx::postgres::PgListener;
use tracing::warn;

pub struct QueueNotifier {
    listener: PgListener,
}

impl QueueNotifier {
    pub async fn connect(database_url: &str, channel: &str) -> Result<Self, sqlx::Error> {
        let mut listener = PgListener::connect(database_url).await?;
        listener.listen(channel).await?;
        Ok(Self { listener })
    }

    /// Waits for a notification or `timeout`, whichever comes first. The
    /// payload (if any) is discarded by callers — it is only used to wake
    /// up sooner than the poll interval.
    pub async fn wait(&mut self, timeout: Duration) {
        match tokio::time::timeout(timeout, self.listener.recv()).await {
            Ok(Ok(_notification)) => {}
            Ok(Err(err)) => warn!(%err, "queue notification stream errored, falling back to poll"),
            Err(_elapsed) => {}
        }
    }
}
