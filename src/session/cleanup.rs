//! Periodic removal of expired sessions.

use crate::session::DynSessionStore;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Remove every session that expired before `now`, returning how many were removed. Store
/// errors are logged and count as zero.
pub async fn sweep(store: &DynSessionStore, now: OffsetDateTime) -> usize {
    match store.write().await.delete_expired(now).await {
        Ok(0) => {
            debug!("no expired sessions");
            0
        }
        Ok(count) => {
            info!(count, "removed expired sessions");
            count
        }
        Err(err) => {
            error!("expired session cleanup failed: {err}");
            0
        }
    }
}

/// Spawn a task that sweeps `store` every `interval`, starting one interval from now.
#[must_use]
pub fn spawn(store: DynSessionStore, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep(&store, OffsetDateTime::now_utc()).await;
        }
    })
}
