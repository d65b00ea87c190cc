//! Periodic removal of idle client windows.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::RateLimiter;

/// Spawn a task that calls [`RateLimiter::purge_idle`] on every limiter each `every`.
///
/// The task runs until the returned handle is aborted.
pub fn spawn_sweeper(limiters: Vec<Arc<RateLimiter>>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), limiters = limiters.len(), "Starting rate limit sweeper");

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let removed: usize = limiters.iter().map(|l| l.purge_idle()).sum();
            debug!(removed = removed, "Rate limit sweep finished");
        }
    })
}
