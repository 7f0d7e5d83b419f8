//! Periodic background refresh of the standings cache.
//!
//! Sleeps for the configured interval, then asks the cache manager for a
//! refresh. A rebuild that is still running when the timer fires is left
//! alone; the next tick tries again.

use std::sync::Arc;

use crate::services::cache::{CacheManager, RefreshOutcome};

/// Floor on the refresh interval (seconds).
const REFRESH_MIN_INTERVAL_SECS: u64 = 60;

/// Should be spawned via `tokio::spawn(run_refresher(...))`.
pub async fn run_refresher(cache: Arc<CacheManager>, interval_secs: u64) {
    let interval_secs = effective_interval(interval_secs);
    tracing::info!("Background refresher started, interval {}s", interval_secs);

    loop {
        sleep_secs(interval_secs).await;

        match cache.refresh() {
            RefreshOutcome::Started => {
                tracing::info!("Refresher: started scheduled standings rebuild");
            }
            RefreshOutcome::AlreadyRunning => {
                tracing::info!("Refresher: rebuild already in flight, skipping this tick");
            }
        }
    }
}

fn effective_interval(requested: u64) -> u64 {
    if requested < REFRESH_MIN_INTERVAL_SECS {
        tracing::warn!(
            "Refresh interval {}s is below the minimum, using {}s",
            requested,
            REFRESH_MIN_INTERVAL_SECS
        );
        REFRESH_MIN_INTERVAL_SECS
    } else {
        requested
    }
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
}
