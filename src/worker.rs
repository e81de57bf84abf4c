// Background directory refresh: re-lists monitored domains every ticker_time seconds
// until the shutdown signal fires.

use std::sync::Arc;

use tokio::time::{Duration, Instant, interval_at};

use crate::registry::EntityRegistry;

/// Registry handle and shutdown for the refresh worker.
pub struct RefreshDeps {
    pub registry: Arc<EntityRegistry>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

pub struct RefreshConfig {
    /// Refresh period (seconds). The first refresh happens one period after spawn.
    pub ticker_time_secs: u64,
}

pub fn spawn(deps: RefreshDeps, config: RefreshConfig) -> tokio::task::JoinHandle<()> {
    let RefreshDeps {
        registry,
        mut shutdown_rx,
    } = deps;
    let period = Duration::from_secs(config.ticker_time_secs);

    tokio::spawn(async move {
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut refreshes_ok: u64 = 0;
        let mut refreshes_failed: u64 = 0;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match registry.refresh().await {
                        Ok(_) => refreshes_ok += 1,
                        Err(e) => {
                            refreshes_failed += 1;
                            tracing::warn!(
                                error = %e,
                                kind = %e.kind(),
                                operation = "refresh_entities",
                                refreshes_failed,
                                "entity refresh failed; keeping previous snapshot"
                            );
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!(refreshes_ok, refreshes_failed, "Refresh worker shutting down");
                    break;
                }
            }
        }
    })
}
