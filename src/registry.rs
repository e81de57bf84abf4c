// Monitored-domain directory. Readers get an immutable snapshot via an atomic load;
// a refresh builds a new snapshot and swaps it in, or keeps the old one on failure.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tracing::{info, instrument, warn};

use crate::models::EntitySnapshot;
use crate::source::{FetchError, MetricSource};

pub struct EntityRegistry {
    source: Arc<dyn MetricSource>,
    project_id: String,
    snapshot: ArcSwapOption<EntitySnapshot>,
    next_version: AtomicU64,
}

impl EntityRegistry {
    pub fn new(source: Arc<dyn MetricSource>, project_id: impl Into<String>) -> Self {
        Self {
            source,
            project_id: project_id.into(),
            snapshot: ArcSwapOption::empty(),
            next_version: AtomicU64::new(1),
        }
    }

    /// Last successfully fetched snapshot; `None` until the first refresh succeeds.
    pub fn current(&self) -> Option<Arc<EntitySnapshot>> {
        self.snapshot.load_full()
    }

    /// Re-fetches the full directory. On failure the previous snapshot stays in place.
    #[instrument(skip(self), fields(operation = "refresh_entities", project_id = %self.project_id))]
    pub async fn refresh(&self) -> Result<Arc<EntitySnapshot>, FetchError> {
        let entities = self.source.list_entities(&self.project_id).await?;
        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        let snapshot = Arc::new(EntitySnapshot::new(version, chrono::Utc::now(), entities));
        self.snapshot.store(Some(snapshot.clone()));
        info!(entities = snapshot.len(), version, "entity snapshot refreshed");
        Ok(snapshot)
    }

    /// Retries the first refresh until it succeeds or `attempts` are used up.
    pub async fn bootstrap(
        &self,
        attempts: u32,
        retry_delay: Duration,
    ) -> anyhow::Result<Arc<EntitySnapshot>> {
        let mut last_err = None;
        for attempt in 1..=attempts.max(1) {
            match self.refresh().await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => {
                    warn!(
                        error = %e,
                        kind = %e.kind(),
                        attempt,
                        attempts,
                        operation = "bootstrap_entities",
                        "initial entity listing failed"
                    );
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(retry_delay).await;
                    }
                }
            }
        }
        match last_err {
            Some(e) => Err(anyhow::anyhow!(
                "could not list monitored domains after {} attempt(s): {}",
                attempts.max(1),
                e
            )),
            None => anyhow::bail!("entity bootstrap made no attempts"),
        }
    }
}
