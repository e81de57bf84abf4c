// Scrape coordination: snapshot -> per-domain statistics calls -> reductions -> samples.
// Each scrape is computed from scratch; nothing is cached between scrapes.

pub mod catalogue;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::aggregation::{MEAN_PRECISION, bucket_ratios, mean, round_to};
use crate::models::{Entity, EntitySnapshot, StatusCodePoint, StatusLayer, TimeWindow};
use crate::registry::EntityRegistry;
use crate::source::status_codes::{STATUS_CLASSES, is_literal_code};
use crate::source::{FetchError, FetchErrorKind, MetricKind, MetricSource, Query};

pub use catalogue::{Catalogue, MetricDesc, Sample};
use catalogue::{
    CDN_95_BAND_WIDTH, CDN_BACKSOURCE_BAND_WIDTH, CDN_BACKSOURCE_CODE,
    CDN_BACKSOURCE_REQUEST_NUM, CDN_BAND_WIDTH, CDN_FLUX_HIT_RATE, CDN_HIT_RATE, CDN_HTTP_CODE,
    CDN_REQUEST_NUM,
};

/// Per-scrape settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub project_id: String,
    pub area_code: String,
    /// Window length (seconds).
    pub range_time_secs: u64,
    /// Offset from now to the window end (seconds); less than `range_time_secs`.
    pub delay_time_secs: u64,
    /// Deadline for all statistics calls of one scrape.
    pub scrape_timeout: Duration,
    /// Domains fetched concurrently.
    pub max_concurrency: usize,
}

/// Result of one scrape, ready to render.
#[derive(Debug, Clone, Default)]
pub struct Scrape {
    /// `None` when the registry has never refreshed successfully.
    pub snapshot: Option<Arc<EntitySnapshot>>,
    pub samples: Vec<Sample>,
    /// Failed statistics calls by error kind.
    pub errors: BTreeMap<FetchErrorKind, u64>,
    /// Samples skipped because their window was empty or all-zero.
    pub degenerate: u64,
    pub duration: Duration,
}

impl Scrape {
    pub fn error_count(&self) -> u64 {
        self.errors.values().sum()
    }
}

/// Samples and failures for one domain.
#[derive(Default)]
struct EntityOutcome {
    samples: Vec<Sample>,
    errors: Vec<FetchErrorKind>,
    degenerate: u64,
}

impl EntityOutcome {
    fn push(&mut self, desc: &'static MetricDesc, entity: &Entity, value: Option<f64>) {
        match value {
            Some(v) => self
                .samples
                .push(Sample::new(desc, vec![entity.display_name.clone()], v)),
            None => {
                debug!(
                    entity = %entity.display_name,
                    metric = desc.name,
                    "empty window; sample skipped"
                );
                self.degenerate += 1;
            }
        }
    }

    fn push_ratios(
        &mut self,
        desc: &'static MetricDesc,
        entity: &Entity,
        ratios: Option<BTreeMap<String, f64>>,
    ) {
        match ratios {
            Some(ratios) => {
                for (status, pct) in ratios {
                    self.samples.push(Sample::new(
                        desc,
                        vec![entity.display_name.clone(), status],
                        pct,
                    ));
                }
            }
            None => {
                debug!(
                    entity = %entity.display_name,
                    metric = desc.name,
                    "zero status total; distribution skipped"
                );
                self.degenerate += 1;
            }
        }
    }

    /// Unwraps a fetch result, recording the failure when there is one.
    fn take<T>(
        &mut self,
        entity: &Entity,
        kind: MetricKind,
        result: Result<T, FetchError>,
    ) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(
                    entity = %entity.display_name,
                    entity_id = %entity.id,
                    metric_kind = %kind,
                    error_kind = %e.kind(),
                    error = %e,
                    "statistics call failed; sample skipped"
                );
                self.errors.push(e.kind());
                None
            }
        }
    }
}

pub struct ScrapeCoordinator {
    source: Arc<dyn MetricSource>,
    registry: Arc<EntityRegistry>,
    catalogue: Catalogue,
    config: ScrapeConfig,
}

impl ScrapeCoordinator {
    pub fn new(
        source: Arc<dyn MetricSource>,
        registry: Arc<EntityRegistry>,
        catalogue: Catalogue,
        config: ScrapeConfig,
    ) -> Self {
        Self {
            source,
            registry,
            catalogue,
            config,
        }
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Runs one full scrape. Per-call failures shrink the result; they never fail it.
    #[instrument(skip(self), fields(operation = "scrape"))]
    pub async fn collect(&self) -> Scrape {
        let started = Instant::now();
        let Some(snapshot) = self.registry.current() else {
            warn!("no entity snapshot yet; serving empty scrape");
            return Scrape::default();
        };

        let window = match TimeWindow::ending_at(
            chrono::Utc::now(),
            self.config.range_time_secs,
            self.config.delay_time_secs,
        ) {
            Ok(w) => w,
            Err(e) => {
                // Unreachable with a validated config.
                warn!(error = %e, "invalid scrape window; serving empty scrape");
                return Scrape::default();
            }
        };
        let deadline = started + self.config.scrape_timeout;

        let outcomes: Vec<EntityOutcome> = stream::iter(snapshot.entities.clone())
            .map(|entity| async move { self.collect_entity(&entity, window, deadline).await })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut scrape = Scrape {
            snapshot: Some(snapshot.clone()),
            ..Default::default()
        };
        for outcome in outcomes {
            scrape.samples.extend(outcome.samples);
            scrape.degenerate += outcome.degenerate;
            for kind in outcome.errors {
                *scrape.errors.entry(kind).or_default() += 1;
            }
        }
        scrape.duration = started.elapsed();

        info!(
            entities = snapshot.len(),
            samples = scrape.samples.len(),
            errors = scrape.error_count(),
            degenerate = scrape.degenerate,
            duration_ms = scrape.duration.as_millis() as u64,
            "scrape complete"
        );
        scrape
    }

    /// Collects and encodes one scrape as text exposition.
    pub async fn render(&self) -> prometheus::Result<String> {
        let scrape = self.collect().await;
        self.catalogue.render(&scrape)
    }

    async fn collect_entity(
        &self,
        entity: &Entity,
        window: TimeWindow,
        deadline: Instant,
    ) -> EntityOutcome {
        let query = Query {
            project_id: &self.config.project_id,
            area_code: &self.config.area_code,
            window,
        };
        let id = entity.id.as_str();
        let src = self.source.as_ref();

        let (hit, bw, bw95, origin_bw, req, origin_req, edge_codes, origin_codes) = tokio::join!(
            self.bounded(deadline, src.hit_rate(id, query)),
            self.bounded(deadline, src.bandwidth(id, query)),
            self.bounded(deadline, src.bandwidth_95th(id, query)),
            self.bounded(deadline, src.origin_bandwidth(id, query)),
            self.bounded(deadline, src.request_num(id, query)),
            self.bounded(deadline, src.origin_request_num(id, query)),
            self.bounded(deadline, src.http_codes(id, StatusLayer::Edge, query)),
            self.bounded(deadline, src.http_codes(id, StatusLayer::Origin, query)),
        );

        let mut out = EntityOutcome::default();

        if let Some(points) = out.take(entity, MetricKind::HitRate, hit) {
            out.push(&CDN_HIT_RATE, entity, mean(&points, |p| p.request_hit_rate));
            out.push(&CDN_FLUX_HIT_RATE, entity, mean(&points, |p| p.flow_hit_rate));
        }
        if let Some(points) = out.take(entity, MetricKind::Bandwidth, bw) {
            out.push(&CDN_BAND_WIDTH, entity, mean(&points, |p| p.bandwidth));
        }
        if let Some(value) = out.take(entity, MetricKind::Bandwidth95th, bw95) {
            let value = value.is_finite().then(|| round_to(value, MEAN_PRECISION));
            out.push(&CDN_95_BAND_WIDTH, entity, value);
        }
        if let Some(points) = out.take(entity, MetricKind::OriginBandwidth, origin_bw) {
            out.push(&CDN_BACKSOURCE_BAND_WIDTH, entity, mean(&points, |p| p.bandwidth));
        }
        if let Some(points) = out.take(entity, MetricKind::RequestNum, req) {
            out.push(&CDN_REQUEST_NUM, entity, mean(&points, |p| p.requests));
        }
        if let Some(points) = out.take(entity, MetricKind::OriginRequestNum, origin_req) {
            out.push(&CDN_BACKSOURCE_REQUEST_NUM, entity, mean(&points, |p| p.requests));
        }
        let layers = [
            (StatusLayer::Edge, &CDN_HTTP_CODE, edge_codes),
            (StatusLayer::Origin, &CDN_BACKSOURCE_CODE, origin_codes),
        ];
        for (layer, desc, result) in layers {
            if let Some(points) = out.take(entity, MetricKind::HttpCode(layer), result) {
                let (classes, codes) = status_distributions(&points);
                out.push_ratios(desc, entity, classes);
                if let Some(codes) = codes {
                    out.push_ratios(desc, entity, Some(codes));
                }
            }
        }
        out
    }

    /// Applies the scrape deadline to one call; running out of time is a fetch failure.
    async fn bounded<T>(
        &self,
        deadline: Instant,
        call: impl Future<Output = Result<T, FetchError>>,
    ) -> Result<T, FetchError> {
        match tokio::time::timeout_at(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.config.scrape_timeout)),
        }
    }
}

/// Class distribution over `2xx`..`5xx`, and literal-code distribution over the
/// codes seen with a non-zero count. The code map is `None` when no literal code
/// was reported, which is not counted as a degenerate window on its own.
pub fn status_distributions(
    points: &[StatusCodePoint],
) -> (Option<BTreeMap<String, f64>>, Option<BTreeMap<String, f64>>) {
    let count = |p: &StatusCodePoint, name: &str| p.count(name);
    let classes = bucket_ratios(points, count, &STATUS_CLASSES);

    let codes: Vec<&str> = points
        .iter()
        .flat_map(|p| p.buckets.iter())
        .filter(|(name, n)| **n > 0 && is_literal_code(name))
        .map(|(name, _)| name.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let codes = bucket_ratios(points, count, &codes);
    (classes, codes)
}
