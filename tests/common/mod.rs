// Shared test helpers: an in-memory statistics source

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ucdn_exporter::exporter::{Catalogue, ScrapeConfig, ScrapeCoordinator};
use ucdn_exporter::models::*;
use ucdn_exporter::registry::EntityRegistry;
use ucdn_exporter::source::{FetchError, MetricKind, MetricSource, Query};

/// Canned series for one domain.
#[derive(Debug, Clone, Default)]
pub struct DomainData {
    pub hit_rate: Vec<HitRatePoint>,
    pub bandwidth: Vec<BandwidthPoint>,
    pub bandwidth_95th: f64,
    pub origin_bandwidth: Vec<BandwidthPoint>,
    pub request_num: Vec<RequestNumPoint>,
    pub origin_request_num: Vec<RequestNumPoint>,
    pub edge_codes: Vec<StatusCodePoint>,
    pub origin_codes: Vec<StatusCodePoint>,
}

#[derive(Default)]
pub struct FakeSource {
    pub entities: Mutex<Vec<Entity>>,
    pub fail_listing: Mutex<bool>,
    pub data: Mutex<HashMap<String, DomainData>>,
    pub failures: Mutex<HashSet<(String, MetricKind)>>,
    /// Calls of these kinds never complete.
    pub hangs: Mutex<HashSet<MetricKind>>,
    pub listing_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_domains(entities: Vec<(Entity, DomainData)>) -> Arc<Self> {
        let source = FakeSource::default();
        for (entity, data) in entities {
            source.data.lock().unwrap().insert(entity.id.clone(), data);
            source.entities.lock().unwrap().push(entity);
        }
        Arc::new(source)
    }

    pub fn fail(&self, entity_id: &str, kind: MetricKind) {
        self.failures
            .lock()
            .unwrap()
            .insert((entity_id.to_string(), kind));
    }

    pub fn hang(&self, kind: MetricKind) {
        self.hangs.lock().unwrap().insert(kind);
    }

    pub fn set_listing_failure(&self, fail: bool) {
        *self.fail_listing.lock().unwrap() = fail;
    }

    pub fn set_entities(&self, entities: Vec<Entity>) {
        *self.entities.lock().unwrap() = entities;
    }

    async fn lookup<T>(
        &self,
        entity_id: &str,
        kind: MetricKind,
        get: impl Fn(&DomainData) -> T,
    ) -> Result<T, FetchError> {
        if self.hangs.lock().unwrap().contains(&kind) {
            std::future::pending::<()>().await;
        }
        if self
            .failures
            .lock()
            .unwrap()
            .contains(&(entity_id.to_string(), kind))
        {
            return Err(FetchError::Upstream {
                code: 230,
                message: format!("injected failure for {kind}"),
            });
        }
        let data = self.data.lock().unwrap();
        Ok(data.get(entity_id).map(&get).unwrap_or_else(|| get(&DomainData::default())))
    }
}

#[async_trait]
impl MetricSource for FakeSource {
    async fn list_entities(&self, _project_id: &str) -> Result<Vec<Entity>, FetchError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_listing.lock().unwrap() {
            return Err(FetchError::Network("connection refused".into()));
        }
        Ok(self.entities.lock().unwrap().clone())
    }

    async fn hit_rate(&self, id: &str, _q: Query<'_>) -> Result<Vec<HitRatePoint>, FetchError> {
        self.lookup(id, MetricKind::HitRate, |d| d.hit_rate.clone()).await
    }

    async fn bandwidth(&self, id: &str, _q: Query<'_>) -> Result<Vec<BandwidthPoint>, FetchError> {
        self.lookup(id, MetricKind::Bandwidth, |d| d.bandwidth.clone()).await
    }

    async fn bandwidth_95th(&self, id: &str, _q: Query<'_>) -> Result<f64, FetchError> {
        self.lookup(id, MetricKind::Bandwidth95th, |d| d.bandwidth_95th).await
    }

    async fn origin_bandwidth(
        &self,
        id: &str,
        _q: Query<'_>,
    ) -> Result<Vec<BandwidthPoint>, FetchError> {
        self.lookup(id, MetricKind::OriginBandwidth, |d| d.origin_bandwidth.clone())
            .await
    }

    async fn request_num(&self, id: &str, _q: Query<'_>) -> Result<Vec<RequestNumPoint>, FetchError> {
        self.lookup(id, MetricKind::RequestNum, |d| d.request_num.clone()).await
    }

    async fn origin_request_num(
        &self,
        id: &str,
        _q: Query<'_>,
    ) -> Result<Vec<RequestNumPoint>, FetchError> {
        self.lookup(id, MetricKind::OriginRequestNum, |d| d.origin_request_num.clone())
            .await
    }

    async fn http_codes(
        &self,
        id: &str,
        layer: StatusLayer,
        _q: Query<'_>,
    ) -> Result<Vec<StatusCodePoint>, FetchError> {
        self.lookup(id, MetricKind::HttpCode(layer), |d| match layer {
            StatusLayer::Edge => d.edge_codes.clone(),
            StatusLayer::Origin => d.origin_codes.clone(),
        })
        .await
    }
}

pub fn hit(time: i64, request: f64, flow: f64) -> HitRatePoint {
    HitRatePoint {
        time,
        request_hit_rate: request,
        flow_hit_rate: flow,
    }
}

pub fn bw(time: i64, bandwidth: f64) -> BandwidthPoint {
    BandwidthPoint { time, bandwidth }
}

pub fn req(time: i64, requests: f64) -> RequestNumPoint {
    RequestNumPoint { time, requests }
}

pub fn codes(time: i64, buckets: &[(&str, u64)]) -> StatusCodePoint {
    StatusCodePoint {
        time,
        buckets: buckets.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

/// A domain with data for every metric kind.
pub fn full_domain_data() -> DomainData {
    DomainData {
        hit_rate: vec![
            hit(1662441600, 97.77, 98.16),
            hit(1662441900, 97.66, 98.13),
            hit(1662442200, 97.51, 98.13),
        ],
        bandwidth: vec![bw(1662441600, 10.0), bw(1662441900, 20.0)],
        bandwidth_95th: 18.456,
        origin_bandwidth: vec![bw(1662441600, 1.5), bw(1662441900, 2.5)],
        request_num: vec![req(1662441600, 100.0), req(1662441900, 300.0)],
        origin_request_num: vec![req(1662441600, 10.0)],
        edge_codes: vec![codes(
            1662441600,
            &[
                ("2xx", 180),
                ("3xx", 0),
                ("4xx", 15),
                ("5xx", 5),
                ("200", 180),
                ("404", 15),
                ("500", 5),
            ],
        )],
        origin_codes: vec![codes(
            1662441600,
            &[("2xx", 50), ("3xx", 0), ("4xx", 0), ("5xx", 0), ("200", 50)],
        )],
    }
}

pub fn scrape_config() -> ScrapeConfig {
    ScrapeConfig {
        project_id: "org-test".into(),
        area_code: "cn".into(),
        range_time_secs: 3000,
        delay_time_secs: 60,
        scrape_timeout: Duration::from_secs(5),
        max_concurrency: 4,
    }
}

/// Registry (already refreshed once) and coordinator over `source`.
pub async fn coordinator_for(
    source: Arc<FakeSource>,
    config: ScrapeConfig,
) -> (Arc<EntityRegistry>, ScrapeCoordinator) {
    let registry = Arc::new(EntityRegistry::new(source.clone(), "org-test"));
    registry.refresh().await.expect("initial refresh");
    let coordinator = ScrapeCoordinator::new(
        source,
        registry.clone(),
        Catalogue::new("").unwrap(),
        config,
    );
    (registry, coordinator)
}

pub fn three_domains() -> Arc<FakeSource> {
    FakeSource::with_domains(vec![
        (Entity::new("ucdn-1", "a.example.com"), full_domain_data()),
        (Entity::new("ucdn-2", "b.example.com"), full_domain_data()),
        (Entity::new("ucdn-3", "c.example.com"), full_domain_data()),
    ])
}
