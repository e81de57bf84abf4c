// Scrape coordination: partial failures, degenerate windows, rendering

mod common;

use std::time::Duration;

use common::*;
use ucdn_exporter::exporter::catalogue::{ENTITY_LABEL, STATUS_LABEL};
use ucdn_exporter::exporter::{Sample, Scrape};
use ucdn_exporter::models::{Entity, StatusLayer};
use ucdn_exporter::source::{FetchErrorKind, MetricKind};

const SAMPLES_PER_FULL_DOMAIN: usize = 19;

fn find<'a>(scrape: &'a Scrape, metric: &str, entity: &str) -> Vec<&'a Sample> {
    scrape
        .samples
        .iter()
        .filter(|s| s.desc.name == metric && s.label(ENTITY_LABEL) == Some(entity))
        .collect()
}

fn value(scrape: &Scrape, metric: &str, entity: &str) -> Option<f64> {
    find(scrape, metric, entity).first().map(|s| s.value)
}

fn status_value(scrape: &Scrape, metric: &str, entity: &str, status: &str) -> Option<f64> {
    find(scrape, metric, entity)
        .into_iter()
        .find(|s| s.label(STATUS_LABEL) == Some(status))
        .map(|s| s.value)
}

#[tokio::test]
async fn full_scrape_emits_every_metric_for_every_domain() {
    let (_registry, coordinator) = coordinator_for(three_domains(), scrape_config()).await;
    let scrape = coordinator.collect().await;

    assert_eq!(scrape.samples.len(), 3 * SAMPLES_PER_FULL_DOMAIN);
    assert_eq!(scrape.error_count(), 0);
    assert_eq!(scrape.degenerate, 0);

    for entity in ["a.example.com", "b.example.com", "c.example.com"] {
        assert_eq!(value(&scrape, "cdn_hit_rate", entity), Some(97.65));
        assert_eq!(value(&scrape, "cdn_flux_hit_rate", entity), Some(98.14));
        assert_eq!(value(&scrape, "cdn_band_width", entity), Some(15.0));
        assert_eq!(value(&scrape, "cdn_95_band_width", entity), Some(18.46));
        assert_eq!(value(&scrape, "cdn_backsource_band_width", entity), Some(2.0));
        assert_eq!(value(&scrape, "cdn_request_num", entity), Some(200.0));
        assert_eq!(value(&scrape, "cdn_backsource_request_num", entity), Some(10.0));
        assert_eq!(status_value(&scrape, "cdn_http_code", entity, "200"), Some(90.0));
        assert_eq!(status_value(&scrape, "cdn_http_code", entity, "404"), Some(7.5));
        assert_eq!(status_value(&scrape, "cdn_http_code", entity, "500"), Some(2.5));
        assert_eq!(status_value(&scrape, "cdn_http_code", entity, "2xx"), Some(90.0));
        assert_eq!(status_value(&scrape, "cdn_http_code", entity, "3xx"), Some(0.0));
        assert_eq!(status_value(&scrape, "cdn_backsource_code", entity, "2xx"), Some(100.0));
        assert_eq!(status_value(&scrape, "cdn_backsource_code", entity, "200"), Some(100.0));
    }
}

#[tokio::test]
async fn one_failed_call_skips_only_that_sample() {
    let source = three_domains();
    source.fail("ucdn-2", MetricKind::Bandwidth);
    let (_registry, coordinator) = coordinator_for(source, scrape_config()).await;
    let scrape = coordinator.collect().await;

    assert_eq!(scrape.samples.len(), 3 * SAMPLES_PER_FULL_DOMAIN - 1);
    assert_eq!(scrape.errors.get(&FetchErrorKind::Upstream), Some(&1));
    assert_eq!(value(&scrape, "cdn_band_width", "b.example.com"), None);
    assert_eq!(value(&scrape, "cdn_band_width", "a.example.com"), Some(15.0));
    assert_eq!(value(&scrape, "cdn_band_width", "c.example.com"), Some(15.0));
    assert_eq!(value(&scrape, "cdn_hit_rate", "b.example.com"), Some(97.65));
    assert_eq!(value(&scrape, "cdn_95_band_width", "b.example.com"), Some(18.46));
}

#[tokio::test]
async fn failed_status_call_skips_whole_distribution() {
    let source = three_domains();
    source.fail("ucdn-1", MetricKind::HttpCode(StatusLayer::Origin));
    let (_registry, coordinator) = coordinator_for(source, scrape_config()).await;
    let scrape = coordinator.collect().await;

    assert!(find(&scrape, "cdn_backsource_code", "a.example.com").is_empty());
    assert_eq!(find(&scrape, "cdn_http_code", "a.example.com").len(), 7);
    assert_eq!(scrape.samples.len(), 3 * SAMPLES_PER_FULL_DOMAIN - 5);
}

#[tokio::test]
async fn empty_windows_are_skipped_not_zeroed() {
    let source = FakeSource::with_domains(vec![(
        Entity::new("ucdn-idle", "idle.example.com"),
        DomainData {
            bandwidth_95th: 0.0,
            edge_codes: vec![codes(0, &[("2xx", 0), ("3xx", 0), ("4xx", 0), ("5xx", 0)])],
            ..Default::default()
        },
    )]);
    let (_registry, coordinator) = coordinator_for(source, scrape_config()).await;
    let scrape = coordinator.collect().await;

    // Only the scalar 95th percentile remains; every series and distribution was empty.
    assert_eq!(scrape.samples.len(), 1);
    assert_eq!(value(&scrape, "cdn_95_band_width", "idle.example.com"), Some(0.0));
    assert_eq!(scrape.error_count(), 0);
    assert_eq!(scrape.degenerate, 8);
}

#[tokio::test]
async fn hanging_call_times_out_and_is_skipped() {
    let source = three_domains();
    source.hang(MetricKind::Bandwidth95th);
    let mut config = scrape_config();
    config.scrape_timeout = Duration::from_millis(100);
    let (_registry, coordinator) = coordinator_for(source, config).await;
    let scrape = coordinator.collect().await;

    assert_eq!(scrape.errors.get(&FetchErrorKind::Timeout), Some(&3));
    assert_eq!(scrape.samples.len(), 3 * (SAMPLES_PER_FULL_DOMAIN - 1));
    assert_eq!(value(&scrape, "cdn_95_band_width", "a.example.com"), None);
    assert_eq!(value(&scrape, "cdn_hit_rate", "a.example.com"), Some(97.65));
}

#[tokio::test]
async fn scrape_without_snapshot_is_empty() {
    let source = three_domains();
    let registry = std::sync::Arc::new(ucdn_exporter::registry::EntityRegistry::new(
        source.clone(),
        "org-test",
    ));
    let coordinator = ucdn_exporter::exporter::ScrapeCoordinator::new(
        source,
        registry,
        ucdn_exporter::exporter::Catalogue::new("").unwrap(),
        scrape_config(),
    );
    let scrape = coordinator.collect().await;
    assert!(scrape.snapshot.is_none());
    assert!(scrape.samples.is_empty());
    assert_eq!(coordinator.render().await.unwrap(), "");
}

#[tokio::test]
async fn render_produces_gauge_exposition() {
    let source = three_domains();
    source.fail("ucdn-3", MetricKind::RequestNum);
    let (_registry, coordinator) = coordinator_for(source, scrape_config()).await;
    let text = coordinator.render().await.unwrap();

    assert!(text.contains("# TYPE cdn_hit_rate gauge"));
    assert!(text.contains("# HELP cdn_band_width "));
    assert!(text.contains("cdn_hit_rate{instanceId=\"a.example.com\"} 97.65"));
    assert!(text.contains("cdn_http_code{instanceId=\"b.example.com\",status=\"404\"} 7.5"));
    assert!(text.contains("cdn_request_num{instanceId=\"a.example.com\"} 200"));
    assert!(!text.contains("cdn_request_num{instanceId=\"c.example.com\"}"));
    assert!(text.contains("cdn_exporter_entities 3"));
    assert!(text.contains("cdn_exporter_scrape_errors{kind=\"upstream\"} 1"));
    assert!(text.contains("cdn_exporter_scrape_errors{kind=\"auth\"} 0"));
}

#[tokio::test]
async fn namespace_prefixes_rendered_names() {
    let source = three_domains();
    let registry = std::sync::Arc::new(ucdn_exporter::registry::EntityRegistry::new(
        source.clone(),
        "org-test",
    ));
    registry.refresh().await.unwrap();
    let coordinator = ucdn_exporter::exporter::ScrapeCoordinator::new(
        source,
        registry,
        ucdn_exporter::exporter::Catalogue::new("uCloud").unwrap(),
        scrape_config(),
    );
    let text = coordinator.render().await.unwrap();
    assert!(text.contains("uCloud_cdn_hit_rate{instanceId=\"a.example.com\"} 97.65"));
    assert!(!text.contains("\ncdn_hit_rate{"));
}

#[tokio::test]
async fn scrape_reads_latest_snapshot() {
    let source = three_domains();
    let (registry, coordinator) = coordinator_for(source.clone(), scrape_config()).await;
    source.set_entities(vec![Entity::new("ucdn-1", "a.example.com")]);
    registry.refresh().await.unwrap();

    let scrape = coordinator.collect().await;
    assert_eq!(scrape.samples.len(), SAMPLES_PER_FULL_DOMAIN);
    assert!(find(&scrape, "cdn_hit_rate", "b.example.com").is_empty());
}

fn assert_send<T: Send>(_: &T) {}

#[tokio::test]
async fn scrape_futures_are_send() {
    let (_registry, coordinator) = coordinator_for(three_domains(), scrape_config()).await;
    let coordinator = std::sync::Arc::new(coordinator);

    let collect = coordinator.collect();
    assert_send(&collect);
    let render = coordinator.render();
    assert_send(&render);

    // Runs on a spawned task, the way the HTTP layer drives it.
    let spawned = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.render().await }
    });
    let text = spawned.await.unwrap().unwrap();
    assert!(text.contains("cdn_exporter_entities 3"));
    drop((collect, render));
}

#[tokio::test]
async fn degenerate_count_is_rendered() {
    let source = FakeSource::with_domains(vec![(
        Entity::new("ucdn-idle", "idle.example.com"),
        DomainData::default(),
    )]);
    let (_registry, coordinator) = coordinator_for(source, scrape_config()).await;
    let text = coordinator.render().await.unwrap();

    assert!(text.contains("# TYPE cdn_exporter_degenerate_samples gauge"));
    assert!(text.contains("cdn_exporter_degenerate_samples 8"));
}
