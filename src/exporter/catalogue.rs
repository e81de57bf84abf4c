// Fixed metric descriptors and text exposition.
// Descriptor names, help and label names never depend on the entity list;
// only label values do.

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use super::Scrape;
use crate::source::FetchErrorKind;

/// Label carrying the domain name.
pub const ENTITY_LABEL: &str = "instanceId";
/// Label carrying a status class (`2xx`) or literal code (`404`).
pub const STATUS_LABEL: &str = "status";
/// Label carrying a [`FetchErrorKind`] on the scrape error gauge.
pub const ERROR_KIND_LABEL: &str = "kind";

#[derive(Debug, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

const ENTITY: &[&str] = &[ENTITY_LABEL];
const ENTITY_STATUS: &[&str] = &[ENTITY_LABEL, STATUS_LABEL];

pub static CDN_HIT_RATE: MetricDesc = MetricDesc {
    name: "cdn_hit_rate",
    help: "Mean request hit ratio over the window (%)",
    labels: ENTITY,
};
pub static CDN_FLUX_HIT_RATE: MetricDesc = MetricDesc {
    name: "cdn_flux_hit_rate",
    help: "Mean byte hit ratio over the window (%)",
    labels: ENTITY,
};
pub static CDN_BAND_WIDTH: MetricDesc = MetricDesc {
    name: "cdn_band_width",
    help: "Mean edge bandwidth over the window (Mbps)",
    labels: ENTITY,
};
pub static CDN_95_BAND_WIDTH: MetricDesc = MetricDesc {
    name: "cdn_95_band_width",
    help: "95th percentile bandwidth over the window (Mbps)",
    labels: ENTITY,
};
pub static CDN_BACKSOURCE_BAND_WIDTH: MetricDesc = MetricDesc {
    name: "cdn_backsource_band_width",
    help: "Mean origin-pull bandwidth over the window (Mbps)",
    labels: ENTITY,
};
pub static CDN_REQUEST_NUM: MetricDesc = MetricDesc {
    name: "cdn_request_num",
    help: "Mean edge request count over the window",
    labels: ENTITY,
};
pub static CDN_BACKSOURCE_REQUEST_NUM: MetricDesc = MetricDesc {
    name: "cdn_backsource_request_num",
    help: "Mean origin-pull request count over the window",
    labels: ENTITY,
};
pub static CDN_HTTP_CODE: MetricDesc = MetricDesc {
    name: "cdn_http_code",
    help: "Edge HTTP status code distribution (%)",
    labels: ENTITY_STATUS,
};
pub static CDN_BACKSOURCE_CODE: MetricDesc = MetricDesc {
    name: "cdn_backsource_code",
    help: "Origin-pull HTTP status code distribution (%)",
    labels: ENTITY_STATUS,
};

pub static EXPORTER_ENTITIES: MetricDesc = MetricDesc {
    name: "cdn_exporter_entities",
    help: "Monitored domains in the snapshot used by this scrape",
    labels: &[],
};
pub static EXPORTER_SCRAPE_ERRORS: MetricDesc = MetricDesc {
    name: "cdn_exporter_scrape_errors",
    help: "Failed statistics calls during this scrape",
    labels: &[ERROR_KIND_LABEL],
};
pub static EXPORTER_SCRAPE_DURATION: MetricDesc = MetricDesc {
    name: "cdn_exporter_scrape_duration_seconds",
    help: "Time spent fetching and aggregating statistics for this scrape",
    labels: &[],
};
pub static EXPORTER_DEGENERATE_SAMPLES: MetricDesc = MetricDesc {
    name: "cdn_exporter_degenerate_samples",
    help: "Samples skipped during this scrape because their window was empty or summed to zero",
    labels: &[],
};
pub static EXPORTER_SNAPSHOT_AGE: MetricDesc = MetricDesc {
    name: "cdn_exporter_snapshot_age_seconds",
    help: "Age of the monitored-domain snapshot used by this scrape",
    labels: &[],
};

/// Every descriptor, per-domain metrics first.
pub static CATALOGUE: [&MetricDesc; 14] = [
    &CDN_HIT_RATE,
    &CDN_FLUX_HIT_RATE,
    &CDN_BAND_WIDTH,
    &CDN_95_BAND_WIDTH,
    &CDN_BACKSOURCE_BAND_WIDTH,
    &CDN_REQUEST_NUM,
    &CDN_BACKSOURCE_REQUEST_NUM,
    &CDN_HTTP_CODE,
    &CDN_BACKSOURCE_CODE,
    &EXPORTER_ENTITIES,
    &EXPORTER_SCRAPE_ERRORS,
    &EXPORTER_SCRAPE_DURATION,
    &EXPORTER_DEGENERATE_SAMPLES,
    &EXPORTER_SNAPSHOT_AGE,
];

/// One gauge value for a descriptor; `labels` follow the descriptor's label order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub desc: &'static MetricDesc,
    pub labels: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new(desc: &'static MetricDesc, labels: Vec<String>, value: f64) -> Self {
        Self {
            desc,
            labels,
            value,
        }
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .labels
            .iter()
            .position(|l| *l == name)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }
}

/// Descriptor set with the configured name prefix applied.
#[derive(Debug, Clone)]
pub struct Catalogue {
    namespace: String,
}

impl Catalogue {
    /// Validates every descriptor once so later scrapes cannot fail on a bad name.
    pub fn new(namespace: impl Into<String>) -> anyhow::Result<Self> {
        let catalogue = Self {
            namespace: namespace.into(),
        };
        for desc in CATALOGUE {
            catalogue.gauge_vec(desc)?;
        }
        Ok(catalogue)
    }

    pub fn full_name(&self, desc: &MetricDesc) -> String {
        if self.namespace.is_empty() {
            desc.name.to_string()
        } else {
            format!("{}_{}", self.namespace, desc.name)
        }
    }

    fn gauge_vec(&self, desc: &MetricDesc) -> prometheus::Result<GaugeVec> {
        GaugeVec::new(Opts::new(self.full_name(desc), desc.help), desc.labels)
    }

    /// Encodes a scrape as text exposition. A scrape without a snapshot renders empty.
    pub fn render(&self, scrape: &Scrape) -> prometheus::Result<String> {
        let Some(snapshot) = scrape.snapshot.as_ref() else {
            return Ok(String::new());
        };

        let registry = Registry::new();
        let mut vecs = Vec::with_capacity(CATALOGUE.len());
        for desc in CATALOGUE {
            let vec = self.gauge_vec(desc)?;
            registry.register(Box::new(vec.clone()))?;
            vecs.push((desc, vec));
        }
        let vec_for = |desc: &MetricDesc| {
            vecs.iter()
                .find(|(d, _)| std::ptr::eq(*d, desc))
                .map(|(_, v)| v)
        };

        for sample in &scrape.samples {
            let Some(vec) = vec_for(sample.desc) else {
                continue;
            };
            let labels: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
            vec.get_metric_with_label_values(&labels)?.set(sample.value);
        }

        if let Some(vec) = vec_for(&EXPORTER_ENTITIES) {
            vec.with_label_values(&[]).set(snapshot.len() as f64);
        }
        if let Some(vec) = vec_for(&EXPORTER_SCRAPE_ERRORS) {
            for kind in FetchErrorKind::ALL {
                let count = scrape.errors.get(&kind).copied().unwrap_or(0);
                vec.with_label_values(&[kind.as_str()]).set(count as f64);
            }
        }
        if let Some(vec) = vec_for(&EXPORTER_SCRAPE_DURATION) {
            vec.with_label_values(&[]).set(scrape.duration.as_secs_f64());
        }
        if let Some(vec) = vec_for(&EXPORTER_DEGENERATE_SAMPLES) {
            vec.with_label_values(&[]).set(scrape.degenerate as f64);
        }
        if let Some(vec) = vec_for(&EXPORTER_SNAPSHOT_AGE) {
            vec.with_label_values(&[])
                .set(snapshot.age_secs(chrono::Utc::now()));
        }

        let mut buf = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
