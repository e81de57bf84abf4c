// Statistics source contract: one call per metric kind per entity per scrape.

pub mod status_codes;
pub mod ucloud;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    BandwidthPoint, Entity, HitRatePoint, RequestNumPoint, StatusCodePoint, StatusLayer,
    TimeWindow,
};

pub use ucloud::UcloudClient;

/// Coarse failure class, used for log fields and the scrape error gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FetchErrorKind {
    Network,
    Auth,
    RateLimited,
    Upstream,
    Timeout,
    Decode,
}

impl FetchErrorKind {
    pub const ALL: [FetchErrorKind; 6] = [
        FetchErrorKind::Network,
        FetchErrorKind::Auth,
        FetchErrorKind::RateLimited,
        FetchErrorKind::Upstream,
        FetchErrorKind::Timeout,
        FetchErrorKind::Decode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorKind::Network => "network",
            FetchErrorKind::Auth => "auth",
            FetchErrorKind::RateLimited => "rate_limited",
            FetchErrorKind::Upstream => "upstream",
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Decode => "decode",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication rejected (RetCode {code}): {message}")]
    Auth { code: i64, message: String },
    #[error("rate limited (RetCode {code}): {message}")]
    RateLimited { code: i64, message: String },
    #[error("upstream error (RetCode {code}): {message}")]
    Upstream { code: i64, message: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Network(_) => FetchErrorKind::Network,
            FetchError::Auth { .. } => FetchErrorKind::Auth,
            FetchError::RateLimited { .. } => FetchErrorKind::RateLimited,
            FetchError::Upstream { .. } => FetchErrorKind::Upstream,
            FetchError::Timeout(_) => FetchErrorKind::Timeout,
            FetchError::Decode(_) => FetchErrorKind::Decode,
        }
    }
}

/// One per-entity statistics call made during a scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    HitRate,
    Bandwidth,
    Bandwidth95th,
    OriginBandwidth,
    RequestNum,
    OriginRequestNum,
    HttpCode(StatusLayer),
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::HitRate => "hit_rate",
            MetricKind::Bandwidth => "bandwidth",
            MetricKind::Bandwidth95th => "bandwidth_95th",
            MetricKind::OriginBandwidth => "origin_bandwidth",
            MetricKind::RequestNum => "request_num",
            MetricKind::OriginRequestNum => "origin_request_num",
            MetricKind::HttpCode(StatusLayer::Edge) => "http_code",
            MetricKind::HttpCode(StatusLayer::Origin) => "origin_http_code",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the call a request is made for (project, area, window).
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    pub project_id: &'a str,
    pub area_code: &'a str,
    pub window: TimeWindow,
}

/// Provider statistics API. Series are time-ordered; an empty series means
/// "no data in window" and is not an error.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Full directory of monitored domains for a project.
    async fn list_entities(&self, project_id: &str) -> Result<Vec<Entity>, FetchError>;

    async fn hit_rate(
        &self,
        entity_id: &str,
        query: Query<'_>,
    ) -> Result<Vec<HitRatePoint>, FetchError>;

    async fn bandwidth(
        &self,
        entity_id: &str,
        query: Query<'_>,
    ) -> Result<Vec<BandwidthPoint>, FetchError>;

    /// 95th-percentile bandwidth (Mbps) over the window; always a single value.
    async fn bandwidth_95th(&self, entity_id: &str, query: Query<'_>)
    -> Result<f64, FetchError>;

    async fn origin_bandwidth(
        &self,
        entity_id: &str,
        query: Query<'_>,
    ) -> Result<Vec<BandwidthPoint>, FetchError>;

    async fn request_num(
        &self,
        entity_id: &str,
        query: Query<'_>,
    ) -> Result<Vec<RequestNumPoint>, FetchError>;

    async fn origin_request_num(
        &self,
        entity_id: &str,
        query: Query<'_>,
    ) -> Result<Vec<RequestNumPoint>, FetchError>;

    async fn http_codes(
        &self,
        entity_id: &str,
        layer: StatusLayer,
        query: Query<'_>,
    ) -> Result<Vec<StatusCodePoint>, FetchError>;
}
