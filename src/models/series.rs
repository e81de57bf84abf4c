// Raw upstream points, one type per metric kind

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitRatePoint {
    pub time: i64,
    /// Request hit ratio (%).
    pub request_hit_rate: f64,
    /// Byte (flow) hit ratio (%).
    pub flow_hit_rate: f64,
}

/// Bandwidth sample in Mbps (edge or origin-pull).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthPoint {
    pub time: i64,
    pub bandwidth: f64,
}

/// Request count sample (edge or origin-pull).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestNumPoint {
    pub time: i64,
    pub requests: f64,
}

/// Status-code counts for one interval, keyed by bucket name.
/// Class totals use `2xx`..`5xx`; literal codes use their number (`200`, `404`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCodePoint {
    pub time: i64,
    pub buckets: BTreeMap<String, u64>,
}

impl StatusCodePoint {
    pub fn count(&self, bucket: &str) -> u64 {
        self.buckets.get(bucket).copied().unwrap_or(0)
    }
}

/// Which tier the status codes are reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusLayer {
    /// Edge nodes serving clients.
    Edge,
    /// Upper tier, i.e. origin pulls.
    Origin,
}

impl StatusLayer {
    /// Value of the API's `Layer` parameter.
    pub fn as_api_param(self) -> &'static str {
        match self {
            StatusLayer::Edge => "edge",
            StatusLayer::Origin => "layer",
        }
    }
}

impl fmt::Display for StatusLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatusLayer::Edge => "edge",
            StatusLayer::Origin => "origin",
        })
    }
}
