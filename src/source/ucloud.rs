// UCloud UCDN statistics API over signed HTTPS requests

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sha1::{Digest, Sha1};
use tracing::{debug, instrument};

use super::status_codes::HttpCodeDetail;
use super::{FetchError, MetricSource, Query};
use crate::models::{
    BandwidthPoint, Entity, HitRatePoint, RequestNumPoint, StatusCodePoint, StatusLayer,
};
use crate::version::USER_AGENT;

/// Series granularity requested from the API (0 = 5-minute points).
const SERIES_TYPE_5MIN: &str = "0";

/// RetCodes returned for bad signature, unknown public key and rejected credentials.
const AUTH_RET_CODES: [i64; 3] = [171, 172, 173];
const RATE_LIMIT_RET_CODE: i64 = 150;

/// Connection settings for [`UcloudClient`].
#[derive(Debug, Clone)]
pub struct UcloudClientConfig {
    pub base_url: String,
    pub public_key: String,
    pub private_key: String,
    pub request_timeout: Duration,
    /// Domains requested per directory page.
    pub page_size: u32,
}

pub struct UcloudClient {
    http: Client,
    config: UcloudClientConfig,
}

impl UcloudClient {
    pub fn new(config: UcloudClientConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http, config })
    }

    /// Sends one signed action and decodes the response body past the RetCode envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        mut params: BTreeMap<String, String>,
    ) -> Result<T, FetchError> {
        params.insert("Action".into(), action.into());
        params.insert("PublicKey".into(), self.config.public_key.clone());
        let signature = sign(&params, &self.config.private_key);
        params.insert("Signature".into(), signature);

        let response = self
            .http
            .post(&self.config.base_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                code: status.as_u16() as i64,
                message: body,
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth {
                code: status.as_u16() as i64,
                message: body,
            });
        }
        if !status.is_success() {
            return Err(FetchError::Upstream {
                code: status.as_u16() as i64,
                message: body,
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        check_ret_code(&value)?;
        debug!(action, bytes = body.len(), "ucloud call ok");
        serde_json::from_value(value).map_err(|e| FetchError::Decode(format!("{action}: {e}")))
    }

    fn transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.config.request_timeout)
        } else {
            FetchError::Network(e.to_string())
        }
    }

    fn series_params(
        &self,
        entity_id: &str,
        query: &Query<'_>,
    ) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        insert_project_id(&mut params, query.project_id);
        params.insert("DomainId.0".into(), entity_id.to_string());
        params.insert("BeginTime".into(), query.window.begin.to_string());
        params.insert("EndTime".into(), query.window.end.to_string());
        params.insert("Areacode".into(), query.area_code.to_string());
        params
    }

    fn typed_series_params(
        &self,
        entity_id: &str,
        query: &Query<'_>,
    ) -> BTreeMap<String, String> {
        let mut params = self.series_params(entity_id, query);
        params.insert("Type".into(), SERIES_TYPE_5MIN.into());
        params
    }
}

/// An empty project id means the account's default project and is left out.
fn insert_project_id(params: &mut BTreeMap<String, String>, project_id: &str) {
    if !project_id.is_empty() {
        params.insert("ProjectId".into(), project_id.to_string());
    }
}

/// Concatenates `key` + `value` for every parameter in key order, then the private key.
pub fn string_to_sign(params: &BTreeMap<String, String>, private_key: &str) -> String {
    let mut s = String::new();
    for (k, v) in params {
        s.push_str(k);
        s.push_str(v);
    }
    s.push_str(private_key);
    s
}

/// Lowercase hex SHA-1 of [`string_to_sign`].
pub fn sign(params: &BTreeMap<String, String>, private_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(string_to_sign(params, private_key).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Maps a non-zero RetCode to the matching [`FetchError`].
fn check_ret_code(value: &serde_json::Value) -> Result<(), FetchError> {
    let code = value
        .get("RetCode")
        .and_then(|c| c.as_i64())
        .ok_or_else(|| FetchError::Decode("missing RetCode".into()))?;
    if code == 0 {
        return Ok(());
    }
    let message = value
        .get("Message")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    Err(if AUTH_RET_CODES.contains(&code) {
        FetchError::Auth { code, message }
    } else if code == RATE_LIMIT_RET_CODE {
        FetchError::RateLimited { code, message }
    } else {
        FetchError::Upstream { code, message }
    })
}

#[derive(Debug, Deserialize)]
struct DomainInfoListResponse {
    #[serde(rename = "TotalCount", default)]
    total_count: usize,
    #[serde(rename = "DomainInfoList", default)]
    domain_info_list: Vec<DomainBaseInfo>,
}

#[derive(Debug, Deserialize)]
struct DomainBaseInfo {
    #[serde(rename = "DomainId")]
    domain_id: String,
    #[serde(rename = "Domain")]
    domain: String,
}

#[derive(Debug, Deserialize)]
struct HitRateResponse {
    #[serde(rename = "HitRateList", default)]
    hit_rate_list: Vec<HitRateInfo>,
}

#[derive(Debug, Deserialize)]
struct HitRateInfo {
    #[serde(rename = "Time", default)]
    time: i64,
    #[serde(rename = "RequestHitRate", default)]
    request_hit_rate: f64,
    #[serde(rename = "FlowHitRate", default)]
    flow_hit_rate: f64,
}

#[derive(Debug, Deserialize)]
struct BandwidthV2Response {
    #[serde(rename = "BandwidthTrafficList", default)]
    bandwidth_traffic_list: Vec<BandwidthTrafficInfo>,
}

#[derive(Debug, Deserialize)]
struct BandwidthTrafficInfo {
    #[serde(rename = "Time", default)]
    time: i64,
    #[serde(rename = "CdnBandwidth", default)]
    cdn_bandwidth: f64,
}

#[derive(Debug, Deserialize)]
struct Bandwidth95Response {
    #[serde(rename = "CdnBandwidth")]
    cdn_bandwidth: f64,
}

#[derive(Debug, Deserialize)]
struct PassBandwidthResponse {
    #[serde(rename = "BandwidthList", default)]
    bandwidth_list: Vec<PassBandwidthInfo>,
}

#[derive(Debug, Deserialize)]
struct PassBandwidthInfo {
    #[serde(rename = "Time", default)]
    time: i64,
    #[serde(rename = "Bandwidth", default)]
    bandwidth: f64,
}

#[derive(Debug, Deserialize)]
struct RequestNumResponse {
    #[serde(rename = "RequestList", default)]
    request_list: Vec<RequestInfo>,
}

#[derive(Debug, Deserialize)]
struct RequestInfo {
    #[serde(rename = "Time", default)]
    time: i64,
    #[serde(rename = "CdnRequest", default)]
    cdn_request: f64,
}

#[derive(Debug, Deserialize)]
struct HttpCodeV2Response {
    #[serde(rename = "HttpCodeDetail", default)]
    http_code_detail: Vec<HttpCodeDetail>,
}

fn sorted_by_time<T>(mut points: Vec<T>, time: impl Fn(&T) -> i64) -> Vec<T> {
    points.sort_by_key(|p| time(p));
    points
}

#[async_trait]
impl MetricSource for UcloudClient {
    #[instrument(skip(self), fields(source = "ucloud", operation = "list_entities"))]
    async fn list_entities(&self, project_id: &str) -> Result<Vec<Entity>, FetchError> {
        let page_size = self.config.page_size.max(1);
        let mut entities = Vec::new();
        let mut page_index: u32 = 1;
        loop {
            let mut params = BTreeMap::new();
            insert_project_id(&mut params, project_id);
            params.insert("PageSize".into(), page_size.to_string());
            params.insert("PageIndex".into(), page_index.to_string());
            let page: DomainInfoListResponse = self.call("GetUcdnDomainInfoList", params).await?;
            let received = page.domain_info_list.len();
            entities.extend(
                page.domain_info_list
                    .into_iter()
                    .map(|d| Entity::new(d.domain_id, d.domain)),
            );
            if received == 0 || entities.len() >= page.total_count {
                break;
            }
            page_index += 1;
        }
        Ok(entities)
    }

    async fn hit_rate(
        &self,
        entity_id: &str,
        query: Query<'_>,
    ) -> Result<Vec<HitRatePoint>, FetchError> {
        let resp: HitRateResponse = self
            .call(
                "GetUcdnDomainHitRate",
                self.typed_series_params(entity_id, &query),
            )
            .await?;
        let points = resp
            .hit_rate_list
            .into_iter()
            .map(|p| HitRatePoint {
                time: p.time,
                request_hit_rate: p.request_hit_rate,
                flow_hit_rate: p.flow_hit_rate,
            })
            .collect();
        Ok(sorted_by_time(points, |p: &HitRatePoint| p.time))
    }

    async fn bandwidth(
        &self,
        entity_id: &str,
        query: Query<'_>,
    ) -> Result<Vec<BandwidthPoint>, FetchError> {
        let resp: BandwidthV2Response = self
            .call(
                "GetUcdnDomainBandwidthV2",
                self.typed_series_params(entity_id, &query),
            )
            .await?;
        let points = resp
            .bandwidth_traffic_list
            .into_iter()
            .map(|p| BandwidthPoint {
                time: p.time,
                bandwidth: p.cdn_bandwidth,
            })
            .collect();
        Ok(sorted_by_time(points, |p: &BandwidthPoint| p.time))
    }

    async fn bandwidth_95th(
        &self,
        entity_id: &str,
        query: Query<'_>,
    ) -> Result<f64, FetchError> {
        let resp: Bandwidth95Response = self
            .call(
                "GetUcdnDomain95BandwidthV2",
                self.series_params(entity_id, &query),
            )
            .await?;
        Ok(resp.cdn_bandwidth)
    }

    async fn origin_bandwidth(
        &self,
        entity_id: &str,
        query: Query<'_>,
    ) -> Result<Vec<BandwidthPoint>, FetchError> {
        let resp: PassBandwidthResponse = self
            .call(
                "GetUcdnPassBandwidthV2",
                self.typed_series_params(entity_id, &query),
            )
            .await?;
        let points = resp
            .bandwidth_list
            .into_iter()
            .map(|p| BandwidthPoint {
                time: p.time,
                bandwidth: p.bandwidth,
            })
            .collect();
        Ok(sorted_by_time(points, |p: &BandwidthPoint| p.time))
    }

    async fn request_num(
        &self,
        entity_id: &str,
        query: Query<'_>,
    ) -> Result<Vec<RequestNumPoint>, FetchError> {
        let resp: RequestNumResponse = self
            .call(
                "GetUcdnDomainRequestNumV3",
                self.typed_series_params(entity_id, &query),
            )
            .await?;
        Ok(request_points(resp))
    }

    async fn origin_request_num(
        &self,
        entity_id: &str,
        query: Query<'_>,
    ) -> Result<Vec<RequestNumPoint>, FetchError> {
        let resp: RequestNumResponse = self
            .call(
                "GetUcdnDomainOriginRequestNum",
                self.typed_series_params(entity_id, &query),
            )
            .await?;
        Ok(request_points(resp))
    }

    async fn http_codes(
        &self,
        entity_id: &str,
        layer: StatusLayer,
        query: Query<'_>,
    ) -> Result<Vec<StatusCodePoint>, FetchError> {
        let mut params = self.typed_series_params(entity_id, &query);
        params.insert("Layer".into(), layer.as_api_param().into());
        let resp: HttpCodeV2Response = self.call("GetUcdnDomainHttpCodeV2", params).await?;
        let points = resp
            .http_code_detail
            .iter()
            .map(HttpCodeDetail::to_point)
            .collect();
        Ok(sorted_by_time(points, |p: &StatusCodePoint| p.time))
    }
}

fn request_points(resp: RequestNumResponse) -> Vec<RequestNumPoint> {
    let points = resp
        .request_list
        .into_iter()
        .map(|p| RequestNumPoint {
            time: p.time,
            requests: p.cdn_request,
        })
        .collect();
    sorted_by_time(points, |p: &RequestNumPoint| p.time)
}
