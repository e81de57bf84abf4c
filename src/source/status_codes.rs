// Status-code detail as returned by GetUcdnDomainHttpCodeV2, and the explicit
// code -> accessor table used to turn it into named buckets.

use serde::Deserialize;

use crate::models::StatusCodePoint;

/// Status classes exported as ratio buckets, in output order.
pub const STATUS_CLASSES: [&str; 4] = ["2xx", "3xx", "4xx", "5xx"];

macro_rules! status_code_table {
    ($($field:ident => $wire:literal, $code:literal;)*) => {
        /// Per-class counters. Every class object carries the full field set;
        /// codes outside the class are reported as zero.
        #[derive(Debug, Clone, Default, Deserialize)]
        pub struct HttpCodeInfo {
            #[serde(rename = "Total", default)]
            pub total: u64,
            $(
                #[serde(rename = $wire, default)]
                pub $field: u64,
            )*
        }

        /// Literal status code -> accessor, one entry per counter the API reports.
        pub const STATUS_CODES: &[(&str, fn(&HttpCodeInfo) -> u64)] = &[
            $(($code, |c: &HttpCodeInfo| c.$field),)*
        ];
    };
}

status_code_table! {
    http_100 => "Http100", "100";
    http_101 => "Http101", "101";
    http_102 => "Http102", "102";
    http_200 => "Http200", "200";
    http_201 => "Http201", "201";
    http_202 => "Http202", "202";
    http_203 => "Http203", "203";
    http_204 => "Http204", "204";
    http_205 => "Http205", "205";
    http_206 => "Http206", "206";
    http_207 => "Http207", "207";
    http_300 => "Http300", "300";
    http_301 => "Http301", "301";
    http_302 => "Http302", "302";
    http_303 => "Http303", "303";
    http_304 => "Http304", "304";
    http_305 => "Http305", "305";
    http_306 => "Http306", "306";
    http_307 => "Http307", "307";
    http_400 => "Http400", "400";
    http_401 => "Http401", "401";
    http_402 => "Http402", "402";
    http_403 => "Http403", "403";
    http_404 => "Http404", "404";
    http_405 => "Http405", "405";
    http_406 => "Http406", "406";
    http_407 => "Http407", "407";
    http_408 => "Http408", "408";
    http_409 => "Http409", "409";
    http_410 => "Http410", "410";
    http_411 => "Http411", "411";
    http_412 => "Http412", "412";
    http_413 => "Http413", "413";
    http_414 => "Http414", "414";
    http_415 => "Http415", "415";
    http_416 => "Http416", "416";
    http_500 => "Http500", "500";
    http_501 => "Http501", "501";
    http_502 => "Http502", "502";
    http_503 => "Http503", "503";
    http_504 => "Http504", "504";
    http_505 => "Http505", "505";
}

/// One interval of the status-code detail list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpCodeDetail {
    #[serde(rename = "Time", default)]
    pub time: i64,
    #[serde(rename = "Http1XX", default)]
    pub http_1xx: HttpCodeInfo,
    #[serde(rename = "Http2XX", default)]
    pub http_2xx: HttpCodeInfo,
    #[serde(rename = "Http3XX", default)]
    pub http_3xx: HttpCodeInfo,
    #[serde(rename = "Http4XX", default)]
    pub http_4xx: HttpCodeInfo,
    #[serde(rename = "Http5XX", default)]
    pub http_5xx: HttpCodeInfo,
}

impl HttpCodeDetail {
    fn classes(&self) -> [(&'static str, &HttpCodeInfo); 4] {
        [
            ("2xx", &self.http_2xx),
            ("3xx", &self.http_3xx),
            ("4xx", &self.http_4xx),
            ("5xx", &self.http_5xx),
        ]
    }

    /// Flattens into named buckets: class totals plus every non-zero literal code.
    /// 1xx codes are kept as literal buckets but have no class bucket.
    pub fn to_point(&self) -> StatusCodePoint {
        let mut point = StatusCodePoint {
            time: self.time,
            ..Default::default()
        };
        for (class, info) in self.classes() {
            point.buckets.insert(class.to_string(), info.total);
        }
        let all = [&self.http_1xx, &self.http_2xx, &self.http_3xx, &self.http_4xx, &self.http_5xx];
        for (code, get) in STATUS_CODES {
            let count: u64 = all.iter().map(|info| get(info)).sum();
            if count > 0 {
                *point.buckets.entry((*code).to_string()).or_default() += count;
            }
        }
        point
    }
}

/// True for literal code buckets (`"404"`), false for class buckets (`"4xx"`).
pub fn is_literal_code(bucket: &str) -> bool {
    bucket.len() == 3 && bucket.bytes().all(|b| b.is_ascii_digit())
}
