// Window reductions: series -> rounded mean, bucket counts -> rounded percentages.
// Pure functions; `None` means the window is degenerate and the sample is skipped.

use std::collections::BTreeMap;

/// Decimal places for mean values (hit rates, bandwidth, request counts).
pub const MEAN_PRECISION: u32 = 2;
/// Decimal places for status-code percentages.
pub const RATIO_PRECISION: u32 = 3;

/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Arithmetic mean of `selector` over `series`, rounded to [`MEAN_PRECISION`].
/// Returns `None` for an empty series or a non-finite result.
pub fn mean<P>(series: &[P], selector: impl Fn(&P) -> f64) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    // Summed in sorted order so the result does not depend on point order.
    let mut values: Vec<f64> = series.iter().map(selector).collect();
    values.sort_by(f64::total_cmp);
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    avg.is_finite().then(|| round_to(avg, MEAN_PRECISION))
}

/// Sums each named bucket over `series` and returns `100 * bucket / total` per name,
/// rounded to [`RATIO_PRECISION`]. The total is the sum of the named buckets only, so
/// the ratios add up to 100 up to rounding. Zero buckets are reported as `0.0`.
/// Returns `None` when the total is zero.
pub fn bucket_ratios<P, S>(
    series: &[P],
    bucket: impl Fn(&P, &str) -> u64,
    names: &[S],
) -> Option<BTreeMap<String, f64>>
where
    S: AsRef<str>,
{
    let sums: Vec<(&str, u64)> = names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            (name, series.iter().map(|p| bucket(p, name)).sum())
        })
        .collect();
    let total: u64 = sums.iter().map(|(_, n)| n).sum();
    if total == 0 {
        return None;
    }
    Some(
        sums.into_iter()
            .map(|(name, n)| {
                let pct = 100.0 * n as f64 / total as f64;
                (name.to_string(), round_to(pct, RATIO_PRECISION))
            })
            .collect(),
    )
}
