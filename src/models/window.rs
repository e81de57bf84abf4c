// Request window: [now - range_time, now - delay_time]

use anyhow::ensure;
use chrono::{DateTime, Utc};

/// Closed time range (unix seconds) over which raw points are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub begin: i64,
    pub end: i64,
}

impl TimeWindow {
    /// Window ending `delay_secs` before `now` and starting `range_secs` before it.
    /// Rejects `delay_secs >= range_secs`, which would make the window empty.
    pub fn ending_at(now: DateTime<Utc>, range_secs: u64, delay_secs: u64) -> anyhow::Result<Self> {
        ensure!(
            range_secs > delay_secs,
            "range_time ({}) must be greater than delay_time ({})",
            range_secs,
            delay_secs
        );
        let now = now.timestamp();
        Ok(Self {
            begin: now - range_secs as i64,
            end: now - delay_secs as i64,
        })
    }

    pub fn len_secs(&self) -> i64 {
        self.end - self.begin
    }
}
