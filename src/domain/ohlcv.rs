//! OHLCV bar representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// A bar built from a single observed price, as produced by live ticks.
    pub fn flat(timestamp: DateTime<Utc>, price: f64) -> Self {
        Bar {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }
}

/// Close prices of a bar slice, in order.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Daily flat bars starting 2024-01-01, one per close.
#[cfg(test)]
pub(crate) fn daily_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone};
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::flat(start + Duration::days(i as i64), c))
        .collect()
}
