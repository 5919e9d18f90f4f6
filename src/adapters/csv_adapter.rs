//! CSV file data source.
//!
//! One file per symbol at `<dir>/<SYMBOL>.csv` with the header
//! `timestamp,open,high,low,close,volume`. Timestamps are RFC 3339 or plain
//! `YYYY-MM-DD` dates (midnight UTC). The interval argument is ignored: a
//! file holds a single resolution.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::domain::error::StratsimError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::HistoricalDataSource;

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvDataSource {
    base_path: PathBuf,
}

impl CsvDataSource {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    /// Every bar in the symbol's file, sorted by timestamp.
    fn load(&self, symbol: &str) -> Result<Vec<Bar>, StratsimError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| StratsimError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| StratsimError::DataSource {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
                StratsimError::DataSource {
                    reason: format!(
                        "{}: invalid timestamp '{}' on row {}",
                        path.display(),
                        row.timestamp,
                        line + 1
                    ),
                }
            })?;
            bars.push(Bar {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

impl HistoricalDataSource for CsvDataSource {
    fn get_historical(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _interval: &str,
    ) -> Result<Vec<Bar>, StratsimError> {
        let mut bars = self.load(symbol)?;
        bars.retain(|b| b.timestamp >= start && b.timestamp <= end);
        tracing::debug!(symbol, bars = bars.len(), "loaded CSV bars");
        Ok(bars)
    }

    fn get_latest_price(&self, symbol: &str) -> Result<f64, StratsimError> {
        self.load(symbol)?
            .last()
            .map(|b| b.close)
            .ok_or_else(|| StratsimError::PriceUnavailable {
                symbol: symbol.to_string(),
                reason: "no rows in CSV file".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, CsvDataSource) {
        let dir = TempDir::new().unwrap();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16T00:00:00Z,105.0,115.0,100.0,110.0,60000\n";

        fs::write(dir.path().join("BHP.csv"), csv_content).unwrap();
        fs::write(
            dir.path().join("EMPTY.csv"),
            "timestamp,open,high,low,close,volume\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("BROKEN.csv"),
            "timestamp,open,high,low,close,volume\nyesterday,1,1,1,1,1\n",
        )
        .unwrap();

        let source = CsvDataSource::new(dir.path());
        (dir, source)
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn get_historical_returns_sorted_bars() {
        let (_dir, source) = setup_test_data();
        let bars = source.get_historical("BHP", day(1), day(31), "1d").unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].timestamp, day(15));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000.0);
        assert_eq!(bars[1].timestamp, day(16));
        assert_eq!(bars[2].timestamp, day(17));
    }

    #[test]
    fn get_historical_filters_by_window() {
        let (_dir, source) = setup_test_data();
        let bars = source.get_historical("BHP", day(16), day(16), "1d").unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 110.0);
    }

    #[test]
    fn missing_file_is_a_data_source_error() {
        let (_dir, source) = setup_test_data();
        let result = source.get_historical("XYZ", day(1), day(31), "1d");
        assert!(matches!(result, Err(StratsimError::DataSource { .. })));
    }

    #[test]
    fn bad_timestamp_is_reported() {
        let (_dir, source) = setup_test_data();
        match source.get_historical("BROKEN", day(1), day(31), "1d") {
            Err(StratsimError::DataSource { reason }) => assert!(reason.contains("yesterday")),
            other => panic!("expected DataSource error, got {other:?}"),
        }
    }

    #[test]
    fn latest_price_is_last_close() {
        let (_dir, source) = setup_test_data();
        assert_eq!(source.get_latest_price("BHP").unwrap(), 115.0);
        assert!(matches!(
            source.get_latest_price("EMPTY"),
            Err(StratsimError::PriceUnavailable { .. })
        ));
    }
}
