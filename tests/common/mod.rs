#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use stratsim::domain::error::StratsimError;
pub use stratsim::domain::ohlcv::Bar;
use stratsim::ports::data_port::HistoricalDataSource;
use stratsim::ports::sink_port::SimulationSink;
use stratsim::simulation::{FinalState, UpdateEvent};

pub struct MockDataSource {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_closes(mut self, symbol: &str, closes: &[f64]) -> Self {
        self.data.insert(symbol.to_string(), make_bars(closes));
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn check(&self, symbol: &str) -> Result<(), StratsimError> {
        match self.errors.get(symbol) {
            Some(reason) => Err(StratsimError::DataSource {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl HistoricalDataSource for MockDataSource {
    fn get_historical(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _interval: &str,
    ) -> Result<Vec<Bar>, StratsimError> {
        self.check(symbol)?;
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp >= start && b.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_latest_price(&self, symbol: &str) -> Result<f64, StratsimError> {
        self.check(symbol)?;
        self.data
            .get(symbol)
            .and_then(|bars| bars.last())
            .map(|b| b.close)
            .ok_or_else(|| StratsimError::PriceUnavailable {
                symbol: symbol.to_string(),
                reason: "no data".into(),
            })
    }
}

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
}

/// Flat daily bars from 2024-01-01.
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar::flat(day(i as i64), close))
        .collect()
}

pub fn window() -> (DateTime<Utc>, DateTime<Utc>) {
    (day(0), day(3650))
}

/// Falls 30 bars then rallies 30: one oversold entry and one overbought exit
/// for a short-period RSI.
pub fn v_shape(len: usize) -> Vec<f64> {
    let half = len / 2;
    (0..len)
        .map(|i| {
            if i < half {
                100.0 - i as f64 * 2.0
            } else {
                100.0 - half as f64 * 2.0 + (i - half) as f64 * 3.0
            }
        })
        .collect()
}

/// Deterministic oscillation around 100 that crosses any moving average often.
pub fn wave(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 100.0 + 10.0 * (i as f64 / 6.0).sin() + i as f64 * 0.05)
        .collect()
}

#[derive(Default)]
pub struct RecordingSink {
    pub updates: Mutex<Vec<UpdateEvent>>,
    pub completions: Mutex<Vec<FinalState>>,
    pub fail_updates: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail_updates: true,
            ..Self::default()
        }
    }
}

impl SimulationSink for RecordingSink {
    fn on_update(&self, event: &UpdateEvent) -> Result<(), StratsimError> {
        self.updates.lock().push(event.clone());
        if self.fail_updates {
            return Err(StratsimError::Persistence {
                reason: "disk full".into(),
            });
        }
        Ok(())
    }

    fn on_complete(&self, state: &FinalState) -> Result<(), StratsimError> {
        self.completions.lock().push(state.clone());
        Ok(())
    }
}
