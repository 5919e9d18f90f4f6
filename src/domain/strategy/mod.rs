//! Strategy pipeline: signal generators over OHLCV series.
//!
//! A strategy declares a parameter schema and turns a price series into one
//! [`Signal`] per bar plus the indicator columns it computed on the way.
//! Strategies are edge-triggered: Buy/Sell is emitted only on the bar where
//! the strategy's own state changes, never repeated while the state holds.

pub mod bollinger;
pub mod ma_crossover;
pub mod macd;
pub mod mean_reversion;
pub mod momentum;
pub mod pairs_trading;
pub mod params;
pub mod registry;
pub mod rsi;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::error::StratsimError;
use crate::domain::indicator::Series;
use crate::domain::ohlcv::{Bar, closes};

pub use params::{ParamDef, ParamKind, ParamValue, Params, RawParams};
pub use registry::{StrategyInfo, StrategyRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i8")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl From<Signal> for i8 {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Buy => 1,
            Signal::Sell => -1,
            Signal::Hold => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Technical,
    Quant,
}

/// Price data handed to a strategy. `secondary` carries the second leg's
/// closes aligned by bar index, for strategies that trade a spread.
#[derive(Debug, Clone, Copy)]
pub struct PriceInput<'a> {
    pub bars: &'a [Bar],
    pub secondary: Option<&'a [Option<f64>]>,
}

impl<'a> PriceInput<'a> {
    pub fn single(bars: &'a [Bar]) -> Self {
        PriceInput {
            bars,
            secondary: None,
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        closes(self.bars)
    }
}

/// Strategy output: one signal per input bar and named indicator columns of
/// the same length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignalFrame {
    pub signals: Vec<Signal>,
    pub indicators: BTreeMap<String, Series>,
}

impl SignalFrame {
    pub fn new(signals: Vec<Signal>) -> Self {
        SignalFrame {
            signals,
            indicators: BTreeMap::new(),
        }
    }

    pub fn hold(len: usize) -> Self {
        Self::new(vec![Signal::Hold; len])
    }

    pub fn with_column(mut self, name: &str, series: Series) -> Self {
        self.indicators.insert(name.to_string(), series);
        self
    }

    pub fn last_signal(&self) -> Signal {
        self.signals.last().copied().unwrap_or(Signal::Hold)
    }
}

pub trait Strategy: Send + Sync {
    /// Registry key.
    fn name(&self) -> &'static str;
    fn display_name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn category(&self) -> Category;
    fn parameters(&self) -> Vec<ParamDef>;

    /// Whether the strategy trades the spread of two symbols.
    fn requires_pair(&self) -> bool {
        false
    }

    fn generate_signals(
        &self,
        input: &PriceInput<'_>,
        params: &Params,
    ) -> Result<SignalFrame, StratsimError>;

    /// Coerce raw parameters against the declared schema. See
    /// [`params::validate`] for the policy.
    fn validate_params(&self, raw: &RawParams) -> Params {
        params::validate(&self.parameters(), raw)
    }
}

/// Emit Buy on the bar the state enters `1` and Sell on the bar it enters
/// `-1`.
pub(crate) fn transitions(states: &[i8]) -> Vec<Signal> {
    states
        .iter()
        .enumerate()
        .map(|(i, &state)| {
            let prev = if i == 0 { None } else { Some(states[i - 1]) };
            match state {
                1 if prev != Some(1) => Signal::Buy,
                -1 if prev != Some(-1) => Signal::Sell,
                _ => Signal::Hold,
            }
        })
        .collect()
}

/// Emit the signal chosen by `decide(prev, cur)` wherever both the previous
/// and current points are defined.
pub(crate) fn crossings<F>(series: &[Option<f64>], decide: F) -> Vec<Signal>
where
    F: Fn(f64, f64) -> Signal,
{
    series
        .iter()
        .enumerate()
        .map(|(i, cur)| match (i.checked_sub(1).and_then(|p| series[p]), cur) {
            (Some(prev), Some(cur)) => decide(prev, *cur),
            _ => Signal::Hold,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Signal::Buy).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Signal::Sell).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&Signal::Hold).unwrap(), "0");
    }

    #[test]
    fn transitions_fire_once_per_state_change() {
        let signals = transitions(&[0, 1, 1, 0, -1, -1, 1]);
        assert_eq!(
            signals,
            vec![
                Signal::Hold,
                Signal::Buy,
                Signal::Hold,
                Signal::Hold,
                Signal::Sell,
                Signal::Hold,
                Signal::Buy,
            ]
        );
    }

    #[test]
    fn transitions_fire_on_first_bar() {
        assert_eq!(transitions(&[1, 1]), vec![Signal::Buy, Signal::Hold]);
    }

    #[test]
    fn crossings_skip_undefined_neighbours() {
        let series = vec![None, Some(1.0), Some(3.0), None, Some(5.0)];
        let signals = crossings(&series, |prev, cur| {
            if prev < 2.0 && cur >= 2.0 {
                Signal::Buy
            } else {
                Signal::Hold
            }
        });
        assert_eq!(
            signals,
            vec![
                Signal::Hold,
                Signal::Hold,
                Signal::Buy,
                Signal::Hold,
                Signal::Hold,
            ]
        );
    }

    #[test]
    fn last_signal_of_empty_frame_is_hold() {
        assert_eq!(SignalFrame::default().last_signal(), Signal::Hold);
    }
}
