//! Batch backtest engine.
//!
//! Fetches the requested window once, runs the strategy over the whole
//! series, then walks the bars through a fresh broker: Buy only while flat,
//! sized at `position_size_pct` of current cash in whole shares; Sell closes
//! the whole position. Metrics are computed once at the end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::domain::config_validation::{
    DEFAULT_FEE_PCT, DEFAULT_INITIAL_CASH, DEFAULT_POSITION_SIZE_PCT, DEFAULT_SLIPPAGE_BPS,
};
use crate::domain::error::StratsimError;
use crate::domain::execution::{Broker, ExecutionConfig, Fill, Order, new_id, size_buy_quantity};
use crate::domain::indicator::Series;
use crate::domain::metrics::Metrics;
use crate::domain::portfolio::EquityPoint;
use crate::domain::strategy::{PriceInput, RawParams, Signal, StrategyRegistry};
use crate::ports::data_port::HistoricalDataSource;

pub const DEFAULT_INTERVAL: &str = "1d";

pub(crate) fn default_interval() -> String {
    DEFAULT_INTERVAL.to_string()
}
pub(crate) fn default_initial_cash() -> f64 {
    DEFAULT_INITIAL_CASH
}
pub(crate) fn default_fee_pct() -> f64 {
    DEFAULT_FEE_PCT
}
pub(crate) fn default_slippage_bps() -> f64 {
    DEFAULT_SLIPPAGE_BPS
}
pub(crate) fn default_position_size_pct() -> f64 {
    DEFAULT_POSITION_SIZE_PCT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    /// The first symbol is traded; the second feeds pair strategies.
    pub symbols: Vec<String>,
    pub strategy_name: String,
    #[serde(default)]
    pub params: RawParams,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,
    #[serde(default = "default_fee_pct")]
    pub fee_pct: f64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: f64,
    #[serde(default = "default_position_size_pct")]
    pub position_size_pct: f64,
}

impl BacktestRequest {
    pub fn new(
        symbols: &[&str],
        strategy_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        BacktestRequest {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            strategy_name: strategy_name.to_string(),
            params: RawParams::new(),
            start,
            end,
            interval: default_interval(),
            initial_cash: DEFAULT_INITIAL_CASH,
            fee_pct: DEFAULT_FEE_PCT,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            position_size_pct: DEFAULT_POSITION_SIZE_PCT,
        }
    }

    fn validate(&self) -> Result<(), StratsimError> {
        let fail = |reason: &str| {
            Err(StratsimError::InvalidRequest {
                reason: reason.to_string(),
            })
        };
        if self.symbols.is_empty() {
            return fail("at least one symbol is required");
        }
        if self.start > self.end {
            return fail("start must not be after end");
        }
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return fail("initial_cash must be positive");
        }
        if !(self.fee_pct >= 0.0 && self.fee_pct < 100.0) {
            return fail("fee_pct must be in [0, 100)");
        }
        if !(self.slippage_bps >= 0.0 && self.slippage_bps < 10_000.0) {
            return fail("slippage_bps must be in [0, 10000)");
        }
        if !(self.position_size_pct > 0.0 && self.position_size_pct <= 1.0) {
            return fail("position_size_pct must be in (0, 1]");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub id: String,
    pub metrics: Metrics,
    pub equity_curve: Vec<EquityPoint>,
    pub fills: Vec<Fill>,
    /// Indicator columns computed by the strategy, one value per bar.
    pub indicator_data: BTreeMap<String, Series>,
    pub duration_ms: u64,
}

impl BacktestResult {
    fn empty(id: String) -> Self {
        BacktestResult {
            id,
            metrics: Metrics::zeroed(),
            equity_curve: Vec::new(),
            fills: Vec::new(),
            indicator_data: BTreeMap::new(),
            duration_ms: 0,
        }
    }
}

/// Translate a signal into at most one order, gated on the current position:
/// Buy only while flat, sized at `position_size_pct` of cash in whole shares;
/// Sell closes the whole position. Anything else is a no-op.
pub fn execute_signal(
    broker: &mut Broker,
    symbol: &str,
    signal: Signal,
    price: f64,
    timestamp: DateTime<Utc>,
    position_size_pct: f64,
) -> Option<Fill> {
    let held = broker
        .portfolio()
        .get_position(symbol)
        .map(|p| p.quantity)
        .filter(|q| *q > 0.0);

    match (signal, held) {
        (Signal::Buy, None) => {
            let quantity = size_buy_quantity(broker.portfolio().cash, price, position_size_pct);
            if quantity > 0.0 {
                broker.submit_order(&Order::buy(symbol, quantity), price, timestamp)
            } else {
                None
            }
        }
        (Signal::Sell, Some(quantity)) => {
            broker.submit_order(&Order::sell(symbol, quantity), price, timestamp)
        }
        _ => None,
    }
}

/// Stateless and reentrant; holds only shared references.
pub struct BacktestEngine<'a> {
    data: &'a dyn HistoricalDataSource,
    strategies: &'a StrategyRegistry,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(data: &'a dyn HistoricalDataSource, strategies: &'a StrategyRegistry) -> Self {
        BacktestEngine { data, strategies }
    }

    pub fn run(&self, request: &BacktestRequest) -> Result<BacktestResult, StratsimError> {
        let started = Instant::now();
        let strategy = self.strategies.get(&request.strategy_name)?;
        request.validate()?;
        let id = new_id();
        let symbol = request.symbols[0].as_str();

        let bars = self
            .data
            .get_historical(symbol, request.start, request.end, &request.interval)?;
        if bars.is_empty() {
            tracing::info!(run_id = %id, symbol, "no historical data, returning empty result");
            return Ok(BacktestResult::empty(id));
        }

        let secondary = match request.symbols.get(1) {
            Some(other) if strategy.requires_pair() => {
                let other_bars =
                    self.data
                        .get_historical(other, request.start, request.end, &request.interval)?;
                Some(
                    (0..bars.len())
                        .map(|i| other_bars.get(i).map(|b| b.close))
                        .collect::<Vec<_>>(),
                )
            }
            _ => None,
        };

        let params = strategy.validate_params(&request.params);
        let input = PriceInput {
            bars: &bars,
            secondary: secondary.as_deref(),
        };
        let frame = strategy.generate_signals(&input, &params)?;
        if frame.signals.len() != bars.len() {
            return Err(StratsimError::SignalGeneration {
                strategy: strategy.name().to_string(),
                reason: format!(
                    "expected {} signals, got {}",
                    bars.len(),
                    frame.signals.len()
                ),
            });
        }

        let mut broker = Broker::new(
            request.initial_cash,
            ExecutionConfig {
                slippage_bps: request.slippage_bps,
                fee_pct: request.fee_pct,
            },
        );
        let mut equity_curve = Vec::with_capacity(bars.len());
        let mut prices = HashMap::with_capacity(1);

        for (bar, signal) in bars.iter().zip(&frame.signals) {
            let price = bar.close;
            execute_signal(
                &mut broker,
                symbol,
                *signal,
                price,
                bar.timestamp,
                request.position_size_pct,
            );

            prices.insert(symbol.to_string(), price);
            equity_curve.push(EquityPoint {
                timestamp: bar.timestamp,
                equity: broker.portfolio().get_equity(&prices),
                price,
            });
        }

        let metrics = Metrics::compute(&equity_curve, broker.fills(), request.initial_cash);
        let duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            run_id = %id,
            strategy = strategy.name(),
            symbol,
            bars = bars.len(),
            trades = metrics.total_trades,
            return_pct = metrics.return_pct,
            duration_ms,
            "backtest complete"
        );

        Ok(BacktestResult {
            id,
            metrics,
            equity_curve,
            fills: broker.fills().to_vec(),
            indicator_data: frame.indicators,
            duration_ms,
        })
    }
}
