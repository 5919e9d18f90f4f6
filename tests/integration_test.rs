//! Backtest engine integration tests against a mock data source.

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use std::sync::Arc;
use stratsim::domain::backtest::{BacktestEngine, BacktestRequest};
use stratsim::domain::error::StratsimError;
use stratsim::domain::execution::{Fill, Side};
use stratsim::domain::strategy::{
    Category, ParamDef, ParamValue, Params, PriceInput, Signal, SignalFrame, Strategy,
    StrategyRegistry,
};

/// Replays a fixed signal list, padded with Hold.
struct Scripted(Vec<Signal>);

impl Strategy for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }
    fn display_name(&self) -> &'static str {
        "Scripted"
    }
    fn description(&self) -> &'static str {
        "Fixed signals for tests."
    }
    fn category(&self) -> Category {
        Category::Quant
    }
    fn parameters(&self) -> Vec<ParamDef> {
        Vec::new()
    }
    fn generate_signals(
        &self,
        input: &PriceInput<'_>,
        _params: &Params,
    ) -> Result<SignalFrame, StratsimError> {
        let mut signals = self.0.clone();
        signals.resize(input.bars.len(), Signal::Hold);
        Ok(SignalFrame::new(signals))
    }
}

fn registry_with(script: Vec<Signal>) -> StrategyRegistry {
    let mut registry = StrategyRegistry::with_builtin();
    registry.register(Arc::new(Scripted(script)));
    registry
}

fn request(symbols: &[&str], strategy: &str) -> BacktestRequest {
    let (start, end) = window();
    BacktestRequest::new(symbols, strategy, start, end)
}

/// Fill fields that must repeat across runs; ids are random.
fn fill_key(fill: &Fill) -> (Side, String, f64, f64, f64, Option<f64>) {
    (
        fill.side,
        fill.symbol.clone(),
        fill.quantity,
        fill.price,
        fill.fee,
        fill.pnl,
    )
}

mod fee_scenario {
    use super::*;

    #[test]
    fn buy_then_sell_at_a_loss() {
        let data = MockDataSource::new().with_closes("AAPL", &[100.0, 105.0, 95.0, 110.0]);
        let registry = registry_with(vec![Signal::Buy, Signal::Hold, Signal::Sell]);
        let mut req = request(&["AAPL"], "scripted");
        req.fee_pct = 1.0;
        req.slippage_bps = 0.0;

        let result = BacktestEngine::new(&data, &registry).run(&req).unwrap();

        assert_eq!(result.fills.len(), 2);
        let buy = &result.fills[0];
        assert_eq!(buy.side, Side::Buy);
        assert_abs_diff_eq!(buy.quantity, 100.0);
        assert_abs_diff_eq!(buy.fee, 100.0, epsilon = 1e-9);

        let sell = &result.fills[1];
        assert_eq!(sell.side, Side::Sell);
        assert_abs_diff_eq!(sell.pnl.unwrap(), -695.0, epsilon = 1e-9);

        let equities: Vec<f64> = result.equity_curve.iter().map(|p| p.equity).collect();
        assert_eq!(equities.len(), 4);
        assert_abs_diff_eq!(equities[0], 99_900.0, epsilon = 1e-9);
        assert_abs_diff_eq!(equities[1], 100_400.0, epsilon = 1e-9);
        assert_abs_diff_eq!(equities[2], 99_305.0, epsilon = 1e-9);
        assert_abs_diff_eq!(equities[3], 99_305.0, epsilon = 1e-9);

        let m = &result.metrics;
        assert_eq!(m.total_trades, 1);
        assert_abs_diff_eq!(m.total_pnl, -695.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.return_pct, -0.695, epsilon = 1e-9);
        assert_abs_diff_eq!(m.win_rate, 0.0);
        assert_abs_diff_eq!(m.profit_factor, 0.0);
        assert_abs_diff_eq!(m.total_fees, 195.0, epsilon = 1e-9);
    }

    #[test]
    fn winning_round_trip_caps_profit_factor() {
        let data = MockDataSource::new().with_closes("AAPL", &[100.0, 120.0, 130.0]);
        let registry = registry_with(vec![Signal::Buy, Signal::Sell]);
        let mut req = request(&["AAPL"], "scripted");
        req.fee_pct = 0.0;
        req.slippage_bps = 0.0;

        let result = BacktestEngine::new(&data, &registry).run(&req).unwrap();
        assert_eq!(result.metrics.total_trades, 1);
        assert_abs_diff_eq!(result.metrics.win_rate, 1.0);
        assert_abs_diff_eq!(result.metrics.profit_factor, 999.99);
    }

    #[test]
    fn repeated_buy_does_not_pyramid() {
        let data = MockDataSource::new().with_closes("AAPL", &[100.0, 100.0, 100.0]);
        let registry = registry_with(vec![Signal::Buy, Signal::Buy, Signal::Buy]);
        let result = BacktestEngine::new(&data, &registry)
            .run(&request(&["AAPL"], "scripted"))
            .unwrap();
        assert_eq!(result.fills.len(), 1);
    }

    #[test]
    fn sell_while_flat_is_a_no_op() {
        let data = MockDataSource::new().with_closes("AAPL", &[100.0, 101.0]);
        let registry = registry_with(vec![Signal::Sell, Signal::Sell]);
        let result = BacktestEngine::new(&data, &registry)
            .run(&request(&["AAPL"], "scripted"))
            .unwrap();
        assert!(result.fills.is_empty());
        assert_abs_diff_eq!(result.equity_curve[1].equity, 100_000.0);
    }
}

mod builtin_strategies {
    use super::*;

    #[test]
    fn ma_crossover_trades_a_wave() {
        let data = MockDataSource::new().with_closes("SPY", &wave(120));
        let registry = StrategyRegistry::with_builtin();
        let mut req = request(&["SPY"], "ma_crossover");
        req.params.insert("fast_period".into(), ParamValue::Int(3));
        req.params.insert("slow_period".into(), ParamValue::Int(10));

        let result = BacktestEngine::new(&data, &registry).run(&req).unwrap();

        assert!(!result.fills.is_empty());
        assert_eq!(result.equity_curve.len(), 120);
        for (i, fill) in result.fills.iter().enumerate() {
            let expected = if i % 2 == 0 { Side::Buy } else { Side::Sell };
            assert_eq!(fill.side, expected, "fill {i} out of order");
        }
        assert_eq!(result.indicator_data["ma_fast"].len(), 120);
        assert_eq!(result.indicator_data["ma_slow"].len(), 120);
        assert!(result.indicator_data["ma_slow"][8].is_none());
        assert!(result.indicator_data["ma_slow"][9].is_some());
    }

    #[test]
    fn every_builtin_runs_on_the_same_series() {
        let data = MockDataSource::new().with_closes("SPY", &wave(250));
        let registry = StrategyRegistry::with_builtin();
        for name in registry.names() {
            let result = BacktestEngine::new(&data, &registry)
                .run(&request(&["SPY"], name))
                .unwrap_or_else(|e| panic!("{name} failed: {e}"));
            assert_eq!(result.equity_curve.len(), 250, "{name}");
            assert!(result.metrics.total_trades <= result.fills.len(), "{name}");
            for column in result.indicator_data.values() {
                assert_eq!(column.len(), 250, "{name}");
            }
        }
    }

    #[test]
    fn out_of_range_params_are_clamped_not_rejected() {
        let data = MockDataSource::new().with_closes("SPY", &wave(60));
        let registry = StrategyRegistry::with_builtin();
        let mut req = request(&["SPY"], "rsi");
        req.params.insert("period".into(), ParamValue::Int(1_000));
        req.params.insert("bogus".into(), ParamValue::Text("x".into()));

        let result = BacktestEngine::new(&data, &registry).run(&req).unwrap();
        // period clamps to 50: the first defined RSI is at index 50
        let rsi = &result.indicator_data["rsi"];
        assert!(rsi[49].is_none());
        assert!(rsi[50].is_some());
    }
}

mod pairs {
    use super::*;

    fn pair_data() -> MockDataSource {
        let a: Vec<f64> = wave(150);
        let b: Vec<f64> = (0..150).map(|i| 100.0 + i as f64 * 0.05).collect();
        MockDataSource::new()
            .with_closes("AAA", &a)
            .with_closes("BBB", &b)
    }

    #[test]
    fn pairs_uses_secondary_series() {
        let registry = StrategyRegistry::with_builtin();
        let mut req = request(&["AAA", "BBB"], "pairs_trading");
        req.params.insert("entry_z".into(), ParamValue::Float(1.0));
        req.params.insert("exit_z".into(), ParamValue::Float(0.5));
        let result = BacktestEngine::new(&pair_data(), &registry)
            .run(&req)
            .unwrap();

        assert!(result.indicator_data.contains_key("spread"));
        assert!(result.indicator_data.contains_key("spread_z"));
        assert!(!result.fills.is_empty());
        assert!(result.fills.iter().all(|f| f.symbol == "AAA"));
    }

    #[test]
    fn pairs_without_second_symbol_holds() {
        let registry = StrategyRegistry::with_builtin();
        let result = BacktestEngine::new(&pair_data(), &registry)
            .run(&request(&["AAA"], "pairs_trading"))
            .unwrap();
        assert!(result.fills.is_empty());
        assert_eq!(result.metrics.total_trades, 0);
    }

    #[test]
    fn short_secondary_series_leaves_gaps() {
        let data = MockDataSource::new()
            .with_closes("AAA", &wave(80))
            .with_closes("BBB", &[100.0; 40]);
        let registry = StrategyRegistry::with_builtin();
        let result = BacktestEngine::new(&data, &registry)
            .run(&request(&["AAA", "BBB"], "pairs_trading"))
            .unwrap();
        let spread = &result.indicator_data["spread"];
        assert_eq!(spread.len(), 80);
        assert!(spread[39].is_some());
        assert!(spread[40].is_none());
    }
}

mod boundaries {
    use super::*;

    #[test]
    fn empty_history_yields_zeroed_result() {
        let data = MockDataSource::new();
        let registry = StrategyRegistry::with_builtin();
        let result = BacktestEngine::new(&data, &registry)
            .run(&request(&["NONE"], "macd"))
            .unwrap();
        assert!(result.equity_curve.is_empty());
        assert!(result.fills.is_empty());
        assert_eq!(result.metrics.total_trades, 0);
        assert_abs_diff_eq!(result.metrics.return_pct, 0.0);
        assert_abs_diff_eq!(result.metrics.sharpe_ratio, 0.0);
    }

    #[test]
    fn two_bars_have_zero_sharpe() {
        let data = MockDataSource::new().with_closes("AAPL", &[100.0, 150.0]);
        let registry = registry_with(vec![Signal::Buy]);
        let result = BacktestEngine::new(&data, &registry)
            .run(&request(&["AAPL"], "scripted"))
            .unwrap();
        assert_eq!(result.equity_curve.len(), 2);
        assert_eq!(result.metrics.sharpe_ratio, 0.0);
    }

    #[test]
    fn unknown_strategy_lists_names() {
        let data = MockDataSource::new().with_closes("AAPL", &[1.0]);
        let registry = StrategyRegistry::with_builtin();
        match BacktestEngine::new(&data, &registry).run(&request(&["AAPL"], "nope")) {
            Err(StratsimError::UnknownStrategy { name, available }) => {
                assert_eq!(name, "nope");
                assert!(available.contains("ma_crossover"));
                assert!(available.contains("pairs_trading"));
            }
            other => panic!("expected UnknownStrategy, got {other:?}"),
        }
    }

    #[test]
    fn data_source_failure_propagates() {
        let data = MockDataSource::new().with_error("AAPL", "feed offline");
        let registry = StrategyRegistry::with_builtin();
        let err = BacktestEngine::new(&data, &registry)
            .run(&request(&["AAPL"], "rsi"))
            .unwrap_err();
        assert!(matches!(err, StratsimError::DataSource { .. }));
    }

    #[test]
    fn window_filters_history() {
        let data = MockDataSource::new().with_closes("AAPL", &wave(30));
        let registry = StrategyRegistry::with_builtin();
        let mut req = request(&["AAPL"], "rsi");
        req.start = day(10);
        req.end = day(19);
        let result = BacktestEngine::new(&data, &registry).run(&req).unwrap();
        assert_eq!(result.equity_curve.len(), 10);
        assert_eq!(result.equity_curve[0].timestamp, day(10));
    }
}

mod determinism {
    use super::*;

    #[test]
    fn same_inputs_same_fills_and_curve() {
        let data = MockDataSource::new().with_closes("SPY", &wave(200));
        let registry = StrategyRegistry::with_builtin();
        let req = request(&["SPY"], "bollinger");
        let engine = BacktestEngine::new(&data, &registry);

        let first = engine.run(&req).unwrap();
        let second = engine.run(&req).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(
            first.fills.iter().map(fill_key).collect::<Vec<_>>(),
            second.fills.iter().map(fill_key).collect::<Vec<_>>()
        );
        assert_eq!(first.equity_curve, second.equity_curve);
        assert_eq!(first.metrics, second.metrics);
        assert_eq!(first.indicator_data, second.indicator_data);
    }

    #[test]
    fn fill_ids_are_unique_hex() {
        let data = MockDataSource::new().with_closes("SPY", &wave(200));
        let registry = StrategyRegistry::with_builtin();
        let mut req = request(&["SPY"], "ma_crossover");
        req.params.insert("fast_period".into(), ParamValue::Int(3));
        req.params.insert("slow_period".into(), ParamValue::Int(10));
        let result = BacktestEngine::new(&data, &registry).run(&req).unwrap();

        let mut ids: Vec<&str> = result.fills.iter().map(|f| f.id.as_str()).collect();
        assert!(ids.iter().all(|id| id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit())));
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), result.fills.len());
    }
}
