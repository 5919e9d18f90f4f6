//! Two-symbol spread trading.
//!
//! The spread is `close - secondary` aligned by bar index and z-scored over a
//! rolling window. The position state enters long below `-entry_z`, short
//! above `entry_z`, and returns to flat once `|z| <= exit_z`; between those
//! bands it keeps its previous value. Only the long leg on the primary symbol
//! is traded, so the short state surfaces as Sell.

use super::{Category, ParamDef, Params, PriceInput, SignalFrame, Strategy, transitions};
use crate::domain::error::StratsimError;
use crate::domain::indicator::calculate_zscore_sparse;

#[derive(Debug, Default, Clone, Copy)]
pub struct PairsTrading;

impl Strategy for PairsTrading {
    fn name(&self) -> &'static str {
        "pairs_trading"
    }

    fn display_name(&self) -> &'static str {
        "Pairs Trading"
    }

    fn description(&self) -> &'static str {
        "Trade the z-score of the price spread between two symbols."
    }

    fn category(&self) -> Category {
        Category::Quant
    }

    fn parameters(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::int("lookback", "Lookback", 30, 10, 200),
            ParamDef::float("entry_z", "Entry Z-Score", 2.0, 0.5, 4.0),
            ParamDef::float("exit_z", "Exit Z-Score", 0.5, 0.0, 2.0),
        ]
    }

    fn requires_pair(&self) -> bool {
        true
    }

    fn generate_signals(
        &self,
        input: &PriceInput<'_>,
        params: &Params,
    ) -> Result<SignalFrame, StratsimError> {
        let Some(secondary) = input.secondary else {
            return Ok(SignalFrame::hold(input.bars.len()));
        };
        let entry_z = params.float("entry_z")?;
        let exit_z = params.float("exit_z")?;

        let spread: Vec<Option<f64>> = input
            .bars
            .iter()
            .enumerate()
            .map(|(i, bar)| secondary.get(i).copied().flatten().map(|other| bar.close - other))
            .collect();
        let z = calculate_zscore_sparse(&spread, params.period("lookback")?);

        let mut states = Vec::with_capacity(z.len());
        let mut state: i8 = 0;
        for value in &z {
            state = match value {
                None => 0,
                Some(z) if *z <= -entry_z => 1,
                Some(z) if *z >= entry_z => -1,
                Some(z) if z.abs() <= exit_z => 0,
                Some(_) => state,
            };
            states.push(state);
        }

        Ok(SignalFrame::new(transitions(&states))
            .with_column("spread", spread)
            .with_column("spread_z", z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::daily_bars;
    use crate::domain::strategy::{ParamValue, RawParams, Signal};

    fn params() -> Params {
        let raw: RawParams = [
            ("lookback".to_string(), ParamValue::Int(10)),
            ("entry_z".to_string(), ParamValue::Float(1.5)),
            ("exit_z".to_string(), ParamValue::Float(0.5)),
        ]
        .into_iter()
        .collect();
        PairsTrading.validate_params(&raw)
    }

    #[test]
    fn without_secondary_every_bar_holds() {
        let data = daily_bars(&[1.0; 15]);
        let frame = PairsTrading
            .generate_signals(&PriceInput::single(&data), &params())
            .unwrap();
        assert_eq!(frame.signals.len(), 15);
        assert!(frame.signals.iter().all(|s| *s == Signal::Hold));
    }

    #[test]
    fn spread_dip_buys_and_reset_rearms() {
        // spread alternates around 0, dips at 10, stays low at 11, resets at 12
        // and dips again at 14
        let mut primary = vec![];
        let mut secondary = vec![];
        for i in 0..10 {
            primary.push(100.0 + if i % 2 == 0 { 1.0 } else { -1.0 });
            secondary.push(Some(100.0));
        }
        primary.extend([90.0, 91.0, 100.0, 101.0, 88.0]);
        secondary.extend([Some(100.0); 5]);

        let data = daily_bars(&primary);
        let input = PriceInput {
            bars: &data,
            secondary: Some(secondary.as_slice()),
        };
        let frame = PairsTrading.generate_signals(&input, &params()).unwrap();
        let z = &frame.indicators["spread_z"];

        assert!(z[10].unwrap() <= -1.5);
        assert_eq!(frame.signals[10], Signal::Buy);
        assert_eq!(frame.signals[11], Signal::Hold);
        assert!(z[12].unwrap().abs() <= 0.5);
        assert_eq!(frame.signals[14], Signal::Buy);
        assert_eq!(frame.signals.iter().filter(|s| **s == Signal::Buy).count(), 2);
    }

    #[test]
    fn missing_secondary_values_are_undefined() {
        let data = daily_bars(&[100.0; 12]);
        let secondary: Vec<Option<f64>> = (0..12)
            .map(|i| if i == 5 { None } else { Some(99.0) })
            .collect();
        let input = PriceInput {
            bars: &data,
            secondary: Some(secondary.as_slice()),
        };
        let frame = PairsTrading.generate_signals(&input, &params()).unwrap();
        assert_eq!(frame.indicators["spread"][5], None);
        assert!(frame.indicators["spread_z"].iter().all(Option::is_none));
    }
}
