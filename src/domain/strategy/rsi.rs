//! RSI threshold crossings.

use super::{Category, ParamDef, Params, PriceInput, Signal, SignalFrame, Strategy, crossings};
use crate::domain::error::StratsimError;
use crate::domain::indicator::calculate_rsi;

#[derive(Debug, Default, Clone, Copy)]
pub struct RsiStrategy;

impl Strategy for RsiStrategy {
    fn name(&self) -> &'static str {
        "rsi"
    }

    fn display_name(&self) -> &'static str {
        "RSI"
    }

    fn description(&self) -> &'static str {
        "Buy when RSI recovers above the oversold level, sell when it falls back below overbought."
    }

    fn category(&self) -> Category {
        Category::Technical
    }

    fn parameters(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::int("period", "RSI Period", 14, 2, 50),
            ParamDef::int("overbought", "Overbought", 70, 50, 95),
            ParamDef::int("oversold", "Oversold", 30, 5, 50),
        ]
    }

    fn generate_signals(
        &self,
        input: &PriceInput<'_>,
        params: &Params,
    ) -> Result<SignalFrame, StratsimError> {
        let period = params.period("period")?;
        let overbought = params.float("overbought")?;
        let oversold = params.float("oversold")?;

        let rsi = calculate_rsi(&input.closes(), period);
        let signals = crossings(&rsi, |prev, cur| {
            if prev <= oversold && cur > oversold {
                Signal::Buy
            } else if prev >= overbought && cur < overbought {
                Signal::Sell
            } else {
                Signal::Hold
            }
        });

        Ok(SignalFrame::new(signals).with_column("rsi", rsi))
    }
}
