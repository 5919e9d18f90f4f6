//! MACD histogram zero-line crossings.

use super::{Category, ParamDef, Params, PriceInput, Signal, SignalFrame, Strategy, crossings};
use crate::domain::error::StratsimError;
use crate::domain::indicator::calculate_macd;

#[derive(Debug, Default, Clone, Copy)]
pub struct MacdStrategy;

impl Strategy for MacdStrategy {
    fn name(&self) -> &'static str {
        "macd"
    }

    fn display_name(&self) -> &'static str {
        "MACD"
    }

    fn description(&self) -> &'static str {
        "Buy when the MACD histogram turns positive, sell when it turns negative."
    }

    fn category(&self) -> Category {
        Category::Technical
    }

    fn parameters(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::int("fast_period", "Fast Period", 12, 2, 50),
            ParamDef::int("slow_period", "Slow Period", 26, 5, 100),
            ParamDef::int("signal_period", "Signal Period", 9, 2, 30),
        ]
    }

    fn generate_signals(
        &self,
        input: &PriceInput<'_>,
        params: &Params,
    ) -> Result<SignalFrame, StratsimError> {
        let lines = calculate_macd(
            &input.closes(),
            params.period("fast_period")?,
            params.period("slow_period")?,
            params.period("signal_period")?,
        );

        let signals = crossings(&lines.histogram, |prev, cur| {
            if prev <= 0.0 && cur > 0.0 {
                Signal::Buy
            } else if prev >= 0.0 && cur < 0.0 {
                Signal::Sell
            } else {
                Signal::Hold
            }
        });

        Ok(SignalFrame::new(signals)
            .with_column("macd", lines.line)
            .with_column("macd_signal", lines.signal)
            .with_column("macd_histogram", lines.histogram))
    }
}
