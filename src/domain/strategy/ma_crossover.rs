//! Moving-average crossover.

use super::{Category, ParamDef, Params, PriceInput, Signal, SignalFrame, Strategy};
use crate::domain::error::StratsimError;
use crate::domain::indicator::{Series, calculate_ema, calculate_sma};

#[derive(Debug, Default, Clone, Copy)]
pub struct MaCrossover;

impl Strategy for MaCrossover {
    fn name(&self) -> &'static str {
        "ma_crossover"
    }

    fn display_name(&self) -> &'static str {
        "MA Crossover"
    }

    fn description(&self) -> &'static str {
        "Buy when the fast moving average crosses above the slow one, sell when it crosses below."
    }

    fn category(&self) -> Category {
        Category::Technical
    }

    fn parameters(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::int("fast_period", "Fast Period", 10, 2, 100),
            ParamDef::int("slow_period", "Slow Period", 30, 5, 200),
            ParamDef::choice("ma_type", "MA Type", "SMA", &["SMA", "EMA"]),
        ]
    }

    fn generate_signals(
        &self,
        input: &PriceInput<'_>,
        params: &Params,
    ) -> Result<SignalFrame, StratsimError> {
        let fast_period = params.period("fast_period")?;
        let slow_period = params.period("slow_period")?;
        let closes = input.closes();

        let average: fn(&[f64], usize) -> Series = match params.text("ma_type")? {
            "EMA" => calculate_ema,
            _ => calculate_sma,
        };
        let fast = average(&closes, fast_period);
        let slow = average(&closes, slow_period);

        // +1 above, -1 at or below, 0 while either average is undefined
        let state: Vec<i8> = fast
            .iter()
            .zip(&slow)
            .map(|(f, s)| match (f, s) {
                (Some(f), Some(s)) if f > s => 1,
                (Some(_), Some(_)) => -1,
                _ => 0,
            })
            .collect();

        let signals = (0..state.len())
            .map(|i| {
                let diff = if i == 0 { 0 } else { state[i] - state[i - 1] };
                match diff.signum() {
                    1 => Signal::Buy,
                    -1 => Signal::Sell,
                    _ => Signal::Hold,
                }
            })
            .collect();

        Ok(SignalFrame::new(signals)
            .with_column("ma_fast", fast)
            .with_column("ma_slow", slow))
    }
}
