//! Lookback rate-of-change momentum.

use super::{Category, ParamDef, Params, PriceInput, Signal, SignalFrame, Strategy, crossings};
use crate::domain::error::StratsimError;
use crate::domain::indicator::calculate_roc;

#[derive(Debug, Default, Clone, Copy)]
pub struct Momentum;

impl Strategy for Momentum {
    fn name(&self) -> &'static str {
        "momentum"
    }

    fn display_name(&self) -> &'static str {
        "Momentum"
    }

    fn description(&self) -> &'static str {
        "Buy when the lookback return rises above the threshold, sell when it drops below the negative threshold."
    }

    fn category(&self) -> Category {
        Category::Quant
    }

    fn parameters(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::int("lookback", "Lookback", 20, 5, 200),
            ParamDef::float("threshold", "Threshold %", 5.0, 0.5, 30.0),
        ]
    }

    fn generate_signals(
        &self,
        input: &PriceInput<'_>,
        params: &Params,
    ) -> Result<SignalFrame, StratsimError> {
        let threshold = params.float("threshold")?;
        let momentum = calculate_roc(&input.closes(), params.period("lookback")?);

        let signals = crossings(&momentum, |prev, cur| {
            if prev <= threshold && cur > threshold {
                Signal::Buy
            } else if prev >= -threshold && cur < -threshold {
                Signal::Sell
            } else {
                Signal::Hold
            }
        });

        Ok(SignalFrame::new(signals).with_column("momentum_pct", momentum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::daily_bars;
    use crate::domain::strategy::{ParamValue, RawParams};

    #[test]
    fn crosses_both_thresholds() {
        let raw: RawParams = [
            ("lookback".to_string(), ParamValue::Int(5)),
            ("threshold".to_string(), ParamValue::Float(5.0)),
        ]
        .into_iter()
        .collect();
        let params = Momentum.validate_params(&raw);
        let closes = [
            100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 110.0, 112.0, 112.0, 100.0, 95.0, 90.0,
            88.0, 85.0,
        ];
        let data = daily_bars(&closes);
        let frame = Momentum
            .generate_signals(&PriceInput::single(&data), &params)
            .unwrap();

        // roc[6] = (110 - 100) / 100 = 10%
        assert_eq!(frame.signals[6], Signal::Buy);
        assert_eq!(frame.signals[7], Signal::Hold);
        let sells: Vec<usize> = (0..closes.len())
            .filter(|&i| frame.signals[i] == Signal::Sell)
            .collect();
        assert_eq!(sells.len(), 1);
        let m = &frame.indicators["momentum_pct"];
        assert!(m[sells[0]].unwrap() < -5.0);
        assert!(m[sells[0] - 1].unwrap() >= -5.0);
    }
}
