//! Bollinger band touches.

use super::{Category, ParamDef, Params, PriceInput, SignalFrame, Strategy, transitions};
use crate::domain::error::StratsimError;
use crate::domain::indicator::calculate_bollinger;

#[derive(Debug, Default, Clone, Copy)]
pub struct BollingerStrategy;

impl Strategy for BollingerStrategy {
    fn name(&self) -> &'static str {
        "bollinger"
    }

    fn display_name(&self) -> &'static str {
        "Bollinger Bands"
    }

    fn description(&self) -> &'static str {
        "Buy when price touches the lower band, sell when it touches the upper band."
    }

    fn category(&self) -> Category {
        Category::Technical
    }

    fn parameters(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::int("period", "Period", 20, 5, 100),
            ParamDef::float("num_std", "Std Deviations", 2.0, 0.5, 4.0),
        ]
    }

    fn generate_signals(
        &self,
        input: &PriceInput<'_>,
        params: &Params,
    ) -> Result<SignalFrame, StratsimError> {
        let closes = input.closes();
        let bands = calculate_bollinger(&closes, params.period("period")?, params.float("num_std")?);

        let states: Vec<i8> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| match (bands.lower[i], bands.upper[i]) {
                (_, Some(upper)) if close >= upper => -1,
                (Some(lower), _) if close <= lower => 1,
                _ => 0,
            })
            .collect();

        Ok(SignalFrame::new(transitions(&states))
            .with_column("bb_upper", bands.upper)
            .with_column("bb_middle", bands.middle)
            .with_column("bb_lower", bands.lower))
    }
}
