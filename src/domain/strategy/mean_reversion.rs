//! Z-score mean reversion on a single series.

use super::{Category, ParamDef, Params, PriceInput, SignalFrame, Strategy, transitions};
use crate::domain::error::StratsimError;
use crate::domain::indicator::calculate_zscore;

#[derive(Debug, Default, Clone, Copy)]
pub struct MeanReversion;

impl Strategy for MeanReversion {
    fn name(&self) -> &'static str {
        "mean_reversion"
    }

    fn display_name(&self) -> &'static str {
        "Mean Reversion"
    }

    fn description(&self) -> &'static str {
        "Buy when the z-score of price drops below the entry level, sell when it reverts past the exit level."
    }

    fn category(&self) -> Category {
        Category::Quant
    }

    fn parameters(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::int("lookback", "Lookback", 20, 5, 200),
            ParamDef::float("entry_z", "Entry Z-Score", -2.0, -4.0, -0.5),
            ParamDef::float("exit_z", "Exit Z-Score", 0.0, -1.0, 2.0),
        ]
    }

    fn generate_signals(
        &self,
        input: &PriceInput<'_>,
        params: &Params,
    ) -> Result<SignalFrame, StratsimError> {
        let entry_z = params.float("entry_z")?;
        let exit_z = params.float("exit_z")?;
        let z = calculate_zscore(&input.closes(), params.period("lookback")?);

        // exit takes precedence where the two bands overlap
        let states: Vec<i8> = z
            .iter()
            .map(|z| match z {
                Some(z) if *z >= exit_z => -1,
                Some(z) if *z <= entry_z => 1,
                _ => 0,
            })
            .collect();

        Ok(SignalFrame::new(transitions(&states)).with_column("z_score", z))
    }
}
