//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the sample standard deviation (divides by N-1).
//! Warmup: first (period-1) points are undefined.

use super::{Series, calculate_sma, calculate_stddev};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_NUM_STD: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

pub fn calculate_bollinger(values: &[f64], period: usize, num_std: f64) -> BollingerBands {
    let middle = calculate_sma(values, period);
    let stddev = calculate_stddev(values, period);

    let (upper, lower): (Series, Series) = middle
        .iter()
        .zip(&stddev)
        .map(|(m, sd)| match (m, sd) {
            (Some(m), Some(sd)) => (Some(m + num_std * sd), Some(m - num_std * sd)),
            _ => (None, None),
        })
        .unzip();

    BollingerBands {
        upper,
        middle,
        lower,
    }
}
