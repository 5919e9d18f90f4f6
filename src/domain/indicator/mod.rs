//! Technical indicator implementations.
//!
//! Every indicator is a stateless transform over an ordered numeric series
//! and returns one entry per input point. Entries inside the warmup window
//! are `None`; callers must treat them as undefined, never as zero.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod zscore;

pub use bollinger::{BollingerBands, calculate_bollinger};
pub use ema::calculate_ema;
pub use macd::{MacdLines, calculate_macd};
pub use roc::calculate_roc;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;
pub use zscore::{calculate_zscore, calculate_zscore_sparse};

/// An indicator output aligned with its input series.
pub type Series = Vec<Option<f64>>;

/// Element-wise `a - b`, undefined where either side is.
pub fn subtract(a: &[Option<f64>], b: &[Option<f64>]) -> Series {
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(x - y),
            _ => None,
        })
        .collect()
}

/// Mean and sample (n-1) standard deviation of a window.
pub(crate) fn mean_and_sample_stddev(window: &[f64]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    if window.len() < 2 {
        return (mean, 0.0);
    }
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}
