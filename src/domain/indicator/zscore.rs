//! Rolling z-score: (C[i] - SMA(n)[i]) / STDDEV(n)[i].
//!
//! Undefined during warmup and wherever the window has zero dispersion.

use super::{Series, mean_and_sample_stddev};

pub fn calculate_zscore(values: &[f64], period: usize) -> Series {
    (0..values.len())
        .map(|i| {
            if period < 2 || i + 1 < period {
                return None;
            }
            let (mean, sd) = mean_and_sample_stddev(&values[i + 1 - period..=i]);
            if sd > 0.0 {
                Some((values[i] - mean) / sd)
            } else {
                None
            }
        })
        .collect()
}

/// Z-score over a series with gaps. A point is defined only when every value
/// in its window is present.
pub fn calculate_zscore_sparse(values: &[Option<f64>], period: usize) -> Series {
    (0..values.len())
        .map(|i| {
            if period < 2 || i + 1 < period {
                return None;
            }
            let window: Option<Vec<f64>> = values[i + 1 - period..=i].iter().copied().collect();
            let window = window?;
            let (mean, sd) = mean_and_sample_stddev(&window);
            let current = values[i]?;
            if sd > 0.0 { Some((current - mean) / sd) } else { None }
        })
        .collect()
}
