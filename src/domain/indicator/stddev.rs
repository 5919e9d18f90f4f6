//! Rolling sample standard deviation.
//!
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n) / (n - 1))
//! Warmup: first (n-1) points are undefined; n < 2 is undefined everywhere.

use super::{Series, mean_and_sample_stddev};

pub fn calculate_stddev(values: &[f64], period: usize) -> Series {
    if period < 2 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            Some(mean_and_sample_stddev(window).1)
        })
        .collect()
}
