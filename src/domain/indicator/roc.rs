//! ROC (Rate of Change).
//!
//! ROC(n)[i] = ((C[i] - C[i-n]) / C[i-n]) * 100
//! Undefined when C[i-n] == 0. Warmup: first n points are undefined.

use super::Series;

pub fn calculate_roc(values: &[f64], period: usize) -> Series {
    (0..values.len())
        .map(|i| {
            if period == 0 || i < period {
                return None;
            }
            let prev = values[i - period];
            if prev == 0.0 {
                None
            } else {
                Some((values[i] - prev) / prev * 100.0)
            }
        })
        .collect()
}
