//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line, seeded once the MACD line exists
//! Histogram = MACD Line - Signal Line
//!
//! Warmup: max(fast, slow) - 1 + signal - 1 points for the signal line and
//! histogram.

use super::{Series, calculate_ema, subtract};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdLines {
    pub line: Series,
    pub signal: Series,
    pub histogram: Series,
}

pub fn calculate_macd(values: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdLines {
    let ema_fast = calculate_ema(values, fast);
    let ema_slow = calculate_ema(values, slow);
    let line = subtract(&ema_fast, &ema_slow);

    let mut signal = vec![None; values.len()];
    // the MACD line is contiguous once defined
    if let Some(first) = line.iter().position(Option::is_some) {
        let defined: Vec<f64> = line[first..].iter().flatten().copied().collect();
        for (offset, value) in calculate_ema(&defined, signal_period).into_iter().enumerate() {
            signal[first + offset] = value;
        }
    }

    let histogram = subtract(&line, &signal);

    MacdLines {
        line,
        signal,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn macd_warmup() {
        let lines = calculate_macd(&trending(10), 3, 5, 3);
        // line defined from index 4 (slow - 1)
        assert!(lines.line[3].is_none());
        assert!(lines.line[4].is_some());
        // signal defined from index 4 + 3 - 1
        assert!(lines.signal[5].is_none());
        assert!(lines.signal[6].is_some());
        assert!(lines.histogram[5].is_none());
        assert!(lines.histogram[6].is_some());
    }

    #[test]
    fn macd_line_is_ema_difference() {
        let values = trending(10);
        let lines = calculate_macd(&values, 3, 5, 3);
        let fast = calculate_ema(&values, 3);
        let slow = calculate_ema(&values, 5);
        for i in 4..10 {
            let expected = fast[i].unwrap() - slow[i].unwrap();
            assert!((lines.line[i].unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn macd_flat_series_is_zero() {
        let lines = calculate_macd(&[50.0; 20], 3, 5, 3);
        for h in lines.histogram.iter().flatten() {
            assert!(h.abs() < 1e-12);
        }
    }

    #[test]
    fn macd_short_series_all_undefined() {
        let lines = calculate_macd(&[1.0, 2.0], 12, 26, 9);
        assert!(lines.line.iter().all(Option::is_none));
        assert!(lines.histogram.iter().all(Option::is_none));
    }
}
