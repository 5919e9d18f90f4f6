//! Performance metrics and statistics.

use serde::Serialize;

use super::execution::{Fill, Side};
use super::portfolio::EquityPoint;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Reported in place of an infinite profit factor.
pub const PROFIT_FACTOR_CAP: f64 = 999.99;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_pnl: f64,
    pub return_pct: f64,
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough decline in percent, as a non-positive number.
    pub max_drawdown_pct: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_trades: usize,
    /// Equity-curve length spread evenly over the closed trades. This is a
    /// coarse proxy that assumes one curve point per day, not a measured
    /// holding period.
    pub avg_trade_duration_days: f64,
    pub total_fees: f64,
}

impl Metrics {
    pub fn zeroed() -> Self {
        Metrics {
            total_pnl: 0.0,
            return_pct: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown_pct: 0.0,
            win_rate: 0.0,
            profit_factor: 0.0,
            total_trades: 0,
            avg_trade_duration_days: 0.0,
            total_fees: 0.0,
        }
    }

    pub fn compute(equity_curve: &[EquityPoint], fills: &[Fill], initial_cash: f64) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_cash);

        let total_pnl = final_equity - initial_cash;
        let return_pct = if initial_cash > 0.0 {
            (final_equity / initial_cash - 1.0) * 100.0
        } else {
            0.0
        };

        let sharpe_ratio = compute_sharpe(equity_curve);
        let max_drawdown_pct = -compute_max_drawdown_pct(equity_curve);

        let closed: Vec<f64> = fills
            .iter()
            .filter(|f| f.side == Side::Sell)
            .filter_map(|f| f.pnl)
            .collect();
        let total_trades = closed.len();

        let winners = closed.iter().filter(|&&pnl| pnl > 0.0).count();
        let win_rate = if total_trades > 0 {
            winners as f64 / total_trades as f64
        } else {
            0.0
        };

        let gross_profit: f64 = closed.iter().filter(|&&pnl| pnl > 0.0).sum();
        let gross_loss: f64 = closed
            .iter()
            .filter(|&&pnl| pnl < 0.0)
            .map(|pnl| pnl.abs())
            .sum();

        let profit_factor = if gross_loss > 0.0 {
            (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
        } else if gross_profit > 0.0 {
            PROFIT_FACTOR_CAP
        } else {
            0.0
        };

        let avg_trade_duration_days = if total_trades > 0 && equity_curve.len() > 1 {
            (equity_curve.len() - 1) as f64 / total_trades as f64
        } else {
            0.0
        };

        let total_fees = fills.iter().map(|f| f.fee).sum();

        Metrics {
            total_pnl,
            return_pct,
            sharpe_ratio,
            max_drawdown_pct,
            win_rate,
            profit_factor,
            total_trades,
            avg_trade_duration_days,
            total_fees,
        }
    }
}

/// Pairwise simple returns, skipping points whose predecessor is not positive.
pub fn daily_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0].equity > 0.0)
        .map(|w| w[1].equity / w[0].equity - 1.0)
        .collect()
}

/// Annualized Sharpe ratio with the (n-1) sample standard deviation.
fn compute_sharpe(equity_curve: &[EquityPoint]) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        mean / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Maximum drawdown from the running peak, in percent (positive).
fn compute_max_drawdown_pct(equity_curve: &[EquityPoint]) -> f64 {
    let Some(first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        }
        if peak > 0.0 {
            let dd = (peak - point.equity) / peak * 100.0;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}
