//! Order execution and fill simulation.
//!
//! Every order fills immediately and in full at the observed price adjusted
//! by a fixed slippage in basis points, with a percentage fee on notional.
//! Orders the ledger cannot honour are rejected without touching state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::portfolio::Portfolio;

/// Slippage and fee parameters for a broker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub slippage_bps: f64,
    pub fee_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            slippage_bps: 1.0,
            fee_pct: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
}

impl Order {
    pub fn buy(symbol: &str, quantity: f64) -> Self {
        Order {
            symbol: symbol.to_string(),
            side: Side::Buy,
            quantity,
        }
    }

    pub fn sell(symbol: &str, quantity: f64) -> Self {
        Order {
            symbol: symbol.to_string(),
            side: Side::Sell,
            quantity,
        }
    }
}

/// An executed order. `pnl` is set on sells only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
    pub pnl: Option<f64>,
}

/// fee = notional * fee_pct / 100
pub fn calculate_fee(notional: f64, fee_pct: f64) -> f64 {
    notional * fee_pct / 100.0
}

/// Buy: execution_price = market_price * (1 + slippage_bps / 10000)
pub fn apply_slippage_buy(market_price: f64, slippage_bps: f64) -> f64 {
    market_price * (1.0 + slippage_bps / 10000.0)
}

/// Sell: execution_price = market_price * (1 - slippage_bps / 10000)
pub fn apply_slippage_sell(market_price: f64, slippage_bps: f64) -> f64 {
    market_price * (1.0 - slippage_bps / 10000.0)
}

/// Whole shares affordable with `fraction` of `cash` at `price`.
/// Returns 0 for non-positive prices.
pub fn size_buy_quantity(cash: f64, price: f64, fraction: f64) -> f64 {
    if !(price > 0.0) || !price.is_finite() {
        return 0.0;
    }
    let quantity = (cash * fraction / price).floor();
    if quantity.is_finite() && quantity > 0.0 {
        quantity
    } else {
        0.0
    }
}

/// Random 128-bit identifier, hex encoded. Used for fills, backtest runs and
/// simulation sessions.
pub fn new_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Simulated broker owning one portfolio and its fill log.
#[derive(Debug, Clone)]
pub struct Broker {
    portfolio: Portfolio,
    fills: Vec<Fill>,
    config: ExecutionConfig,
    total_fees: f64,
}

impl Broker {
    pub fn new(initial_cash: f64, config: ExecutionConfig) -> Self {
        Broker {
            portfolio: Portfolio::new(initial_cash),
            fills: Vec::new(),
            config,
            total_fees: 0.0,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn total_fees(&self) -> f64 {
        self.total_fees
    }

    pub fn config(&self) -> ExecutionConfig {
        self.config
    }

    /// Execute `order` at `price`. Returns `None` and leaves the ledger
    /// untouched when the order cannot be honoured: insufficient cash for a
    /// buy, no position or too few shares for a sell, or a degenerate price
    /// or quantity.
    pub fn submit_order(
        &mut self,
        order: &Order,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<Fill> {
        if !(order.quantity > 0.0) || !order.quantity.is_finite() {
            return None;
        }
        if !(price > 0.0) || !price.is_finite() {
            return None;
        }

        let (exec_price, fee, pnl) = match order.side {
            Side::Buy => {
                let exec_price = apply_slippage_buy(price, self.config.slippage_bps);
                let notional = exec_price * order.quantity;
                let fee = calculate_fee(notional, self.config.fee_pct);
                let total_cost = notional + fee;
                if total_cost > self.portfolio.cash {
                    return None;
                }
                self.portfolio.cash -= total_cost;
                // fee-inclusive cost so unrealized P&L already reflects the buy fee
                let cost_per_share = total_cost / order.quantity;
                self.portfolio
                    .update_position(&order.symbol, order.quantity, cost_per_share);
                (exec_price, fee, None)
            }
            Side::Sell => {
                let held = self.portfolio.get_position(&order.symbol)?;
                if held.quantity < order.quantity {
                    return None;
                }
                let avg_cost = held.avg_cost;
                let exec_price = apply_slippage_sell(price, self.config.slippage_bps);
                let notional = exec_price * order.quantity;
                let fee = calculate_fee(notional, self.config.fee_pct);
                let pnl = (exec_price - avg_cost) * order.quantity - fee;
                self.portfolio.cash += notional - fee;
                self.portfolio
                    .update_position(&order.symbol, -order.quantity, exec_price);
                (exec_price, fee, Some(pnl))
            }
        };

        self.total_fees += fee;

        let fill = Fill {
            id: new_id(),
            timestamp,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price: exec_price,
            fee,
            pnl,
        };
        self.fills.push(fill.clone());
        Some(fill)
    }
}
