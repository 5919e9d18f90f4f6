//! Position tracking.

use serde::Serialize;

/// Quantity below which a position is considered closed.
pub const QUANTITY_EPSILON: f64 = 1e-8;

/// A long holding in one symbol. `avg_cost` is the fee-inclusive
/// volume-weighted cost per share.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub avg_cost: f64,
}

impl Position {
    pub fn new(symbol: &str, quantity: f64, avg_cost: f64) -> Self {
        Position {
            symbol: symbol.to_string(),
            quantity,
            avg_cost,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.avg_cost)
    }

    /// Add shares bought at `cost_per_share`, re-weighting the average cost.
    pub fn add(&mut self, quantity: f64, cost_per_share: f64) {
        let total_cost = self.avg_cost * self.quantity + cost_per_share * quantity;
        self.quantity += quantity;
        self.avg_cost = if self.quantity != 0.0 {
            total_cost / self.quantity
        } else {
            0.0
        };
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.abs() < QUANTITY_EPSILON
    }
}

/// Read-only view of a position marked at a price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionView {
    pub symbol: String,
    pub quantity: f64,
    pub avg_cost: f64,
    pub unrealized_pnl: f64,
}
