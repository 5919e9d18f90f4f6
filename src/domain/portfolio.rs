//! Portfolio state and equity tracking.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::position::{Position, PositionView};

/// One point of an equity curve: total equity and the primary symbol's
/// price at that instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cash: f64,
    pub total_equity: f64,
    pub positions: Vec<PositionView>,
}

/// Cash and long positions. Mutated only by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    positions: HashMap<String, Position>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            positions: HashMap::new(),
        }
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions
            .get(symbol)
            .is_some_and(|pos| pos.quantity > 0.0)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Apply a signed quantity change. Positive quantities buy at
    /// `cost_per_share`; negative quantities sell and leave the average cost
    /// untouched. Positions that reach zero are removed.
    pub(crate) fn update_position(&mut self, symbol: &str, quantity: f64, cost_per_share: f64) {
        match self.positions.get_mut(symbol) {
            Some(pos) => {
                if quantity > 0.0 {
                    pos.add(quantity, cost_per_share);
                } else {
                    pos.quantity += quantity;
                }
                if pos.is_flat() {
                    self.positions.remove(symbol);
                }
            }
            None => {
                if quantity > 0.0 {
                    self.positions.insert(
                        symbol.to_string(),
                        Position::new(symbol, quantity, cost_per_share),
                    );
                }
            }
        }
    }

    /// Cash plus positions marked at `prices`, falling back to average cost
    /// for symbols without a price.
    pub fn get_equity(&self, prices: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| pos.market_value(mark_price(pos, prices)))
            .sum();
        self.cash + position_value
    }

    pub fn snapshot(
        &self,
        timestamp: DateTime<Utc>,
        prices: &HashMap<String, f64>,
    ) -> PortfolioSnapshot {
        let mut positions: Vec<PositionView> = self
            .positions
            .values()
            .map(|pos| {
                let price = mark_price(pos, prices);
                PositionView {
                    symbol: pos.symbol.clone(),
                    quantity: pos.quantity,
                    avg_cost: pos.avg_cost,
                    unrealized_pnl: pos.unrealized_pnl(price),
                }
            })
            .collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        PortfolioSnapshot {
            timestamp,
            cash: self.cash,
            total_equity: self.get_equity(prices),
            positions,
        }
    }
}

fn mark_price(pos: &Position, prices: &HashMap<String, f64>) -> f64 {
    prices.get(&pos.symbol).copied().unwrap_or(pos.avg_cost)
}
