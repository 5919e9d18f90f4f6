//! Session state and event payloads published by a running simulation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::execution::{Fill, Side};
use crate::domain::metrics::Metrics;
use crate::domain::portfolio::EquityPoint;
use crate::domain::position::PositionView;
use crate::domain::strategy::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Stopped,
    Completed,
    Error,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Stopped | RunStatus::Completed | RunStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Stopped => "stopped",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeDetail {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
    pub pnl: Option<f64>,
}

impl From<&Fill> for TradeDetail {
    fn from(fill: &Fill) -> Self {
        TradeDetail {
            id: fill.id.clone(),
            symbol: fill.symbol.clone(),
            side: fill.side,
            quantity: fill.quantity,
            price: fill.price,
            fee: fill.fee,
            pnl: fill.pnl,
        }
    }
}

/// Emitted once per processed tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateEvent {
    pub session_id: String,
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub prices: BTreeMap<String, f64>,
    pub signal: Signal,
    pub equity: f64,
    pub cash: f64,
    pub positions: Vec<PositionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade: Option<TradeDetail>,
}

/// Point-in-time view of a session, valid in any state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub strategy_name: String,
    pub symbols: Vec<String>,
    pub status: RunStatus,
    pub tick_count: u64,
    pub equity: f64,
    pub cash: f64,
    pub positions: Vec<PositionView>,
    pub total_trades: usize,
    pub speed: f64,
    pub paused: bool,
    pub error: Option<String>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Produced exactly once when a session reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalState {
    pub session_id: String,
    pub strategy_name: String,
    pub symbols: Vec<String>,
    pub status: RunStatus,
    pub tick_count: u64,
    pub equity: f64,
    pub cash: f64,
    pub total_trades: usize,
    pub total_fees: f64,
    pub return_pct: f64,
    pub error: Option<String>,
    pub equity_curve: Vec<EquityPoint>,
    pub fills: Vec<Fill>,
    pub metrics: Metrics,
    pub finished_at: DateTime<Utc>,
}

/// What subscribers of a session's event bus receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionEvent {
    Tick(UpdateEvent),
    Stopped(FinalState),
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::Tick(e) => &e.session_id,
            SessionEvent::Stopped(s) => &s.session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn terminal_states() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Stopped.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Error.is_terminal());
        assert_eq!(RunStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn tick_event_is_tagged_and_omits_missing_trade() {
        let event = SessionEvent::Tick(UpdateEvent {
            session_id: "abc".into(),
            tick: 3,
            timestamp: ts(),
            prices: BTreeMap::from([("AAPL".to_string(), 101.5)]),
            signal: Signal::Buy,
            equity: 100_000.0,
            cash: 90_000.0,
            positions: Vec::new(),
            trade: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tick");
        assert_eq!(json["session_id"], "abc");
        assert_eq!(json["signal"], 1);
        assert_eq!(json["prices"]["AAPL"], 101.5);
        assert!(json.get("trade").is_none());
        assert_eq!(event.session_id(), "abc");
    }

    #[test]
    fn trade_detail_from_fill() {
        let fill = Fill {
            id: "f1".into(),
            timestamp: ts(),
            symbol: "AAPL".into(),
            side: Side::Sell,
            quantity: 10.0,
            price: 95.0,
            fee: 9.5,
            pnl: Some(-69.5),
        };
        let detail = TradeDetail::from(&fill);
        assert_eq!(detail.symbol, "AAPL");
        assert_eq!(detail.side, Side::Sell);
        assert_eq!(detail.pnl, Some(-69.5));
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["side"], "SELL");
    }
}
