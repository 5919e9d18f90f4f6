//! Sink that reports sessions through the log and persists nothing.

use crate::domain::error::StratsimError;
use crate::ports::sink_port::SimulationSink;
use crate::simulation::events::{FinalState, UpdateEvent};

/// Reports every update and the final state through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SimulationSink for LogSink {
    fn on_update(&self, event: &UpdateEvent) -> Result<(), StratsimError> {
        match &event.trade {
            Some(trade) => tracing::info!(
                session_id = %event.session_id,
                tick = event.tick,
                symbol = %trade.symbol,
                side = trade.side.as_str(),
                quantity = trade.quantity,
                price = trade.price,
                fee = trade.fee,
                pnl = ?trade.pnl,
                equity = event.equity,
                "trade"
            ),
            None => tracing::debug!(
                session_id = %event.session_id,
                tick = event.tick,
                equity = event.equity,
                cash = event.cash,
                "tick"
            ),
        }
        Ok(())
    }

    fn on_complete(&self, state: &FinalState) -> Result<(), StratsimError> {
        tracing::info!(
            session_id = %state.session_id,
            status = %state.status,
            ticks = state.tick_count,
            trades = state.total_trades,
            equity = state.equity,
            return_pct = state.return_pct,
            error = ?state.error,
            "session complete"
        );
        Ok(())
    }
}
