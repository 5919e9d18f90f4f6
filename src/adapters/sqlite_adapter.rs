//! SQLite simulation sink.
//!
//! Writes one `simulation_trades` row per fill as it happens and one
//! `simulation_sessions` row when a session finishes.

use crate::domain::error::StratsimError;
use crate::ports::config_port::ConfigPort;
use crate::ports::sink_port::SimulationSink;
use crate::simulation::events::{FinalState, UpdateEvent};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub struct SqliteSink {
    pool: Pool<SqliteConnectionManager>,
}

fn persistence<E: std::fmt::Display>(e: E) -> StratsimError {
    StratsimError::Persistence {
        reason: e.to_string(),
    }
}

/// Row of `simulation_sessions`, as read back.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub id: String,
    pub strategy_name: String,
    pub status: String,
    pub tick_count: i64,
    pub equity: f64,
    pub total_trades: i64,
    pub error_message: Option<String>,
}

impl SqliteSink {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StratsimError> {
        let db_path = config.require_string("sqlite", "path")?;
        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;
        Self::open(&db_path, pool_size)
    }

    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &str, pool_size: u32) -> Result<Self, StratsimError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(persistence)?;

        let sink = Self { pool };
        sink.initialize_schema()?;
        Ok(sink)
    }

    pub fn in_memory() -> Result<Self, StratsimError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(persistence)?;

        let sink = Self { pool };
        sink.initialize_schema()?;
        Ok(sink)
    }

    pub fn initialize_schema(&self) -> Result<(), StratsimError> {
        let conn = self.pool.get().map_err(persistence)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS simulation_sessions (
                id TEXT PRIMARY KEY,
                strategy_name TEXT NOT NULL,
                symbols TEXT NOT NULL,
                status TEXT NOT NULL,
                tick_count INTEGER NOT NULL,
                equity REAL NOT NULL,
                cash REAL NOT NULL,
                total_trades INTEGER NOT NULL,
                total_fees REAL NOT NULL,
                return_pct REAL NOT NULL,
                final_metrics TEXT NOT NULL,
                error_message TEXT,
                stopped_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS simulation_trades (
                id TEXT PRIMARY KEY,
                simulation_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity REAL NOT NULL,
                price REAL NOT NULL,
                fee REAL NOT NULL,
                pnl REAL
            );
            CREATE INDEX IF NOT EXISTS idx_simulation_trades_sim_id
                ON simulation_trades(simulation_id);",
        )
        .map_err(persistence)?;

        Ok(())
    }

    pub fn trade_count(&self, simulation_id: &str) -> Result<usize, StratsimError> {
        let conn = self.pool.get().map_err(persistence)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM simulation_trades WHERE simulation_id = ?1",
                params![simulation_id],
                |row| row.get(0),
            )
            .map_err(persistence)?;
        Ok(count as usize)
    }

    pub fn load_session(&self, id: &str) -> Result<Option<StoredSession>, StratsimError> {
        let conn = self.pool.get().map_err(persistence)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, strategy_name, status, tick_count, equity, total_trades, error_message
                 FROM simulation_sessions WHERE id = ?1",
            )
            .map_err(persistence)?;

        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(StoredSession {
                    id: row.get(0)?,
                    strategy_name: row.get(1)?,
                    status: row.get(2)?,
                    tick_count: row.get(3)?,
                    equity: row.get(4)?,
                    total_trades: row.get(5)?,
                    error_message: row.get(6)?,
                })
            })
            .map_err(persistence)?;

        rows.next().transpose().map_err(persistence)
    }
}

impl SimulationSink for SqliteSink {
    fn on_update(&self, event: &UpdateEvent) -> Result<(), StratsimError> {
        let Some(trade) = &event.trade else {
            return Ok(());
        };
        let conn = self.pool.get().map_err(persistence)?;
        conn.execute(
            "INSERT OR REPLACE INTO simulation_trades
                (id, simulation_id, timestamp, symbol, side, quantity, price, fee, pnl)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                trade.id,
                event.session_id,
                event.timestamp.to_rfc3339(),
                trade.symbol,
                trade.side.as_str(),
                trade.quantity,
                trade.price,
                trade.fee,
                trade.pnl
            ],
        )
        .map_err(persistence)?;
        Ok(())
    }

    fn on_complete(&self, state: &FinalState) -> Result<(), StratsimError> {
        let symbols = serde_json::to_string(&state.symbols).map_err(persistence)?;
        let metrics = serde_json::to_string(&state.metrics).map_err(persistence)?;

        let conn = self.pool.get().map_err(persistence)?;
        conn.execute(
            "INSERT OR REPLACE INTO simulation_sessions
                (id, strategy_name, symbols, status, tick_count, equity, cash, total_trades,
                 total_fees, return_pct, final_metrics, error_message, stopped_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                state.session_id,
                state.strategy_name,
                symbols,
                state.status.as_str(),
                state.tick_count as i64,
                state.equity,
                state.cash,
                state.total_trades as i64,
                state.total_fees,
                state.return_pct,
                metrics,
                state.error,
                state.finished_at.to_rfc3339()
            ],
        )
        .map_err(persistence)?;

        tracing::debug!(session_id = %state.session_id, "session persisted");
        Ok(())
    }
}
