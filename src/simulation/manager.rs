//! Registry of simulation sessions.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::domain::backtest::{
    default_fee_pct, default_initial_cash, default_interval, default_position_size_pct,
    default_slippage_bps,
};
use crate::domain::config_validation::SimulationSettings;
use crate::domain::error::StratsimError;
use crate::domain::execution::{ExecutionConfig, new_id};
use crate::domain::strategy::{RawParams, StrategyRegistry};
use crate::ports::data_port::HistoricalDataSource;
use crate::ports::sink_port::SimulationSink;

use super::bus::{SubscriberId, Subscription};
use super::clock::{Clock, ClockControl};
use super::events::SessionSnapshot;
use super::runner::{Runner, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    /// Paced walk through historical bars.
    #[default]
    Replay,
    /// Poll latest prices until stopped.
    #[serde(alias = "realtime")]
    Live,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub strategy_name: String,
    #[serde(default)]
    pub params: RawParams,
    pub symbols: Vec<String>,
    #[serde(default)]
    pub mode: SimulationMode,
    /// Falls back to the configured default speed.
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,
    #[serde(default = "default_fee_pct")]
    pub fee_pct: f64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: f64,
    #[serde(default = "default_position_size_pct")]
    pub position_size_pct: f64,
}

impl SimulationRequest {
    pub fn replay(strategy_name: &str, symbols: &[&str]) -> Self {
        SimulationRequest {
            strategy_name: strategy_name.to_string(),
            params: RawParams::new(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            mode: SimulationMode::Replay,
            speed: None,
            interval: default_interval(),
            start: None,
            end: None,
            initial_cash: default_initial_cash(),
            fee_pct: default_fee_pct(),
            slippage_bps: default_slippage_bps(),
            position_size_pct: default_position_size_pct(),
        }
    }

    fn validate(&self) -> Result<(), StratsimError> {
        let fail = |reason: &str| {
            Err(StratsimError::InvalidRequest {
                reason: reason.to_string(),
            })
        };
        if self.symbols.is_empty() {
            return fail("at least one symbol is required");
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return fail("start must not be after end");
            }
        }
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return fail("initial_cash must be positive");
        }
        if !(self.fee_pct >= 0.0 && self.fee_pct < 100.0) {
            return fail("fee_pct must be in [0, 100)");
        }
        if !(self.slippage_bps >= 0.0 && self.slippage_bps < 10_000.0) {
            return fail("slippage_bps must be in [0, 10000)");
        }
        if !(self.position_size_pct > 0.0 && self.position_size_pct <= 1.0) {
            return fail("position_size_pct must be in (0, 1]");
        }
        Ok(())
    }
}

struct SessionHandle {
    session: Arc<Session>,
    abort: AbortHandle,
}

/// Creates, queries and controls sessions. Built once and shared by `Arc`.
pub struct SimulationManager {
    data: Arc<dyn HistoricalDataSource>,
    strategies: Arc<StrategyRegistry>,
    sink: Arc<dyn SimulationSink>,
    settings: SimulationSettings,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SimulationManager {
    pub fn new(
        data: Arc<dyn HistoricalDataSource>,
        strategies: Arc<StrategyRegistry>,
        sink: Arc<dyn SimulationSink>,
        settings: SimulationSettings,
    ) -> Self {
        SimulationManager {
            data,
            strategies,
            sink,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Validate the request and start a session on the current tokio
    /// runtime. Returns the new session id.
    pub fn create_session(&self, request: &SimulationRequest) -> Result<String, StratsimError> {
        let strategy = self.strategies.get(&request.strategy_name)?;
        request.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(StratsimError::InvalidRequest {
                reason: "simulations need a running tokio runtime".into(),
            });
        }

        let id = new_id();
        let params = strategy.validate_params(&request.params);
        let control = Arc::new(ClockControl::new(
            request.speed.unwrap_or(self.settings.speed),
        ));

        let clock = match request.mode {
            SimulationMode::Replay => Clock::replay(
                Arc::clone(&self.data),
                Arc::clone(&control),
                &request.symbols[0],
                request.start,
                request.end,
                &request.interval,
            ),
            SimulationMode::Live => Clock::live(
                Arc::clone(&self.data),
                Arc::clone(&control),
                &request.symbols,
                self.settings.live_poll,
            ),
        };

        let session = Arc::new(Session::new(
            id.clone(),
            strategy.name(),
            request.symbols.clone(),
            request.initial_cash,
            ExecutionConfig {
                slippage_bps: request.slippage_bps,
                fee_pct: request.fee_pct,
            },
            request.position_size_pct,
            control,
            self.settings.subscriber_capacity,
        ));

        let abort = Runner::new(Arc::clone(&session), clock, strategy, params)
            .start(Arc::clone(&self.sink), self.settings.sink_capacity);
        self.sessions
            .write()
            .insert(id.clone(), SessionHandle { session, abort });

        tracing::info!(session_id = %id, mode = ?request.mode, "simulation session created");
        Ok(id)
    }

    fn session(&self, id: &str) -> Result<Arc<Session>, StratsimError> {
        self.sessions
            .read()
            .get(id)
            .map(|h| Arc::clone(&h.session))
            .ok_or_else(|| not_found(id))
    }

    pub fn get_state(&self, id: &str) -> Result<SessionSnapshot, StratsimError> {
        Ok(self.session(id)?.snapshot())
    }

    /// Request a cooperative stop and wait for the session to finish. After
    /// the grace period the loop is cancelled outright. Stopping a finished
    /// session returns its final snapshot unchanged.
    pub async fn stop(&self, id: &str) -> Result<SessionSnapshot, StratsimError> {
        let session = self.session(id)?;
        let mut finished = session.finished();
        session.control().stop();

        let grace = self.settings.stop_grace;
        if tokio::time::timeout(grace, wait_finished(&mut finished))
            .await
            .is_err()
        {
            tracing::warn!(
                session_id = %id,
                grace_ms = grace.as_millis() as u64,
                "session did not stop within grace period, cancelling"
            );
            if let Some(handle) = self.sessions.read().get(id) {
                handle.abort.abort();
            }
            if tokio::time::timeout(grace, wait_finished(&mut finished))
                .await
                .is_err()
            {
                tracing::warn!(session_id = %id, "session still finalizing after cancel");
            }
        }
        Ok(session.snapshot())
    }

    /// Wait until the session reaches a terminal state on its own.
    pub async fn wait_finished(&self, id: &str) -> Result<SessionSnapshot, StratsimError> {
        let session = self.session(id)?;
        let mut finished = session.finished();
        wait_finished(&mut finished).await;
        Ok(session.snapshot())
    }

    /// Returns the speed actually applied after clamping.
    pub fn set_speed(&self, id: &str, speed: f64) -> Result<f64, StratsimError> {
        Ok(self.session(id)?.control().set_speed(speed))
    }

    pub fn pause(&self, id: &str) -> Result<(), StratsimError> {
        self.session(id)?.control().pause();
        Ok(())
    }

    pub fn resume(&self, id: &str) -> Result<(), StratsimError> {
        self.session(id)?.control().resume();
        Ok(())
    }

    pub fn subscribe(&self, id: &str) -> Result<Subscription, StratsimError> {
        Ok(self.session(id)?.bus().subscribe())
    }

    pub fn unsubscribe(&self, id: &str, subscriber: SubscriberId) -> Result<bool, StratsimError> {
        Ok(self.session(id)?.bus().unsubscribe(subscriber))
    }

    /// Snapshots of every known session, ordered by id.
    pub fn list_sessions(&self) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<SessionSnapshot> = self
            .sessions
            .read()
            .values()
            .map(|h| h.session.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        snapshots
    }

    /// Drop a finished session from the registry. Running sessions are kept.
    pub fn remove_finished(&self, id: &str) -> Result<bool, StratsimError> {
        let mut sessions = self.sessions.write();
        let handle = sessions.get(id).ok_or_else(|| not_found(id))?;
        if !handle.session.status().is_terminal() {
            return Ok(false);
        }
        sessions.remove(id);
        Ok(true)
    }
}

fn not_found(id: &str) -> StratsimError {
    StratsimError::SessionNotFound { id: id.to_string() }
}

async fn wait_finished(finished: &mut watch::Receiver<bool>) {
    let _ = finished.wait_for(|done| *done).await;
}
