//! Engine settings loaded from configuration and validated up front.

use crate::domain::error::StratsimError;
use crate::domain::execution::ExecutionConfig;
use crate::ports::config_port::ConfigPort;
use std::time::Duration;

pub const DEFAULT_INITIAL_CASH: f64 = 100_000.0;
pub const DEFAULT_FEE_PCT: f64 = 1.0;
pub const DEFAULT_SLIPPAGE_BPS: f64 = 1.0;
pub const DEFAULT_POSITION_SIZE_PCT: f64 = 0.10;
pub const DEFAULT_SPEED: f64 = 1.0;
pub const DEFAULT_STOP_GRACE_MS: i64 = 5_000;
pub const DEFAULT_LIVE_POLL_MS: i64 = 1_000;
pub const DEFAULT_SUBSCRIBER_CAPACITY: i64 = 256;
pub const DEFAULT_SINK_CAPACITY: i64 = 1_024;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub initial_cash: f64,
    pub execution: ExecutionConfig,
    /// Fraction of current cash committed per Buy.
    pub position_size_pct: f64,
    pub simulation: SimulationSettings,
    pub csv_dir: Option<String>,
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    pub speed: f64,
    pub stop_grace: Duration,
    pub live_poll: Duration,
    pub subscriber_capacity: usize,
    /// Pending sink updates per session before new ones are dropped.
    pub sink_capacity: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        SimulationSettings {
            speed: DEFAULT_SPEED,
            stop_grace: Duration::from_millis(DEFAULT_STOP_GRACE_MS as u64),
            live_poll: Duration::from_millis(DEFAULT_LIVE_POLL_MS as u64),
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY as usize,
            sink_capacity: DEFAULT_SINK_CAPACITY as usize,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            initial_cash: DEFAULT_INITIAL_CASH,
            execution: ExecutionConfig {
                slippage_bps: DEFAULT_SLIPPAGE_BPS,
                fee_pct: DEFAULT_FEE_PCT,
            },
            position_size_pct: DEFAULT_POSITION_SIZE_PCT,
            simulation: SimulationSettings::default(),
            csv_dir: None,
            sqlite_path: None,
        }
    }
}

impl EngineSettings {
    /// Read `[engine]`, `[simulation]`, `[data]` and `[sqlite]`. Missing keys
    /// take their defaults; present but out-of-range values are errors.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StratsimError> {
        let initial_cash = config.get_double("engine", "initial_cash", DEFAULT_INITIAL_CASH);
        if !(initial_cash.is_finite() && initial_cash > 0.0) {
            return Err(invalid("engine", "initial_cash", "initial_cash must be positive"));
        }

        let fee_pct = config.get_double("engine", "fee_pct", DEFAULT_FEE_PCT);
        if !(0.0..100.0).contains(&fee_pct) {
            return Err(invalid("engine", "fee_pct", "fee_pct must be in [0, 100)"));
        }

        let slippage_bps = config.get_double("engine", "slippage_bps", DEFAULT_SLIPPAGE_BPS);
        if !(0.0..10_000.0).contains(&slippage_bps) {
            return Err(invalid(
                "engine",
                "slippage_bps",
                "slippage_bps must be in [0, 10000)",
            ));
        }

        let position_size_pct =
            config.get_double("engine", "position_size_pct", DEFAULT_POSITION_SIZE_PCT);
        if !(position_size_pct > 0.0 && position_size_pct <= 1.0) {
            return Err(invalid(
                "engine",
                "position_size_pct",
                "position_size_pct must be in (0, 1]",
            ));
        }

        let speed = config.get_double("simulation", "speed", DEFAULT_SPEED);
        if !(speed.is_finite() && speed > 0.0) {
            return Err(invalid("simulation", "speed", "speed must be positive"));
        }

        let stop_grace_ms = config.get_int("simulation", "stop_grace_ms", DEFAULT_STOP_GRACE_MS);
        if stop_grace_ms < 0 {
            return Err(invalid(
                "simulation",
                "stop_grace_ms",
                "stop_grace_ms must be non-negative",
            ));
        }

        let live_poll_ms = config.get_int("simulation", "live_poll_ms", DEFAULT_LIVE_POLL_MS);
        if live_poll_ms < 1 {
            return Err(invalid(
                "simulation",
                "live_poll_ms",
                "live_poll_ms must be at least 1",
            ));
        }

        let subscriber_capacity = config.get_int(
            "simulation",
            "subscriber_capacity",
            DEFAULT_SUBSCRIBER_CAPACITY,
        );
        if subscriber_capacity < 1 {
            return Err(invalid(
                "simulation",
                "subscriber_capacity",
                "subscriber_capacity must be at least 1",
            ));
        }

        let sink_capacity = config.get_int("simulation", "sink_capacity", DEFAULT_SINK_CAPACITY);
        if sink_capacity < 1 {
            return Err(invalid(
                "simulation",
                "sink_capacity",
                "sink_capacity must be at least 1",
            ));
        }

        Ok(EngineSettings {
            initial_cash,
            execution: ExecutionConfig {
                slippage_bps,
                fee_pct,
            },
            position_size_pct,
            simulation: SimulationSettings {
                speed,
                stop_grace: Duration::from_millis(stop_grace_ms as u64),
                live_poll: Duration::from_millis(live_poll_ms as u64),
                subscriber_capacity: subscriber_capacity as usize,
                sink_capacity: sink_capacity as usize,
            },
            csv_dir: non_empty(config.get_string("data", "csv_dir")),
            sqlite_path: non_empty(config.get_string("sqlite", "path")),
        })
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> StratsimError {
    StratsimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
