//! Paced tick source for simulations.
//!
//! Replay mode fetches the whole window once and yields one bar per tick,
//! waiting `1s / speed` between ticks. Live mode polls the latest price of
//! every symbol at a fixed interval. Both honour pause and stop at every
//! suspension point.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::domain::error::StratsimError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::HistoricalDataSource;

pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 100.0;
const BASE_REPLAY_DELAY: Duration = Duration::from_secs(1);

pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        return 1.0;
    }
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

/// Replay without an explicit start begins here.
pub fn default_replay_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub prices: BTreeMap<String, f64>,
}

/// Thread-safe pause/resume/stop/speed toggles shared between a clock and
/// whoever controls it. Changes take effect at the clock's next check.
#[derive(Debug)]
pub struct ClockControl {
    speed: watch::Sender<f64>,
    paused: watch::Sender<bool>,
    stopped: watch::Sender<bool>,
}

impl ClockControl {
    pub fn new(speed: f64) -> Self {
        ClockControl {
            speed: watch::Sender::new(clamp_speed(speed)),
            paused: watch::Sender::new(false),
            stopped: watch::Sender::new(false),
        }
    }

    /// Clamp to `[MIN_SPEED, MAX_SPEED]` and apply. Returns the applied speed.
    pub fn set_speed(&self, speed: f64) -> f64 {
        let speed = clamp_speed(speed);
        self.speed.send_replace(speed);
        speed
    }

    pub fn speed(&self) -> f64 {
        *self.speed.borrow()
    }

    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn stop(&self) {
        self.stopped.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }
}

enum Source {
    Replay {
        symbol: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: String,
        bars: Option<VecDeque<Bar>>,
    },
    Live {
        symbols: Vec<String>,
        poll: Duration,
    },
}

pub struct Clock {
    source: Source,
    data: Arc<dyn HistoricalDataSource>,
    control: Arc<ClockControl>,
    paused: watch::Receiver<bool>,
    stopped: watch::Receiver<bool>,
    ticked: bool,
}

impl Clock {
    /// Replay the first symbol's history over `[start, end]`.
    pub fn replay(
        data: Arc<dyn HistoricalDataSource>,
        control: Arc<ClockControl>,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        interval: &str,
    ) -> Self {
        let source = Source::Replay {
            symbol: symbol.to_string(),
            start: start.unwrap_or_else(default_replay_start),
            end: end.unwrap_or_else(Utc::now),
            interval: interval.to_string(),
            bars: None,
        };
        Self::with_source(source, data, control)
    }

    pub fn live(
        data: Arc<dyn HistoricalDataSource>,
        control: Arc<ClockControl>,
        symbols: &[String],
        poll: Duration,
    ) -> Self {
        let source = Source::Live {
            symbols: symbols.to_vec(),
            poll,
        };
        Self::with_source(source, data, control)
    }

    fn with_source(
        source: Source,
        data: Arc<dyn HistoricalDataSource>,
        control: Arc<ClockControl>,
    ) -> Self {
        let paused = control.paused.subscribe();
        let stopped = control.stopped.subscribe();
        Clock {
            source,
            data,
            control,
            paused,
            stopped,
            ticked: false,
        }
    }

    pub fn control(&self) -> &Arc<ClockControl> {
        &self.control
    }

    /// The next tick, or `None` once replay data is exhausted or a stop was
    /// requested. A failed historical fetch is an error.
    pub async fn next_tick(&mut self) -> Result<Option<Tick>, StratsimError> {
        if self.control.is_stopped() {
            return Ok(None);
        }

        if self.ticked {
            if self.replay_exhausted() {
                return Ok(None);
            }
            let delay = self.pacing_delay();
            if !self.sleep_unless_stopped(delay).await {
                return Ok(None);
            }
        }
        if !self.wait_while_paused().await {
            return Ok(None);
        }

        let tick = if matches!(self.source, Source::Replay { .. }) {
            self.next_replay_tick().await?
        } else {
            self.next_live_tick().await?
        };
        self.ticked = tick.is_some();
        Ok(tick)
    }

    fn replay_exhausted(&self) -> bool {
        matches!(&self.source, Source::Replay { bars: Some(bars), .. } if bars.is_empty())
    }

    fn pacing_delay(&self) -> Duration {
        match &self.source {
            Source::Replay { .. } => BASE_REPLAY_DELAY.div_f64(self.control.speed()),
            Source::Live { poll, .. } => *poll,
        }
    }

    async fn next_replay_tick(&mut self) -> Result<Option<Tick>, StratsimError> {
        let Source::Replay {
            symbol,
            start,
            end,
            interval,
            bars,
        } = &mut self.source
        else {
            return Ok(None);
        };

        if bars.is_none() {
            let data = Arc::clone(&self.data);
            let (sym, start, end, interval) = (symbol.clone(), *start, *end, interval.clone());
            let fetched = tokio::task::spawn_blocking(move || {
                data.get_historical(&sym, start, end, &interval)
            })
            .await
            .map_err(|e| StratsimError::DataSource {
                reason: format!("historical fetch task failed: {e}"),
            })??;
            tracing::debug!(symbol = %symbol, bars = fetched.len(), "replay data loaded");
            *bars = Some(fetched.into());
        }

        let bar = bars.as_mut().and_then(VecDeque::pop_front);
        Ok(bar.map(|bar| Tick {
            timestamp: bar.timestamp,
            prices: BTreeMap::from([(symbol.clone(), bar.close)]),
        }))
    }

    async fn next_live_tick(&mut self) -> Result<Option<Tick>, StratsimError> {
        loop {
            let Source::Live { symbols, poll } = &self.source else {
                return Ok(None);
            };
            let (symbols, poll) = (symbols.clone(), *poll);

            let data = Arc::clone(&self.data);
            let polled = tokio::task::spawn_blocking(move || {
                symbols
                    .into_iter()
                    .map(|s| {
                        let price = data.get_latest_price(&s);
                        (s, price)
                    })
                    .collect::<Vec<_>>()
            })
            .await
            .map_err(|e| StratsimError::DataSource {
                reason: format!("price poll task failed: {e}"),
            })?;

            let mut prices = BTreeMap::new();
            for (symbol, result) in polled {
                match result {
                    Ok(price) => {
                        prices.insert(symbol, price);
                    }
                    Err(err) => {
                        tracing::warn!(symbol = %symbol, error = %err, "price poll failed, skipping symbol");
                    }
                }
            }
            if !prices.is_empty() {
                return Ok(Some(Tick {
                    timestamp: Utc::now(),
                    prices,
                }));
            }

            if !self.sleep_unless_stopped(poll).await || !self.wait_while_paused().await {
                return Ok(None);
            }
        }
    }

    /// Sleep for `delay`; returns `false` if a stop arrived first.
    async fn sleep_unless_stopped(&mut self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = wait_for_stop(&mut self.stopped) => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Block while paused; returns `false` if stopped instead of resumed.
    async fn wait_while_paused(&mut self) -> bool {
        if self.control.is_stopped() {
            return false;
        }
        let resumed = tokio::select! {
            biased;
            _ = wait_for_stop(&mut self.stopped) => false,
            resumed = wait_for_resume(&mut self.paused) => resumed,
        };
        resumed && !self.control.is_stopped()
    }
}

async fn wait_for_stop(stopped: &mut watch::Receiver<bool>) {
    let _ = stopped.wait_for(|stopped| *stopped).await;
}

async fn wait_for_resume(paused: &mut watch::Receiver<bool>) -> bool {
    paused.wait_for(|paused| !*paused).await.is_ok()
}
