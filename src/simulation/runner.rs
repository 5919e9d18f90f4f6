//! Per-session simulation loop.
//!
//! A session runs as two tasks: the loop itself, which pulls ticks from the
//! clock and trades them, and a supervisor that awaits the loop (however it
//! ends) and finalizes the session exactly once. Sink callbacks go through a
//! third, per-session dispatcher so a slow sink never stalls the loop.

use chrono::Utc;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinError, JoinHandle};

use crate::domain::backtest::execute_signal;
use crate::domain::error::StratsimError;
use crate::domain::execution::{Broker, ExecutionConfig};
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::Bar;
use crate::domain::portfolio::EquityPoint;
use crate::domain::position::PositionView;
use crate::domain::strategy::{Params, PriceInput, Signal, Strategy};
use crate::ports::sink_port::SimulationSink;

use super::bus::EventBus;
use super::clock::{Clock, ClockControl, Tick};
use super::events::{
    FinalState, RunStatus, SessionEvent, SessionSnapshot, TradeDetail, UpdateEvent,
};

struct SessionState {
    status: RunStatus,
    tick_count: u64,
    error: Option<String>,
    broker: Broker,
    equity_curve: Vec<EquityPoint>,
    last_prices: HashMap<String, f64>,
}

impl SessionState {
    fn equity(&self) -> f64 {
        self.broker.portfolio().get_equity(&self.last_prices)
    }

    fn positions(&self) -> Vec<PositionView> {
        self.broker
            .portfolio()
            .snapshot(Utc::now(), &self.last_prices)
            .positions
    }
}

/// State shared between a running session, its supervisor and the manager.
pub struct Session {
    pub id: String,
    pub strategy_name: String,
    pub symbols: Vec<String>,
    position_size_pct: f64,
    state: Mutex<SessionState>,
    control: Arc<ClockControl>,
    bus: EventBus,
    done: watch::Sender<bool>,
}

impl Session {
    pub fn new(
        id: String,
        strategy_name: &str,
        symbols: Vec<String>,
        initial_cash: f64,
        execution: ExecutionConfig,
        position_size_pct: f64,
        control: Arc<ClockControl>,
        subscriber_capacity: usize,
    ) -> Self {
        Session {
            id,
            strategy_name: strategy_name.to_string(),
            symbols,
            position_size_pct,
            state: Mutex::new(SessionState {
                status: RunStatus::Pending,
                tick_count: 0,
                error: None,
                broker: Broker::new(initial_cash, execution),
                equity_curve: Vec::new(),
                last_prices: HashMap::new(),
            }),
            control,
            bus: EventBus::new(subscriber_capacity),
            done: watch::Sender::new(false),
        }
    }

    pub fn control(&self) -> &ClockControl {
        &self.control
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn status(&self) -> RunStatus {
        self.state.lock().status
    }

    /// Resolves to `true` once the session is finalized and its sink drained.
    pub fn finished(&self) -> watch::Receiver<bool> {
        self.done.subscribe()
    }

    /// Current view of the session. Reads only.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            session_id: self.id.clone(),
            strategy_name: self.strategy_name.clone(),
            symbols: self.symbols.clone(),
            status: state.status,
            tick_count: state.tick_count,
            equity: state.equity(),
            cash: state.broker.portfolio().cash,
            positions: state.positions(),
            total_trades: state.broker.fills().len(),
            speed: self.control.speed(),
            paused: self.control.is_paused(),
            error: state.error.clone(),
            equity_curve: state.equity_curve.clone(),
        }
    }

    fn primary_symbol(&self) -> &str {
        self.symbols.first().map(String::as_str).unwrap_or_default()
    }

    /// Move to a terminal status unless already in one, and build the final
    /// state from whatever the ledger holds at that point.
    fn finalize(&self, status: RunStatus, error: Option<String>) -> FinalState {
        let mut state = self.state.lock();
        if !state.status.is_terminal() {
            state.status = status;
            state.error = error;
        }

        let fills = state.broker.fills().to_vec();
        let metrics = Metrics::compute(
            &state.equity_curve,
            &fills,
            state.broker.portfolio().initial_cash,
        );
        FinalState {
            session_id: self.id.clone(),
            strategy_name: self.strategy_name.clone(),
            symbols: self.symbols.clone(),
            status: state.status,
            tick_count: state.tick_count,
            equity: state.equity(),
            cash: state.broker.portfolio().cash,
            total_trades: fills.len(),
            total_fees: state.broker.total_fees(),
            return_pct: metrics.return_pct,
            error: state.error.clone(),
            equity_curve: state.equity_curve.clone(),
            fills,
            metrics,
            finished_at: Utc::now(),
        }
    }
}

enum SinkMessage {
    Update(UpdateEvent),
    Complete(FinalState),
}

/// Runs sink callbacks on the blocking pool, one at a time, in arrival order.
async fn dispatch_sink(
    session_id: String,
    sink: Arc<dyn SimulationSink>,
    mut rx: mpsc::Receiver<SinkMessage>,
) {
    while let Some(message) = rx.recv().await {
        let sink = Arc::clone(&sink);
        let result = tokio::task::spawn_blocking(move || match &message {
            SinkMessage::Update(event) => sink.on_update(event),
            SinkMessage::Complete(state) => sink.on_complete(state),
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(session_id = %session_id, error = %err, "sink callback failed");
            }
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "sink callback panicked");
            }
        }
    }
}

pub struct Runner {
    session: Arc<Session>,
    clock: Clock,
    strategy: Arc<dyn Strategy>,
    params: Params,
    /// Primary-symbol bars seen so far. Touched only by the loop.
    history: Vec<Bar>,
}

impl Runner {
    pub fn new(
        session: Arc<Session>,
        clock: Clock,
        strategy: Arc<dyn Strategy>,
        params: Params,
    ) -> Self {
        Runner {
            session,
            clock,
            strategy,
            params,
            history: Vec::new(),
        }
    }

    /// Start the loop, its supervisor and the sink dispatcher on the current
    /// runtime. At most `sink_capacity` updates wait for the sink; further
    /// updates are dropped until it catches up. The returned handle
    /// force-cancels the loop; finalization still happens.
    pub fn start(self, sink: Arc<dyn SimulationSink>, sink_capacity: usize) -> AbortHandle {
        let session = Arc::clone(&self.session);
        let (sink_tx, sink_rx) = mpsc::channel(sink_capacity.max(1));
        let dispatcher = tokio::spawn(dispatch_sink(session.id.clone(), sink, sink_rx));

        session.state.lock().status = RunStatus::Running;
        tracing::info!(
            session_id = %session.id,
            strategy = %session.strategy_name,
            symbols = ?session.symbols,
            "simulation started"
        );

        let task = tokio::spawn(self.run(sink_tx.clone()));
        let abort = task.abort_handle();
        tokio::spawn(supervise(session, task, sink_tx, dispatcher));
        abort
    }

    async fn run(mut self, sink_tx: mpsc::Sender<SinkMessage>) -> Result<(), StratsimError> {
        let mut dropped: u64 = 0;
        while let Some(tick) = self.clock.next_tick().await? {
            let update = self.process_tick(&tick);

            if let Some(trade) = &update.trade {
                tracing::info!(
                    session_id = %self.session.id,
                    tick = update.tick,
                    symbol = %trade.symbol,
                    side = ?trade.side,
                    quantity = trade.quantity,
                    price = trade.price,
                    "simulated fill"
                );
            }

            match sink_tx.try_send(SinkMessage::Update(update.clone())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    tracing::warn!(
                        session_id = %self.session.id,
                        tick = update.tick,
                        dropped,
                        "sink queue full, update dropped"
                    );
                }
                // the dispatcher is gone
                Err(TrySendError::Closed(_)) => {}
            }
            self.session.bus.publish(SessionEvent::Tick(update));
        }
        Ok(())
    }

    /// Apply one tick. The strategy runs before the ledger lock is taken, and
    /// the ledger update has no suspension point, so neither a strategy panic
    /// nor cancellation observes a half-applied tick.
    fn process_tick(&mut self, tick: &Tick) -> UpdateEvent {
        let session = Arc::clone(&self.session);
        let symbol = session.primary_symbol();
        let price = match tick.prices.get(symbol) {
            Some(price) => Some(*price),
            None => session.state.lock().last_prices.get(symbol).copied(),
        };

        let mut signal = Signal::Hold;
        if let Some(price) = price {
            self.history.push(Bar::flat(tick.timestamp, price));
            if self.history.len() >= 2 {
                signal = self.evaluate(tick);
            }
        }

        let mut guard = session.state.lock();
        let state = &mut *guard;
        state.tick_count += 1;
        for (s, price) in &tick.prices {
            state.last_prices.insert(s.clone(), *price);
        }

        let mut trade = None;
        match price {
            Some(price) => {
                trade = execute_signal(
                    &mut state.broker,
                    symbol,
                    signal,
                    price,
                    tick.timestamp,
                    session.position_size_pct,
                );
                let equity = state.equity();
                state.equity_curve.push(EquityPoint {
                    timestamp: tick.timestamp,
                    equity,
                    price,
                });
            }
            None => {
                tracing::debug!(
                    session_id = %session.id,
                    tick = state.tick_count,
                    symbol,
                    "no price yet for primary symbol"
                );
                state.equity_curve.push(EquityPoint {
                    timestamp: tick.timestamp,
                    equity: state.broker.portfolio().cash,
                    price: 0.0,
                });
            }
        }

        UpdateEvent {
            session_id: session.id.clone(),
            tick: state.tick_count,
            timestamp: tick.timestamp,
            prices: tick.prices.clone(),
            signal,
            equity: state.equity(),
            cash: state.broker.portfolio().cash,
            positions: state.positions(),
            trade: trade.as_ref().map(TradeDetail::from),
        }
    }

    fn evaluate(&self, tick: &Tick) -> Signal {
        match self
            .strategy
            .generate_signals(&PriceInput::single(&self.history), &self.params)
        {
            Ok(frame) => frame.last_signal(),
            Err(err) => {
                tracing::warn!(
                    session_id = %self.session.id,
                    timestamp = %tick.timestamp,
                    bars = self.history.len(),
                    error = %err,
                    "signal generation failed, holding"
                );
                Signal::Hold
            }
        }
    }
}

/// Await the loop however it ends, then finalize: publish the final event,
/// hand it to the sink, close the bus and wait for the sink to drain.
async fn supervise(
    session: Arc<Session>,
    task: JoinHandle<Result<(), StratsimError>>,
    sink_tx: mpsc::Sender<SinkMessage>,
    dispatcher: JoinHandle<()>,
) {
    let (status, error) = match task.await {
        Ok(Ok(())) if session.control.is_stopped() => (RunStatus::Stopped, None),
        Ok(Ok(())) => (RunStatus::Completed, None),
        Ok(Err(err)) => (RunStatus::Error, Some(err.to_string())),
        Err(err) if err.is_cancelled() => (RunStatus::Stopped, None),
        Err(err) => (RunStatus::Error, Some(panic_message(err))),
    };

    let final_state = session.finalize(status, error);
    match &final_state.error {
        Some(error) => tracing::error!(
            session_id = %session.id,
            status = %final_state.status,
            error = %error,
            "simulation failed"
        ),
        None => tracing::info!(
            session_id = %session.id,
            status = %final_state.status,
            ticks = final_state.tick_count,
            trades = final_state.total_trades,
            equity = final_state.equity,
            "simulation finished"
        ),
    }

    session
        .bus
        .publish(SessionEvent::Stopped(final_state.clone()));
    // waits for room: the final state is never dropped
    let _ = sink_tx.send(SinkMessage::Complete(final_state)).await;
    drop(sink_tx);
    session.bus.close();

    if let Err(err) = dispatcher.await {
        tracing::warn!(session_id = %session.id, error = %err, "sink dispatcher ended abnormally");
    }
    session.done.send_replace(true);
}

fn panic_message(err: JoinError) -> String {
    let payload: Box<dyn Any + Send> = match err.try_into_panic() {
        Ok(payload) => payload,
        Err(err) => return err.to_string(),
    };
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic in simulation loop".to_string()
    }
}
