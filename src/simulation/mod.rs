//! Paced simulation sessions: clock, runner, event fan-out and the session
//! manager that ties them together.

pub mod bus;
pub mod clock;
pub mod events;
pub mod manager;
pub mod runner;

pub use bus::{EventBus, SubscriberId, Subscription};
pub use clock::{Clock, ClockControl, Tick};
pub use events::{FinalState, RunStatus, SessionEvent, SessionSnapshot, TradeDetail, UpdateEvent};
pub use manager::{SimulationManager, SimulationMode, SimulationRequest};
