//! Persistence and notification port trait.

use crate::domain::error::StratsimError;
use crate::simulation::events::{FinalState, UpdateEvent};

/// Receives simulation events. Calls for one session arrive in order, off the
/// simulation loop; an `Err` is logged and never stops the session.
pub trait SimulationSink: Send + Sync {
    fn on_update(&self, event: &UpdateEvent) -> Result<(), StratsimError>;

    fn on_complete(&self, state: &FinalState) -> Result<(), StratsimError>;
}
