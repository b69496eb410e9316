//! Process lifecycle: the shutting-down flag and the shutdown sequence.
//!
//! ```text
//! Running → SignalReceived → Quiescing → Draining → CleaningUp → Terminated
//! ```
//!
//! The coordinator is the only writer of the flag. Health reports read it
//! through a [`ShutdownView`] on every call.

mod contain;
mod coordinator;
mod state;

pub use contain::{catch_panic, is_contained};
pub use coordinator::{
    CleanupTask, Listener, PhaseOutcome, ShutdownCoordinator, ShutdownOutcome,
    ShutdownPhaseResult, ShutdownTrigger,
};
pub(crate) use coordinator::panic_message;
pub use state::{LifecycleState, ShutdownPhase, ShutdownView};
