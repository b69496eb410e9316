//! Process-wide lifecycle state.
//!
//! The shutting-down flag is written once by the coordinator and read by
//! every health report. Readers only ever hold a [`ShutdownView`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Shutdown phases in the order they are entered. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ShutdownPhase {
    Running = 0,
    SignalReceived = 1,
    /// Grace period: still serving, readiness reports not ready
    Quiescing = 2,
    /// No longer accepting; in-flight requests finish
    Draining = 3,
    CleaningUp = 4,
    Terminated = 5,
}

impl ShutdownPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownPhase::Running,
            1 => ShutdownPhase::SignalReceived,
            2 => ShutdownPhase::Quiescing,
            3 => ShutdownPhase::Draining,
            4 => ShutdownPhase::CleaningUp,
            _ => ShutdownPhase::Terminated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownPhase::Running => "running",
            ShutdownPhase::SignalReceived => "signal_received",
            ShutdownPhase::Quiescing => "quiescing",
            ShutdownPhase::Draining => "draining",
            ShutdownPhase::CleaningUp => "cleaning_up",
            ShutdownPhase::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-writer lifecycle cell owned by the shutdown coordinator.
#[derive(Debug, Default)]
pub struct LifecycleState {
    shutting_down: AtomicBool,
    phase: AtomicU8,
}

impl LifecycleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the shutting-down flag. Returns `true` only for the call that
    /// performed the false -> true transition.
    pub(crate) fn begin_shutdown(&self) -> bool {
        let won = self
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if won {
            self.advance(ShutdownPhase::SignalReceived);
        }
        won
    }

    /// Move to `phase` unless a later phase has already been reached.
    pub(crate) fn advance(&self, phase: ShutdownPhase) {
        self.phase.fetch_max(phase as u8, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> ShutdownPhase {
        ShutdownPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }
}

/// Read-only handle to the lifecycle state, handed to the health aggregator.
#[derive(Debug, Clone)]
pub struct ShutdownView {
    state: Arc<LifecycleState>,
}

impl ShutdownView {
    pub(crate) fn new(state: Arc<LifecycleState>) -> Self {
        Self { state }
    }

    /// Current value of the flag, read at call time.
    pub fn is_shutting_down(&self) -> bool {
        self.state.is_shutting_down()
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.state.phase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_running() {
        let state = LifecycleState::new();
        assert!(!state.is_shutting_down());
        assert_eq!(state.phase(), ShutdownPhase::Running);
    }

    #[test]
    fn test_begin_shutdown_wins_exactly_once() {
        let state = LifecycleState::new();
        assert!(state.begin_shutdown());
        assert!(!state.begin_shutdown());
        assert!(!state.begin_shutdown());
        assert!(state.is_shutting_down());
        assert_eq!(state.phase(), ShutdownPhase::SignalReceived);
    }

    #[test]
    fn test_phase_never_moves_backwards() {
        let state = LifecycleState::new();
        state.begin_shutdown();
        state.advance(ShutdownPhase::CleaningUp);
        state.advance(ShutdownPhase::Quiescing);
        assert_eq!(state.phase(), ShutdownPhase::CleaningUp);
        assert!(state.is_shutting_down());
    }

    #[test]
    fn test_view_observes_writes() {
        let state = Arc::new(LifecycleState::new());
        let view = ShutdownView::new(state.clone());
        assert!(!view.is_shutting_down());

        state.begin_shutdown();
        assert!(view.is_shutting_down());
        assert_eq!(view.phase(), ShutdownPhase::SignalReceived);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(format!("{}", ShutdownPhase::Draining), "draining");
        assert_eq!(format!("{}", ShutdownPhase::CleaningUp), "cleaning_up");
    }
}
