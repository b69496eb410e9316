//! Shutdown coordinator.
//!
//! Runs the phase sequence once a trigger has been accepted:
//! wait out the grace period while still serving (readiness answers 503),
//! stop accepting and drain in-flight requests, close the listener, then
//! run every cleanup task concurrently. The whole sequence runs under a
//! hard deadline; exceeding it yields [`ShutdownOutcome::Forced`].

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::ShutdownConfig;

use super::contain::catch_panic;
use super::state::{LifecycleState, ShutdownPhase, ShutdownView};

/// What started the shutdown sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// OS termination signal (SIGINT or SIGTERM)
    Signal(&'static str),
    /// Unrecoverable process-level fault (panic, server failure)
    Fault(String),
}

impl ShutdownTrigger {
    /// Faults always exit non-zero, even when cleanup succeeds.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownTrigger::Signal(_) => 0,
            ShutdownTrigger::Fault(_) => 1,
        }
    }
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Signal(name) => write!(f, "signal {}", name),
            ShutdownTrigger::Fault(cause) => write!(f, "fault: {}", cause),
        }
    }
}

/// Control over the network listener during shutdown.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Stop accepting new connections and wait for in-flight requests to finish.
    async fn drain(&self);

    /// Close the listener and any connections still open.
    fn close(&self);
}

/// A named teardown step run during the cleanup phase.
pub struct CleanupTask {
    name: String,
    task: BoxFuture<'static, Result<(), String>>,
}

impl CleanupTask {
    pub fn new<F, E>(name: impl Into<String>, task: F) -> Self
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display,
    {
        Self {
            name: name.into(),
            task: task.map(|result| result.map_err(|e| e.to_string())).boxed(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Success,
    Failure,
}

/// Result of one cleanup task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownPhaseResult {
    pub phase_name: String,
    pub outcome: PhaseOutcome,
    pub detail: Option<String>,
}

impl ShutdownPhaseResult {
    fn success(phase_name: String) -> Self {
        Self {
            phase_name,
            outcome: PhaseOutcome::Success,
            detail: None,
        }
    }

    fn failure(phase_name: String, detail: String) -> Self {
        Self {
            phase_name,
            outcome: PhaseOutcome::Failure,
            detail: Some(detail),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == PhaseOutcome::Success
    }
}

/// How the shutdown sequence ended.
#[derive(Debug)]
pub enum ShutdownOutcome {
    /// Every phase completed before the deadline
    Clean {
        trigger: ShutdownTrigger,
        results: Vec<ShutdownPhaseResult>,
        elapsed: Duration,
    },
    /// The deadline expired; cleanup may still have been pending
    Forced {
        trigger: ShutdownTrigger,
        phase: ShutdownPhase,
        elapsed: Duration,
    },
}

impl ShutdownOutcome {
    pub fn is_forced(&self) -> bool {
        matches!(self, ShutdownOutcome::Forced { .. })
    }

    pub fn trigger(&self) -> &ShutdownTrigger {
        match self {
            ShutdownOutcome::Clean { trigger, .. } | ShutdownOutcome::Forced { trigger, .. } => {
                trigger
            }
        }
    }

    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownOutcome::Clean { trigger, .. } => trigger.exit_code(),
            ShutdownOutcome::Forced { .. } => 1,
        }
    }
}

/// Owns the lifecycle state and sequences the shutdown phases.
pub struct ShutdownCoordinator {
    state: Arc<LifecycleState>,
    timeout: Duration,
    grace_period: Duration,
    trigger: OnceLock<ShutdownTrigger>,
    triggered: Notify,
    cleanup: Mutex<Vec<CleanupTask>>,
}

impl ShutdownCoordinator {
    pub fn new(config: &ShutdownConfig) -> Self {
        Self::with_timings(config.timeout(), config.grace_period())
    }

    pub fn with_timings(timeout: Duration, grace_period: Duration) -> Self {
        Self {
            state: Arc::new(LifecycleState::new()),
            timeout,
            grace_period,
            trigger: OnceLock::new(),
            triggered: Notify::new(),
            cleanup: Mutex::new(Vec::new()),
        }
    }

    /// Read accessor for the shutting-down flag.
    pub fn view(&self) -> ShutdownView {
        ShutdownView::new(self.state.clone())
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.state.phase()
    }

    /// Register a task for the cleanup phase.
    pub fn register_cleanup(&self, task: CleanupTask) {
        tracing::debug!(task = %task.name(), "Registered cleanup task");
        self.cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    /// Request shutdown. Safe to call from any thread, including a panic hook.
    ///
    /// The flag is set before anything else so readiness flips to not-ready
    /// while the listener is still accepting. Returns `false` if shutdown was already underway.
    pub fn trigger(&self, trigger: ShutdownTrigger) -> bool {
        if !self.state.begin_shutdown() {
            tracing::debug!(%trigger, "Shutdown already in progress, ignoring trigger");
            return false;
        }

        match &trigger {
            ShutdownTrigger::Signal(_) => {
                tracing::info!(%trigger, "Shutdown triggered, readiness now reports not ready")
            }
            ShutdownTrigger::Fault(_) => {
                tracing::error!(%trigger, "Shutdown triggered by unrecoverable fault")
            }
        }

        // Only the winner of begin_shutdown reaches this, so set cannot fail
        let _ = self.trigger.set(trigger);
        self.triggered.notify_one();
        true
    }

    /// Wait until a trigger has been accepted.
    pub async fn wait_for_trigger(&self) -> ShutdownTrigger {
        loop {
            if let Some(trigger) = self.trigger.get() {
                return trigger.clone();
            }
            self.triggered.notified().await;
        }
    }

    /// Wait for a trigger, then run the shutdown phases under the hard deadline.
    ///
    /// Cleanup tasks are consumed, so only the first call does any teardown.
    pub async fn run<L: Listener + ?Sized>(&self, listener: &L) -> ShutdownOutcome {
        let trigger = self.wait_for_trigger().await;
        let started = Instant::now();

        tracing::info!(
            %trigger,
            timeout_ms = self.timeout.as_millis() as u64,
            grace_period_ms = self.grace_period.as_millis() as u64,
            "Starting graceful shutdown"
        );

        match tokio::time::timeout(self.timeout, self.run_phases(listener)).await {
            Ok(results) => {
                self.enter(ShutdownPhase::Terminated);
                let elapsed = started.elapsed();
                tracing::info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Graceful shutdown completed"
                );
                ShutdownOutcome::Clean {
                    trigger,
                    results,
                    elapsed,
                }
            }
            Err(_) => {
                let phase = self.phase();
                listener.close();
                self.enter(ShutdownPhase::Terminated);
                let elapsed = started.elapsed();
                tracing::error!(
                    %phase,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Shutdown deadline exceeded, forcing termination"
                );
                ShutdownOutcome::Forced {
                    trigger,
                    phase,
                    elapsed,
                }
            }
        }
    }

    async fn run_phases<L: Listener + ?Sized>(&self, listener: &L) -> Vec<ShutdownPhaseResult> {
        // Still accepting: load balancers see readiness fail and deregister
        self.enter(ShutdownPhase::Quiescing);
        tokio::time::sleep(self.grace_period).await;

        self.enter(ShutdownPhase::Draining);
        listener.drain().await;
        listener.close();

        self.enter(ShutdownPhase::CleaningUp);
        self.run_cleanup().await
    }

    async fn run_cleanup(&self) -> Vec<ShutdownPhaseResult> {
        let tasks = std::mem::take(&mut *self.cleanup.lock().unwrap_or_else(PoisonError::into_inner));

        let results = futures::future::join_all(tasks.into_iter().map(|CleanupTask { name, task }| {
            async move {
                match catch_panic(task).await {
                    Ok(Ok(())) => ShutdownPhaseResult::success(name),
                    Ok(Err(e)) => ShutdownPhaseResult::failure(name, e),
                    Err(panic) => {
                        ShutdownPhaseResult::failure(name, panic_message(panic.as_ref()))
                    }
                }
            }
        }))
        .await;

        for result in &results {
            match &result.detail {
                None => tracing::info!(task = %result.phase_name, "Successfully cleaned up"),
                Some(detail) => {
                    tracing::error!(task = %result.phase_name, error = %detail, "Failed to clean up")
                }
            }
        }

        results
    }

    fn enter(&self, phase: ShutdownPhase) {
        self.state.advance(phase);
        tracing::debug!(%phase, "Entered shutdown phase");
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
