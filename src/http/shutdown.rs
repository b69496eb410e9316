//! Termination triggers.
//!
//! Handles:
//! - SIGTERM/SIGINT: start the shutdown sequence
//! - Panics that nothing catches: start the same sequence as a fault
//!
//! Both routes go through [`ShutdownCoordinator::trigger`], so repeated
//! signals or a panic during shutdown are no-ops.

use std::sync::Arc;

use crate::lifecycle::{is_contained, panic_message, ShutdownCoordinator, ShutdownTrigger};

/// Install SIGTERM and SIGINT handlers that trigger shutdown.
///
/// Handlers are registered before returning, so a signal arriving right
/// after startup is not lost.
#[cfg(unix)]
pub fn setup_signal_handlers(coordinator: Arc<ShutdownCoordinator>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
            };
            tracing::info!(signal = name, "Received termination signal");
            coordinator.trigger(ShutdownTrigger::Signal(name));
        }
    });

    Ok(())
}

/// Ctrl+C only on non-Unix platforms.
#[cfg(not(unix))]
pub fn setup_signal_handlers(coordinator: Arc<ShutdownCoordinator>) -> std::io::Result<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C");
            coordinator.trigger(ShutdownTrigger::Signal("SIGINT"));
        }
    });
    Ok(())
}

/// Route uncaught panics through the shutdown trigger.
///
/// Panics raised inside contained futures (dependency checks, cleanup tasks)
/// are converted to values by their callers and do not stop the process.
pub fn setup_panic_hook(coordinator: Arc<ShutdownCoordinator>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if is_contained() {
            return;
        }

        previous(info);

        let message = panic_message(info.payload());
        let location = info
            .location()
            .map(|location| location.to_string())
            .unwrap_or_else(|| "unknown location".to_string());
        tracing::error!(error = %message, %location, "Unhandled panic");

        coordinator.trigger(ShutdownTrigger::Fault(format!(
            "panic at {}: {}",
            location, message
        )));
    }));
}
