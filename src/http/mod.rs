//! HTTP server module.
//!
//! The server includes:
//! - Listener control for the shutdown coordinator (drain, then close)
//! - Shutdown triggers on SIGTERM/SIGINT and on uncaught panics

mod server;
mod shutdown;

pub use server::{serve, start_server, HandleListener, ServerError};
pub use shutdown::{setup_panic_hook, setup_signal_handlers};
