//! HTTP server startup and listener control.
//!
//! The server runs in its own task; the calling task runs the shutdown
//! coordinator, which drives the listener through [`HandleListener`] once a
//! trigger fires. The listener keeps accepting through the grace period so
//! readiness failures reach load balancers. Server failure is itself a trigger.

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::Router;
use axum_server::Handle;
use tokio::task::JoinHandle;

use crate::config::{HttpServerConfig, HEALTH_PATH, LIVENESS_PATH, READINESS_PATH};
use crate::lifecycle::{Listener, ShutdownCoordinator, ShutdownOutcome, ShutdownTrigger};

use super::shutdown;

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    #[error("Invalid listen address: {0}")]
    Address(String),
}

/// Listener control backed by an `axum_server` handle and its serving task.
pub struct HandleListener {
    handle: Handle,
    server: Mutex<Option<JoinHandle<()>>>,
}

impl HandleListener {
    pub fn new(handle: Handle, server: JoinHandle<()>) -> Self {
        Self {
            handle,
            server: Mutex::new(Some(server)),
        }
    }
}

#[async_trait]
impl Listener for HandleListener {
    async fn drain(&self) {
        // No per-connection deadline: the coordinator's hard timeout bounds the drain
        self.handle.graceful_shutdown(None);
        tracing::info!(
            connections = self.handle.connection_count(),
            "Listener stopped accepting new connections, draining"
        );

        let server = self
            .server
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(server) = server {
            if let Err(e) = server.await {
                tracing::error!(error = %e, "HTTP server task failed while draining");
            }
        }
        tracing::info!("In-flight requests drained");
    }

    fn close(&self) {
        tracing::info!(
            connections = self.handle.connection_count(),
            "Closing listener"
        );
        self.handle.shutdown();
    }
}

/// Bind the configured address, install signal handlers, and serve until shutdown.
///
/// Returns once the shutdown sequence has finished; the caller exits the process.
pub async fn start_server(
    app: Router,
    config: &HttpServerConfig,
    coordinator: Arc<ShutdownCoordinator>,
) -> Result<ShutdownOutcome, ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Address(format!("Invalid http.host or http.port: {}", e)))?;

    let listener = TcpListener::bind(addr)?;
    shutdown::setup_signal_handlers(coordinator.clone())?;

    serve(app, listener, coordinator).await
}

/// Serve `app` on an already-bound listener until the shutdown sequence completes.
pub async fn serve(
    app: Router,
    listener: TcpListener,
    coordinator: Arc<ShutdownCoordinator>,
) -> Result<ShutdownOutcome, ServerError> {
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;
    let handle = Handle::new();

    let server = axum_server::from_tcp(listener)
        .handle(handle.clone())
        .serve(app.into_make_service());

    let fault = coordinator.clone();
    let task = tokio::spawn(async move {
        match server.await {
            Ok(()) => tracing::debug!("HTTP server stopped"),
            Err(e) => {
                tracing::error!(error = %e, "HTTP server failed");
                fault.trigger(ShutdownTrigger::Fault(format!("HTTP server failed: {}", e)));
            }
        }
    });

    tracing::info!("Server is running on http://{}", addr);
    tracing::info!("Health checks available at:");
    for path in [HEALTH_PATH, READINESS_PATH, LIVENESS_PATH] {
        tracing::info!("   - http://{}{}", addr, path);
    }

    Ok(coordinator.run(&HandleListener::new(handle, task)).await)
}
