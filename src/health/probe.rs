//! Dependency adapters.
//!
//! Each adapter owns its handle to the dependency, converts every failure of
//! its round-trip into a [`CheckOutcome`], and releases the handle in
//! `teardown`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::net::TcpStream;

use crate::config::{DependencyConfig, DependencyKind};

use super::report::CheckOutcome;

/// Maximum pooled database connections held by the service
const POSTGRES_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// An external resource the service depends on.
#[async_trait]
pub trait Dependency: Send + Sync {
    /// Key used in health reports and logs.
    fn name(&self) -> &str;

    /// One lightweight round-trip. Never mutates the dependency.
    async fn check(&self) -> CheckOutcome;

    /// Release the handle. Called once, during shutdown cleanup.
    async fn teardown(&self) -> Result<(), DependencyError>;
}

/// Build the adapter for a configured dependency.
///
/// An optional dependency with no connection target is registered as
/// not configured rather than omitted, so it still appears in reports.
pub fn build_dependency(
    config: &DependencyConfig,
    check_timeout: Duration,
) -> Result<Arc<dyn Dependency>, DependencyError> {
    let Some(target) = config.target() else {
        return Ok(Arc::new(UnconfiguredDependency::new(config.name.clone())));
    };

    let dependency: Arc<dyn Dependency> = match config.kind {
        DependencyKind::Postgres => Arc::new(PostgresDependency::connect_lazy(
            config.name.clone(),
            target,
            check_timeout,
        )?),
        DependencyKind::Tcp => Arc::new(TcpDependency::new(config.name.clone(), target)),
    };
    Ok(dependency)
}

/// PostgreSQL database reached through a connection pool.
pub struct PostgresDependency {
    name: String,
    pool: PgPool,
}

impl PostgresDependency {
    /// Create the pool without opening a connection; the first check connects.
    pub fn connect_lazy(
        name: String,
        url: &str,
        acquire_timeout: Duration,
    ) -> Result<Self, DependencyError> {
        let pool = PgPoolOptions::new()
            .max_connections(POSTGRES_MAX_CONNECTIONS)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)?;
        Ok(Self { name, pool })
    }
}

#[async_trait]
impl Dependency for PostgresDependency {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckOutcome {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => CheckOutcome::connected(),
            Err(e) => {
                tracing::warn!(dependency = %self.name, error = %e, "Database health check failed");
                CheckOutcome::unavailable(format!("Database connection failed: {}", e))
            }
        }
    }

    async fn teardown(&self) -> Result<(), DependencyError> {
        self.pool.close().await;
        tracing::info!(dependency = %self.name, "Database connections closed");
        Ok(())
    }
}

/// Any endpoint reachable over TCP, checked with a connect.
pub struct TcpDependency {
    name: String,
    address: String,
}

impl TcpDependency {
    pub fn new(name: String, address: impl Into<String>) -> Self {
        Self {
            name,
            address: address.into(),
        }
    }
}

#[async_trait]
impl Dependency for TcpDependency {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckOutcome {
        match TcpStream::connect(&self.address).await {
            Ok(_) => CheckOutcome::connected(),
            Err(e) => {
                tracing::warn!(
                    dependency = %self.name,
                    address = %self.address,
                    error = %e,
                    "Health check failed: connection error"
                );
                CheckOutcome::unavailable(format!("Connection to {} failed: {}", self.address, e))
            }
        }
    }

    async fn teardown(&self) -> Result<(), DependencyError> {
        // Checks hold no connection open between calls
        tracing::debug!(dependency = %self.name, "Nothing to release");
        Ok(())
    }
}

/// Optional dependency that has not been configured.
pub struct UnconfiguredDependency {
    name: String,
}

impl UnconfiguredDependency {
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

#[async_trait]
impl Dependency for UnconfiguredDependency {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckOutcome {
        CheckOutcome::not_configured()
    }

    async fn teardown(&self) -> Result<(), DependencyError> {
        Ok(())
    }
}
