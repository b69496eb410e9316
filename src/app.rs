//! Application assembly.
//!
//! Wires configured dependencies into the health aggregator and the shutdown
//! coordinator, then builds the router around the shared state.

use std::sync::Arc;

use axum::Router;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::health::{build_dependency, Criticality, Dependency, HealthAggregator};
use crate::lifecycle::{CleanupTask, ShutdownCoordinator};
use crate::routes::create_router;
use crate::state::AppState;

/// A fully wired service, ready to be handed to the HTTP server.
pub struct Application {
    pub router: Router,
    pub coordinator: Arc<ShutdownCoordinator>,
}

impl Application {
    /// Build the service from configuration.
    ///
    /// Postgres pools connect lazily, so building never waits on the network.
    pub fn build(config: AppConfig) -> Result<Self, AppError> {
        let coordinator = Arc::new(ShutdownCoordinator::new(&config.shutdown));
        let mut aggregator = HealthAggregator::new(
            config.app.environment.clone(),
            coordinator.view(),
            config.health.check_timeout(),
        );

        for dependency_config in &config.dependency {
            let dependency = build_dependency(dependency_config, config.health.check_timeout())?;
            tracing::info!(
                name = %dependency_config.name,
                kind = ?dependency_config.kind,
                required = dependency_config.required,
                configured = dependency_config.target().is_some(),
                "Dependency registered"
            );

            aggregator.register(
                dependency.clone(),
                Criticality::from_required(dependency_config.required),
            );
            coordinator.register_cleanup(teardown_task(dependency));
        }

        let state = AppState::new(config, aggregator);
        Ok(Self {
            router: create_router(state),
            coordinator,
        })
    }
}

fn teardown_task(dependency: Arc<dyn Dependency>) -> CleanupTask {
    let name = format!("{} connections", dependency.name());
    CleanupTask::new(name, async move { dependency.teardown().await })
}
