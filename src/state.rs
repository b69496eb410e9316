//! Shared application state for request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::health::HealthAggregator;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Contains the application configuration and the health aggregator backing
/// the probe endpoints.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub health: Arc<HealthAggregator>,
}

impl AppState {
    /// Creates a new application state from the given configuration and aggregator.
    pub fn new(config: AppConfig, health: HealthAggregator) -> Self {
        Self {
            config: Arc::new(config),
            health: Arc::new(health),
        }
    }
}
