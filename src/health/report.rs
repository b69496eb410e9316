//! Report types returned by the probe endpoints.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Overall status of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// An optional dependency is unavailable; traffic is still accepted
    Degraded,
    Unhealthy,
}

/// State of a single dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Connected,
    Unavailable,
    NotConfigured,
}

/// Outcome of one dependency check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    #[serde(rename = "status")]
    pub state: CheckState,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckOutcome {
    pub fn connected() -> Self {
        Self {
            state: CheckState::Connected,
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            state: CheckState::Unavailable,
            timestamp: Utc::now(),
            detail: Some(detail.into()),
        }
    }

    pub fn not_configured() -> Self {
        Self {
            state: CheckState::NotConfigured,
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.state == CheckState::Unavailable
    }
}

/// Aggregated readiness/health report. Built once per request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    status: HealthStatus,
    timestamp: DateTime<Utc>,
    environment: String,
    version: &'static str,
    uptime_seconds: f64,
    response_time_ms: u64,
    checks: BTreeMap<String, CheckOutcome>,
    shutting_down: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl HealthReport {
    pub(crate) fn new(
        status: HealthStatus,
        environment: String,
        uptime: Duration,
        response_time: Duration,
        checks: BTreeMap<String, CheckOutcome>,
        shutting_down: bool,
    ) -> Self {
        Self {
            status,
            timestamp: Utc::now(),
            environment,
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: uptime.as_secs_f64(),
            response_time_ms: response_time.as_millis() as u64,
            checks,
            shutting_down,
            error: None,
        }
    }

    /// Error-shaped report used when aggregation itself fails.
    pub(crate) fn failed(
        environment: String,
        uptime: Duration,
        response_time: Duration,
        shutting_down: bool,
        error: String,
    ) -> Self {
        Self {
            error: Some(error),
            ..Self::new(
                HealthStatus::Unhealthy,
                environment,
                uptime,
                response_time,
                BTreeMap::new(),
                shutting_down,
            )
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.uptime_seconds
    }

    pub fn response_time_ms(&self) -> u64 {
        self.response_time_ms
    }

    pub fn checks(&self) -> &BTreeMap<String, CheckOutcome> {
        &self.checks
    }

    pub fn check(&self, name: &str) -> Option<&CheckOutcome> {
        self.checks.get(name)
    }

    pub fn shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a load balancer should route traffic here.
    ///
    /// Shutting down is already folded into the status by the aggregator.
    pub fn is_ready(&self) -> bool {
        self.status != HealthStatus::Unhealthy
    }
}

/// Minimal liveness report: no dependency checks.
#[derive(Debug, Clone, Serialize)]
pub struct LivenessReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

impl LivenessReport {
    pub fn now() -> Self {
        Self {
            status: HealthStatus::Healthy,
            timestamp: Utc::now(),
        }
    }
}
