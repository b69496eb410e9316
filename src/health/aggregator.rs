//! Health aggregation over registered dependencies.
//!
//! All checks are launched together and joined; a slow or panicking check
//! only affects its own entry in the report.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::lifecycle::{catch_panic, panic_message, ShutdownView};

use super::probe::Dependency;
use super::report::{CheckOutcome, HealthReport, HealthStatus, LivenessReport};

/// Whether an unavailable dependency makes the whole service unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    Required,
    Optional,
}

impl Criticality {
    pub fn from_required(required: bool) -> Self {
        if required {
            Criticality::Required
        } else {
            Criticality::Optional
        }
    }
}

struct Registered {
    dependency: Arc<dyn Dependency>,
    criticality: Criticality,
}

/// Runs dependency checks and builds health reports.
pub struct HealthAggregator {
    dependencies: Vec<Registered>,
    shutdown: ShutdownView,
    environment: String,
    check_timeout: Duration,
    started_at: Instant,
}

impl HealthAggregator {
    pub fn new(environment: impl Into<String>, shutdown: ShutdownView, check_timeout: Duration) -> Self {
        Self {
            dependencies: Vec::new(),
            shutdown,
            environment: environment.into(),
            check_timeout,
            started_at: Instant::now(),
        }
    }

    /// Register a dependency to be checked on every aggregation.
    pub fn register(&mut self, dependency: Arc<dyn Dependency>, criticality: Criticality) {
        tracing::debug!(
            dependency = %dependency.name(),
            criticality = ?criticality,
            "Registered health check"
        );
        self.dependencies.push(Registered {
            dependency,
            criticality,
        });
    }

    pub fn with_dependency(mut self, dependency: Arc<dyn Dependency>, criticality: Criticality) -> Self {
        self.register(dependency, criticality);
        self
    }

    /// Liveness: constant cost, no dependency fan-out.
    pub fn liveness(&self) -> LivenessReport {
        LivenessReport::now()
    }

    /// Readiness/health: check every dependency concurrently and merge.
    pub async fn aggregate(&self) -> HealthReport {
        let started = Instant::now();

        match catch_panic(self.collect()).await {
            Ok((status, shutting_down, checks)) => {
                let response_time = started.elapsed();
                tracing::debug!(
                    status = ?status,
                    response_time_ms = response_time.as_millis() as u64,
                    "Health check completed"
                );
                HealthReport::new(
                    status,
                    self.environment.clone(),
                    self.started_at.elapsed(),
                    response_time,
                    checks,
                    shutting_down,
                )
            }
            Err(panic) => {
                let error = panic_message(panic.as_ref());
                tracing::error!(error = %error, "Health check failed");
                HealthReport::failed(
                    self.environment.clone(),
                    self.started_at.elapsed(),
                    started.elapsed(),
                    self.shutdown.is_shutting_down(),
                    error,
                )
            }
        }
    }

    async fn collect(&self) -> (HealthStatus, bool, BTreeMap<String, CheckOutcome>) {
        let probes = self.dependencies.iter().map(|registered| {
            let name = registered.dependency.name().to_string();
            async move {
                let outcome = self.probe(&name, registered.dependency.as_ref()).await;
                (name, registered.criticality, outcome)
            }
        });
        let outcomes = futures::future::join_all(probes).await;

        // Read the flag once, after the checks settle, so status and shuttingDown agree
        let shutting_down = self.shutdown.is_shutting_down();
        let status = classify(
            outcomes
                .iter()
                .map(|(_, criticality, outcome)| (*criticality, outcome)),
            shutting_down,
        );

        let checks = outcomes
            .into_iter()
            .map(|(name, _, outcome)| (name, outcome))
            .collect();

        (status, shutting_down, checks)
    }

    async fn probe(&self, name: &str, dependency: &dyn Dependency) -> CheckOutcome {
        let check = catch_panic(dependency.check());

        match tokio::time::timeout(self.check_timeout, check).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(panic)) => {
                let cause = panic_message(panic.as_ref());
                tracing::error!(dependency = %name, error = %cause, "Health check panicked");
                CheckOutcome::unavailable(format!("Health check panicked: {}", cause))
            }
            Err(_) => {
                let timeout_ms = self.check_timeout.as_millis() as u64;
                tracing::warn!(dependency = %name, timeout_ms, "Health check failed: timeout");
                CheckOutcome::unavailable(format!("Health check timed out after {}ms", timeout_ms))
            }
        }
    }
}

/// Overall status from per-dependency outcomes.
///
/// Shutting down or any required dependency unavailable is unhealthy; only
/// optional dependencies unavailable is degraded. Not configured counts as healthy.
pub(crate) fn classify<'a>(
    outcomes: impl IntoIterator<Item = (Criticality, &'a CheckOutcome)>,
    shutting_down: bool,
) -> HealthStatus {
    if shutting_down {
        return HealthStatus::Unhealthy;
    }

    let mut status = HealthStatus::Healthy;
    for (criticality, outcome) in outcomes {
        if outcome.is_unavailable() {
            match criticality {
                Criticality::Required => return HealthStatus::Unhealthy,
                Criticality::Optional => status = HealthStatus::Degraded,
            }
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{CheckState, DependencyError};
    use crate::lifecycle::{ShutdownCoordinator, ShutdownTrigger};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone, Copy)]
    enum Behavior {
        Connected,
        Unavailable,
        NotConfigured,
        Panics,
        Slow(Duration),
    }

    struct FakeDependency {
        name: String,
        behavior: Behavior,
    }

    impl FakeDependency {
        fn new(name: &str, behavior: Behavior) -> Arc<dyn Dependency> {
            Arc::new(Self {
                name: name.to_string(),
                behavior,
            })
        }
    }

    #[async_trait]
    impl Dependency for FakeDependency {
        fn name(&self) -> &str {
            &self.name
        }

        async fn check(&self) -> CheckOutcome {
            match self.behavior {
                Behavior::Connected => CheckOutcome::connected(),
                Behavior::Unavailable => CheckOutcome::unavailable("connection refused"),
                Behavior::NotConfigured => CheckOutcome::not_configured(),
                Behavior::Panics => panic!("driver bug"),
                Behavior::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    CheckOutcome::connected()
                }
            }
        }

        async fn teardown(&self) -> Result<(), DependencyError> {
            Ok(())
        }
    }

    /// Once armed, panics before its check can even be launched.
    #[derive(Default)]
    struct BrokenName {
        armed: AtomicBool,
    }

    #[async_trait]
    impl Dependency for BrokenName {
        fn name(&self) -> &str {
            if self.armed.load(Ordering::SeqCst) {
                panic!("name lookup failed");
            }
            "broken"
        }

        async fn check(&self) -> CheckOutcome {
            CheckOutcome::connected()
        }

        async fn teardown(&self) -> Result<(), DependencyError> {
            Ok(())
        }
    }

    fn aggregator(coordinator: &ShutdownCoordinator) -> HealthAggregator {
        HealthAggregator::new("test", coordinator.view(), Duration::from_secs(2))
    }

    fn coordinator() -> ShutdownCoordinator {
        ShutdownCoordinator::with_timings(Duration::from_secs(30), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_all_connected_is_healthy() {
        let coordinator = coordinator();
        let aggregator = aggregator(&coordinator)
            .with_dependency(FakeDependency::new("database", Behavior::Connected), Criticality::Required)
            .with_dependency(FakeDependency::new("redis", Behavior::NotConfigured), Criticality::Optional);

        let report = aggregator.aggregate().await;
        assert_eq!(report.status(), HealthStatus::Healthy);
        assert!(report.is_ready());
        assert!(!report.shutting_down());
        assert_eq!(report.environment(), "test");
        assert_eq!(report.check("database").unwrap().state, CheckState::Connected);
        assert_eq!(report.check("redis").unwrap().state, CheckState::NotConfigured);
    }

    #[tokio::test]
    async fn test_required_unavailable_is_unhealthy() {
        let coordinator = coordinator();
        let aggregator = aggregator(&coordinator)
            .with_dependency(FakeDependency::new("database", Behavior::Unavailable), Criticality::Required)
            .with_dependency(FakeDependency::new("cache", Behavior::Connected), Criticality::Optional);

        let report = aggregator.aggregate().await;
        assert_eq!(report.status(), HealthStatus::Unhealthy);
        assert!(!report.is_ready());
        let database = report.check("database").unwrap();
        assert_eq!(database.state, CheckState::Unavailable);
        assert_eq!(database.detail.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn test_optional_unavailable_is_degraded() {
        let coordinator = coordinator();
        let aggregator = aggregator(&coordinator)
            .with_dependency(FakeDependency::new("database", Behavior::Connected), Criticality::Required)
            .with_dependency(FakeDependency::new("cache", Behavior::Unavailable), Criticality::Optional);

        let report = aggregator.aggregate().await;
        assert_eq!(report.status(), HealthStatus::Degraded);
        assert!(report.is_ready());
    }

    #[tokio::test]
    async fn test_panicking_check_is_isolated() {
        let coordinator = coordinator();
        let aggregator = aggregator(&coordinator)
            .with_dependency(FakeDependency::new("database", Behavior::Connected), Criticality::Required)
            .with_dependency(FakeDependency::new("search", Behavior::Panics), Criticality::Required)
            .with_dependency(FakeDependency::new("cache", Behavior::Connected), Criticality::Optional);

        let report = aggregator.aggregate().await;
        assert_eq!(report.checks().len(), 3);
        assert_eq!(report.check("database").unwrap().state, CheckState::Connected);
        assert_eq!(report.check("cache").unwrap().state, CheckState::Connected);

        let search = report.check("search").unwrap();
        assert_eq!(search.state, CheckState::Unavailable);
        assert!(search.detail.as_deref().unwrap().contains("driver bug"));
        assert_eq!(report.status(), HealthStatus::Unhealthy);
        assert!(report.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_check_times_out() {
        let coordinator = coordinator();
        let aggregator = aggregator(&coordinator)
            .with_dependency(
                FakeDependency::new("database", Behavior::Slow(Duration::from_secs(60))),
                Criticality::Required,
            )
            .with_dependency(FakeDependency::new("cache", Behavior::Connected), Criticality::Optional);

        let report = aggregator.aggregate().await;
        let database = report.check("database").unwrap();
        assert_eq!(database.state, CheckState::Unavailable);
        assert!(database.detail.as_deref().unwrap().contains("timed out after 2000ms"));
        assert_eq!(report.check("cache").unwrap().state, CheckState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checks_run_concurrently() {
        let coordinator = coordinator();
        let mut aggregator = aggregator(&coordinator);
        for name in ["a", "b", "c", "d"] {
            aggregator.register(
                FakeDependency::new(name, Behavior::Slow(Duration::from_millis(500))),
                Criticality::Required,
            );
        }

        let report = aggregator.aggregate().await;
        assert_eq!(report.status(), HealthStatus::Healthy);
        // Sequential execution would take 2000ms
        assert!(report.response_time_ms() >= 500);
        assert!(report.response_time_ms() < 1000);
    }

    #[tokio::test]
    async fn test_shutting_down_is_unhealthy_even_when_connected() {
        let coordinator = coordinator();
        let aggregator = aggregator(&coordinator)
            .with_dependency(FakeDependency::new("database", Behavior::Connected), Criticality::Required);

        assert!(aggregator.aggregate().await.is_ready());

        coordinator.trigger(ShutdownTrigger::Signal("SIGTERM"));

        for _ in 0..3 {
            let report = aggregator.aggregate().await;
            assert!(report.shutting_down());
            assert_eq!(report.status(), HealthStatus::Unhealthy);
            assert!(!report.is_ready());
            assert_eq!(report.check("database").unwrap().state, CheckState::Connected);
        }
    }

    #[tokio::test]
    async fn test_aggregation_failure_yields_error_report() {
        let coordinator = coordinator();
        let broken = Arc::new(BrokenName::default());
        let aggregator = aggregator(&coordinator)
            .with_dependency(FakeDependency::new("database", Behavior::Connected), Criticality::Required)
            .with_dependency(broken.clone(), Criticality::Optional);
        broken.armed.store(true, Ordering::SeqCst);

        let report = aggregator.aggregate().await;
        assert_eq!(report.status(), HealthStatus::Unhealthy);
        assert_eq!(report.error(), Some("name lookup failed"));
        assert!(report.checks().is_empty());
    }

    #[tokio::test]
    async fn test_no_dependencies_is_healthy() {
        let coordinator = coordinator();
        let report = aggregator(&coordinator).aggregate().await;
        assert_eq!(report.status(), HealthStatus::Healthy);
        assert!(report.checks().is_empty());
    }

    #[test]
    fn test_liveness_is_always_healthy() {
        let coordinator = coordinator();
        let aggregator = aggregator(&coordinator)
            .with_dependency(FakeDependency::new("database", Behavior::Unavailable), Criticality::Required);
        coordinator.trigger(ShutdownTrigger::Signal("SIGTERM"));
        assert_eq!(aggregator.liveness().status, HealthStatus::Healthy);
    }

    #[test]
    fn test_classify_unhealthy_iff_required_unavailable_or_shutting_down() {
        let states = [
            CheckOutcome::connected(),
            CheckOutcome::unavailable("down"),
            CheckOutcome::not_configured(),
        ];
        let criticalities = [Criticality::Required, Criticality::Optional];

        for first in &states {
            for second in &states {
                for first_criticality in criticalities {
                    for second_criticality in criticalities {
                        for shutting_down in [false, true] {
                            let pairs = [(first_criticality, first), (second_criticality, second)];
                            let status = classify(pairs, shutting_down);

                            let required_down = pairs.iter().any(|(c, o)| {
                                *c == Criticality::Required && o.is_unavailable()
                            });
                            let optional_down = pairs.iter().any(|(c, o)| {
                                *c == Criticality::Optional && o.is_unavailable()
                            });

                            assert_eq!(
                                status == HealthStatus::Unhealthy,
                                required_down || shutting_down
                            );
                            assert_eq!(
                                status == HealthStatus::Degraded,
                                optional_down && !required_down && !shutting_down
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_criticality_from_required() {
        assert_eq!(Criticality::from_required(true), Criticality::Required);
        assert_eq!(Criticality::from_required(false), Criticality::Optional);
    }
}
