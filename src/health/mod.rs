//! Health reporting for orchestration probes.
//!
//! # Data Flow
//! ```text
//! /health/live   → liveness report (no dependency fan-out)
//! /health/ready  → HealthAggregator::aggregate
//! /health        → HealthAggregator::aggregate
//!                     → every Dependency::check concurrently
//!                     → merge into HealthReport keyed by dependency name
//! ```
//!
//! Reports are built fresh for every request and never cached.

mod aggregator;
mod probe;
mod report;

pub use aggregator::{Criticality, HealthAggregator};
pub use probe::{
    build_dependency, Dependency, DependencyError, PostgresDependency, TcpDependency,
    UnconfiguredDependency,
};
pub use report::{CheckOutcome, CheckState, HealthReport, HealthStatus, LivenessReport};
