//! Health check endpoints for container orchestration.
//!
//! - `/health/live`: liveness. Answers as long as the process can serve HTTP.
//! - `/health/ready`: readiness. 503 once shutdown begins or a required
//!   dependency is unavailable, so load balancers stop routing here.
//! - `/health`: the readiness report for operators.
//!
//! Every response is JSON, including when aggregation fails.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::health::{HealthReport, LivenessReport};
use crate::state::AppState;

/// Liveness probe handler. No dependency checks.
pub async fn live(State(state): State<AppState>) -> Json<LivenessReport> {
    Json(state.health.liveness())
}

/// Readiness probe handler.
pub async fn ready(State(state): State<AppState>) -> Response {
    report_response(state.health.aggregate().await)
}

/// Operator-facing health handler. Same status code as readiness.
pub async fn health(State(state): State<AppState>) -> Response {
    report_response(state.health.aggregate().await)
}

fn report_response(report: HealthReport) -> Response {
    let status = if report.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}
