//! API index and fallback handlers.

use axum::response::Json;
use serde_json::{json, Value};

use crate::error::AppError;

/// Describes the API at its prefix.
pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "User service API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// JSON 404 for any unmatched route.
pub async fn not_found() -> AppError {
    AppError::NotFound
}
