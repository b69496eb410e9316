use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde_json::json;

use crate::health::DependencyError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Route not found")]
    NotFound,

    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Dependency(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Dependency unavailable".to_string(),
            ),
        };

        let body = json!({
            "error": {
                "statusCode": status.as_u16(),
                "message": message,
                "timestamp": Utc::now(),
            }
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        let response = AppError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_dependency_error_is_unavailable() {
        let err = AppError::from(DependencyError::Database(sqlx::Error::PoolClosed));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
