use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use taskd_store::StoreError;

/// A single field-level validation failure, surfaced in 422 bodies.
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// The two client-visible error kinds, plus the unexpected-fault catch-all.
#[derive(Debug)]
pub enum ApiError {
    /// The referenced id does not exist. Always a fixed 404 body.
    NotFound,
    /// Input failed shape/length/type validation before reaching the store.
    Validation(Vec<FieldError>),
    /// Unexpected store failure; logged, surfaced as a bare 500.
    Internal(String),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::NotFound,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "detail": "Task not found" })),
            )
                .into_response(),
            Self::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": errors })),
            )
                .into_response(),
            Self::Internal(detail) => {
                tracing::error!(detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let resp = ApiError::NotFound.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_maps_to_422() {
        let resp = ApiError::validation("title", "title must not be empty").into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn store_not_found_converts() {
        let err: ApiError = StoreError::NotFound("task 7".into()).into();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[test]
    fn store_database_error_is_internal() {
        let err: ApiError = StoreError::Database("disk I/O error".into()).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
