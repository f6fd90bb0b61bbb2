use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use colis_core::CoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ServerError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotFound => ServerError::NotFound,
            CoreError::Conflict(message) => ServerError::Conflict(message),
            CoreError::Validation(message) => ServerError::Validation(message),
            // The specific auth failure is already logged by the gate; the
            // response stays uniform so it does not reveal which part failed.
            CoreError::Auth(_) => ServerError::Unauthorized,
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<colis_store::StoreError> for ServerError {
    fn from(e: colis_store::StoreError) -> Self {
        ServerError::from(CoreError::from(e))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
