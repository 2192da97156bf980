//! HTTP error type for objrel-dq
//!
//! Every failure leaves the service as
//! `{ "success": false, "error": { "code", "message" } }` (plus the offending
//! ids when the engine named any).

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Engine error, mapped by its stable code
    #[error(transparent)]
    Engine(#[from] objrel_common::Error),

    /// Request body could not be decoded (400)
    #[error("Invalid request body: {0}")]
    Body(#[from] JsonRejection),

    /// Query string could not be decoded (400)
    #[error("Invalid query string: {0}")]
    Query(#[from] QueryRejection),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Engine(err) => err.code(),
            ApiError::Body(_) | ApiError::Query(_) => "VALIDATION_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONSTRAINT_VIOLATION" => StatusCode::CONFLICT,
            "TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.to_string();

        if status.is_server_error() {
            error!(code, "Request failed: {}", message);
        } else {
            warn!(code, "Request rejected: {}", message);
        }

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let ApiError::Engine(err) = &self {
            if !err.offending_ids().is_empty() {
                error["ids"] = json!(err.offending_ids());
            }
        }

        let body = Json(json!({
            "success": false,
            "error": error,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
