//! Error handling for the prediction pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
///
/// `Config` is fatal at startup. Everything else is raised while
/// processing a single source and is contained at the per-source boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Observation store read/write failed
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Payload could not be decoded into a typed reading
    #[error("Decode error: {0}")]
    Decode(String),

    /// Model invocation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Source processing exceeded its time budget
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Request validation (HTTP front-end)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Panic or worker failure while processing a source
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short machine-readable category, used in logs and cycle reports
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Error::Decode(_) => "DECODE_ERROR",
            Error::Inference(_) => "INFERENCE_ERROR",
            Error::Timeout(_) => "TIMEOUT",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) | Error::Decode(_) => StatusCode::BAD_REQUEST,
            Error::StoreUnavailable(_) | Error::Inference(_) => StatusCode::BAD_GATEWAY,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let error_code = self.code();
        let message = self.to_string();

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
