//! HTTP-facing error type
//!
//! Every JSON error body has the shape `{"error": <message>, "code": <CODE>}`
//! except upstream passthroughs, which carry the body the handler built.

use crate::error::StudySphereError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Error returned by HTTP handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400 with a machine-readable code
    #[error("bad request ({code}): {message}")]
    BadRequest {
        /// Machine-readable code, e.g. `MISSING_MESSAGE`
        code: &'static str,
        /// Human-readable message
        message: String,
    },

    /// 401 with a machine-readable code
    #[error("unauthorized ({code}): {message}")]
    Unauthorized {
        /// Machine-readable code
        code: &'static str,
        /// Human-readable message
        message: String,
    },

    /// 500 `MISSING_API_KEY`; carries the human-readable message
    #[error("{0}")]
    MissingApiKey(String),

    /// Upstream status with a prepared JSON body
    #[error("upstream returned HTTP {status}")]
    Upstream {
        /// Status forwarded to the caller
        status: u16,
        /// Response body
        body: Value,
    },

    /// 500 with a specific code
    #[error("{code}: {message}")]
    Failed {
        /// Machine-readable code
        code: &'static str,
        /// Human-readable message
        message: String,
    },

    /// 500 `INTERNAL_ERROR`; the detail is logged, never returned
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Shorthand for a 400
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    /// Map a library error onto an HTTP error
    ///
    /// Handlers that need a route-specific body (e.g. upstream failures)
    /// match on the domain error first and only fall back to this.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast_ref::<StudySphereError>() {
            Some(StudySphereError::Validation(msg)) => {
                Self::bad_request("INVALID_BODY", msg.clone())
            }
            Some(StudySphereError::InvalidImage(msg)) => {
                Self::bad_request("INVALID_IMAGE", format!("Invalid image attachment: {}", msg))
            }
            Some(StudySphereError::MissingApiKey(var)) => {
                Self::MissingApiKey(format!("API key not configured ({})", var))
            }
            Some(StudySphereError::Upstream { status, payload }) => Self::Upstream {
                status: *status,
                body: json!({ "error": "Upstream request failed", "details": payload }),
            },
            Some(StudySphereError::Authentication(msg)) => Self::Unauthorized {
                code: "UNAUTHENTICATED",
                message: msg.clone(),
            },
            _ => Self::Internal(format!("{:#}", err)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest { code, message } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "code": code }),
            ),
            ApiError::Unauthorized { code, message } => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": message, "code": code }),
            ),
            ApiError::MissingApiKey(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "code": "MISSING_API_KEY" }),
            ),
            ApiError::Upstream { status, body } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                body,
            ),
            ApiError::Failed { code, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "code": code }),
            ),
            ApiError::Internal(detail) => {
                tracing::error!("Internal server error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error", "code": "INTERNAL_ERROR" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
