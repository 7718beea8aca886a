use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

// ─── GatewayError ───────────────────────────────────────────────────────────

/// Failure kinds surfaced by gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// A required request field is missing or empty.
    #[error("{0}")]
    InvalidArgument(String),

    /// The caller's identity does not match the recorded host.
    #[error("{0}")]
    Forbidden(String),

    /// The media server (or token signer) reported a failure. The message is
    /// passed through as reported.
    #[error("{0}")]
    Upstream(String),
}

impl GatewayError {
    pub fn missing(field: &str) -> Self {
        Self::InvalidArgument(format!("{field} is required"))
    }

    pub fn upstream(err: impl std::fmt::Display) -> Self {
        Self::Upstream(err.to_string())
    }
}

// ─── JSON envelope ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorEnvelope {
    error: String,
}

// ─── ApiError ───────────────────────────────────────────────────────────────

/// HTTP error that serializes to `{"error": "<message>"}`.
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    pub status: StatusCode,
}

impl ApiError {
    /// 400 Bad Request with a custom message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            code: "invalid_argument",
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// 403 Forbidden with a custom message.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self {
            code: "forbidden",
            message: msg.into(),
            status: StatusCode::FORBIDDEN,
        }
    }

    /// 500 with the upstream message.
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self {
            code: "upstream_failure",
            message: msg.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidArgument(msg) => Self::bad_request(msg),
            GatewayError::Forbidden(msg) => Self::forbidden(msg),
            GatewayError::Upstream(msg) => Self::upstream(msg),
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

// ─── IntoResponse ───────────────────────────────────────────────────────────

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                code = self.code,
                status = self.status.as_u16(),
                "{}",
                self.message
            );
        } else if self.status.is_client_error() {
            tracing::warn!(
                code = self.code,
                status = self.status.as_u16(),
                "{}",
                self.message
            );
        }

        let envelope = ErrorEnvelope {
            error: self.message,
        };

        (self.status, Json(envelope)).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
