use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use facematch::{ErrorCode, VerificationResult};

/// Failures raised by the gateway itself, outside the verification pipeline.
///
/// They are rendered with the same envelope as pipeline results so callers
/// only ever parse one shape.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("internal error: {0}")]
    InternalError(String),
}

impl GatewayError {
    pub fn from_rejection(rejection: JsonRejection, limit: usize) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GatewayError::PayloadTooLarge { limit }
        } else {
            GatewayError::InvalidPayload(rejection.body_text())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::InvalidPayload(_) | GatewayError::PayloadTooLarge { .. } => {
                ErrorCode::InvalidPayload
            }
            GatewayError::InternalError(_) => ErrorCode::InternalError,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Rejecting verification request");
        let body = Json(VerificationResult::failed(self.code()));
        (self.status(), body).into_response()
    }
}

/// HTTP status for a pipeline result.
pub fn status_for(result: &VerificationResult) -> StatusCode {
    match result.error_code() {
        Some(ErrorCode::InvalidPayload) => StatusCode::BAD_REQUEST,
        Some(ErrorCode::InternalError) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    }
}
