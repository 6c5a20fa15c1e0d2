//! API errors and their HTTP mapping

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use core_pipeline::{ErrorBody, PipelineError, UNDECODABLE_IMAGE_MESSAGE};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::AcquireError;
use tokio::task::JoinError;

/// Request failures
///
/// The body only ever carries a fixed message; underlying causes are logged.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body is not a valid capture request: {0}")]
    InvalidJson(JsonRejection),

    #[error("request body exceeds the configured limit")]
    PayloadTooLarge,

    #[error("no image data provided")]
    MissingImage,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("capture did not finish within {0:?}")]
    Timeout(Duration),

    #[error("capture task failed: {0}")]
    Task(#[from] JoinError),

    #[error("capture slots closed: {0}")]
    Unavailable(#[from] AcquireError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::InvalidJson(rejection)
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidJson(_) | Self::MissingImage => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Pipeline(err) if err.is_decode_failure() => StatusCode::BAD_REQUEST,
            Self::Pipeline(_) | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client-facing message
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "Invalid JSON body",
            Self::PayloadTooLarge => "Image data too large",
            Self::MissingImage => "No image data provided",
            Self::Pipeline(err) if err.is_decode_failure() => UNDECODABLE_IMAGE_MESSAGE,
            Self::Pipeline(_) => "Text recognition failed",
            Self::Timeout(_) => "Text recognition timed out",
            Self::Task(_) => "Internal server error",
            Self::Unavailable(_) => "Service unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Capture failed");
        } else {
            tracing::warn!(error = %self, "Rejected capture request");
        }

        (status, Json(ErrorBody::new(self.message()))).into_response()
    }
}
