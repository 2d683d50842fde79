//! API error types
//!
//! Request-level failures rendered as `{ "error": CODE, "message": ... }`.
//! Upstream and narrative failures never reach this type; they degrade to
//! empty data and placeholder text before a response is built.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::handlers::export::ExportError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A required query parameter is absent
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// A query parameter could not be interpreted
    #[error("invalid {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// `start_date` after `end_date`, or a range longer than the policy allows
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    /// No report registered under this name
    #[error("unknown report type: {0}")]
    UnknownReport(String),

    #[error("{0}")]
    NotFound(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_)
            | Self::InvalidParameter { .. }
            | Self::InvalidDateRange(_)
            | Self::UnknownReport(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) | Self::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "MISSING_PARAMETER",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::InvalidDateRange(_) => "INVALID_DATE_RANGE",
            Self::UnknownReport(_) => "UNKNOWN_REPORT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Export(_) => "EXPORT_FAILED",
        }
    }

    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound(format!("{} '{}' not found", entity, id))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::internal(format!("report serialization failed: {}", e))
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error_code = body.error, error_message = %body.message, "API error");
        } else {
            tracing::warn!(error_code = body.error, error_message = %body.message, "API error");
        }

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"storefront-insights\""),
            );
        }
        response
    }
}
