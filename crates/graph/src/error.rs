// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure taxonomy shared by the broker, the request engine and the tools.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// No application (client) id is available. Requires operator action.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The identity provider rejected the exchange.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Connection failure, timeout or 5xx after the retry budget ran out.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// HTTP 429 after the retry budget ran out.
    #[error("rate limited (retry after {retry_after_secs}s): {body}")]
    RateLimited { retry_after_secs: u64, body: String },

    #[error("validation error: {0}")]
    Validation(String),

    /// Non-retryable error status returned by the API.
    #[error("graph api returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl GraphError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration(_) => ErrorCode::ConfigurationError,
            Self::AccountNotFound(_) => ErrorCode::AccountNotFound,
            Self::Authentication(_) => ErrorCode::AuthenticationError,
            Self::TransientNetwork(_) => ErrorCode::TransientNetworkError,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Upstream { .. } => ErrorCode::UpstreamError,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Whether the request engine may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork(_) | Self::RateLimited { .. })
    }
}

impl From<std::io::Error> for GraphError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(format!("io: {e}"))
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("json: {e}"))
    }
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// Machine-readable error codes for the tool API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    ConfigurationError,
    AccountNotFound,
    AuthenticationError,
    TransientNetworkError,
    RateLimited,
    ValidationError,
    UpstreamError,
    Unauthorized,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ConfigurationError => 500,
            Self::AccountNotFound => 404,
            Self::AuthenticationError => 401,
            Self::TransientNetworkError => 502,
            Self::RateLimited => 429,
            Self::ValidationError => 400,
            Self::UpstreamError => 502,
            Self::Unauthorized => 401,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::AuthenticationError => "AUTHENTICATION_ERROR",
            Self::TransientNetworkError => "TRANSIENT_NETWORK_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
