use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::models::RiskTier;

/// Application-level errors.
///
/// Only configuration and programmer errors live here. Per-lessee lookup
/// failures are absorbed into that lessee's enrichment record instead.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// The discount policy has no rate for a tier.
    PolicyIncomplete(RiskTier),
    /// The discount policy carries a rate that cannot be used.
    InvalidPolicy(String),
    /// Engine settings are out of range (e.g. a zero concurrency bound).
    InvalidConfig(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Internal server error.
    InternalError(String),
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::PolicyIncomplete(tier) => {
                write!(f, "Discount policy has no rate for tier '{}'", tier)
            }
            AppError::InvalidPolicy(msg) => write!(f, "Invalid discount policy: {}", msg),
            AppError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Policy problems are the caller's fault when the policy came in the
    /// request body, so they map to 422 rather than 500.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::PolicyIncomplete(_) | AppError::InvalidPolicy(_) => {
                tracing::warn!("Rejected discount policy: {}", self);
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InvalidConfig(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Service misconfigured".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Failure of a single registry lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry has no record for the lessee. Terminal.
    NotFound,
    /// The registry throttled us. Retried.
    RateLimited(String),
    /// Network failure, timeout, 5xx or an open circuit. Retried.
    Unavailable(String),
    /// The registry answered with data we cannot use. Terminal.
    Malformed(String),
}

impl RegistryError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RegistryError::RateLimited(_) | RegistryError::Unavailable(_)
        )
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NotFound => write!(f, "not found"),
            RegistryError::RateLimited(msg) => write!(f, "rate limited ({})", msg),
            RegistryError::Unavailable(msg) => write!(f, "unavailable ({})", msg),
            RegistryError::Malformed(msg) => write!(f, "malformed response ({})", msg),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<reqwest::Error> for RegistryError {
    /// Converts a transport-level `reqwest::Error` into a `RegistryError`.
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RegistryError::Malformed(err.to_string())
        } else {
            RegistryError::Unavailable(err.to_string())
        }
    }
}
