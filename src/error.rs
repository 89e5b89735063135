//! Error types for Forgegate
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::providers::{Provider, ProviderAuthError};

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Authentication required (401)
    #[error("Not authenticated")]
    Unauthorized,

    /// Requested provider has no configured credentials (404)
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(Provider),

    /// Provider-side authentication failure (502)
    ///
    /// Browser flows intercept this at the router and redirect
    /// to the landing page instead of rendering it.
    #[error("Provider authentication failed: {0}")]
    ProviderAuth(#[from] ProviderAuthError),

    /// Session store failure (500)
    #[error("Session store error: {0}")]
    SessionStore(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body. Internal detail (store failures, config
    /// problems) is logged server-side and never sent to the client.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), "unauthorized"),
            AppError::ProviderNotConfigured(_) => {
                (StatusCode::NOT_FOUND, self.to_string(), "provider_unknown")
            }
            AppError::ProviderAuth(_) => (
                StatusCode::BAD_GATEWAY,
                "Authentication with provider failed".to_string(),
                "provider_auth",
            ),
            AppError::SessionStore(detail) => {
                tracing::error!(detail = %detail, "Session store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "session_store",
                )
            }
            AppError::Config(detail) => {
                tracing::error!(detail = %detail, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "config",
                )
            }
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string(), "http_client"),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "internal",
                )
            }
        };

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL
            .with_label_values(&[error_type, "unknown"])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
