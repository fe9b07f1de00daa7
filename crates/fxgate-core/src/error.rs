//! Error types for fxgate.
//!
//! A single error enum is shared by the core library, the HTTP gateway and the
//! client crate. The gateway maps each variant to an HTTP status with
//! [`FxError::status_code`] and a short machine-readable code with
//! [`FxError::kind`].

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for fxgate.
#[derive(Debug, Error)]
pub enum FxError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Circuit breaker open for {domain}")]
    CircuitBreakerOpen { domain: String },

    // Upstream rate provider errors
    #[error("Upstream returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("No rate available for {currency}")]
    MissingRate { currency: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Request validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{message}")]
    InvalidRequest { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for fxgate operations.
pub type Result<T> = std::result::Result<T, FxError>;

impl From<std::io::Error> for FxError {
    fn from(err: std::io::Error) -> Self {
        FxError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for FxError {
    fn from(err: serde_json::Error) -> Self {
        FxError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for FxError {
    fn from(err: rusqlite::Error) -> Self {
        FxError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Timeouts are not distinguished here since the error does not carry the
/// configured duration; callers that know it map [`FxError::Timeout`]
/// themselves.
impl From<reqwest::Error> for FxError {
    fn from(err: reqwest::Error) -> Self {
        FxError::Network {
            message: err.to_string(),
            cause: err.url().map(|u| u.to_string()),
        }
    }
}

impl FxError {
    /// Shorthand for a validation error on a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        FxError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        FxError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// HTTP status the gateway answers with for this error.
    ///
    /// - 400: validation / malformed request
    /// - 429: upstream rate limit
    /// - 502: upstream failure or missing rate
    /// - 503: circuit breaker open
    /// - 504: upstream timeout
    /// - 500: everything else
    pub fn status_code(&self) -> u16 {
        match self {
            FxError::Validation { .. } | FxError::InvalidRequest { .. } => 400,
            FxError::RateLimited { .. } => 429,
            FxError::Network { .. } | FxError::Upstream { .. } | FxError::MissingRate { .. } => {
                502
            }
            FxError::CircuitBreakerOpen { .. } => 503,
            FxError::Timeout(_) => 504,
            _ => 500,
        }
    }

    /// Short machine-readable error code.
    pub fn kind(&self) -> &'static str {
        match self {
            FxError::Network { .. } => "network",
            FxError::Timeout(_) => "timeout",
            FxError::RateLimited { .. } => "rate_limited",
            FxError::CircuitBreakerOpen { .. } => "circuit_open",
            FxError::Upstream { .. } => "upstream",
            FxError::MissingRate { .. } => "missing_rate",
            FxError::Database { .. } => "database",
            FxError::Io { .. } => "io",
            FxError::Json { .. } => "json",
            FxError::Validation { .. } => "validation",
            FxError::InvalidRequest { .. } => "invalid_request",
            FxError::Config { .. } => "config",
            FxError::Other(_) => "internal",
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            FxError::Network { .. } | FxError::Timeout(_) | FxError::RateLimited { .. } => true,
            FxError::Upstream { status, .. } => matches!(status, 408 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}
