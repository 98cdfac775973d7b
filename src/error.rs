//! Error types for the ControlD sync tool.
//!
//! Errors are split by where they originate: configuration, the remote
//! APIs (Tailscale and ControlD), and the pre-change backup. Per-operation
//! failures during plan execution are not errors at this level; they are
//! recorded in the execution report instead.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote API errors.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Backup errors.
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A credential is missing or still holds a template placeholder.
    #[error("Missing credential {name}: set it in the config file or the {env} environment variable")]
    MissingCredential {
        /// Config field name of the credential.
        name: String,
        /// Environment variable that can provide it.
        env: String,
    },
}

/// Remote service an [`ApiError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Tailscale control plane API.
    Tailscale,
    /// ControlD DNS filtering API.
    ControlD,
}

/// Remote API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed.
    #[error("{service} authentication failed: {message}")]
    AuthenticationFailed {
        /// Service that rejected the credentials.
        service: Service,
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("{service} API request failed: {status} - {message}")]
    RequestFailed {
        /// Service that returned the failure.
        service: Service,
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("{service} API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Service that throttled the request.
        service: Service,
        /// Seconds the server asked to wait.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with {service}: {message}")]
    NetworkError {
        /// Service that could not be reached.
        service: Service,
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from {service} API: {message}")]
    InvalidResponse {
        /// Service that sent the response.
        service: Service,
        /// Description of the response issue.
        message: String,
    },
}

/// Errors writing the pre-change backup.
#[derive(Debug, Error)]
pub enum BackupError {
    /// A backup with the same timestamp already exists.
    #[error("Backup file already exists: {path}")]
    AlreadyExists {
        /// Path of the existing artifact.
        path: PathBuf,
    },

    /// The backup could not be serialized.
    #[error("Failed to serialize backup: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },

    /// The backup could not be written.
    #[error("Failed to write backup {path}: {source}")]
    Write {
        /// Path of the artifact being written.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Returns true if the remote service rejected our credentials.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Api(ApiError::AuthenticationFailed { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

/// Fallback wait reported when a 429 carries no usable `retry-after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

impl ApiError {
    /// Creates a rate-limit error from the response headers.
    #[must_use]
    pub fn rate_limited(service: Service, headers: &reqwest::header::HeaderMap) -> Self {
        let retry_after_secs = headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

        Self::RateLimited {
            service,
            retry_after_secs,
        }
    }

    /// Creates an API request error.
    #[must_use]
    pub fn request_failed(service: Service, status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            service,
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(service: Service, message: impl Into<String>) -> Self {
        Self::NetworkError {
            service,
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(service: Service, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tailscale => "Tailscale",
            Self::ControlD => "ControlD",
        };
        write!(f, "{s}")
    }
}
