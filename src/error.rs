// src/error.rs

//! Unified error handling for the watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Malformed search query
    #[error("Invalid query '{query}': {message}")]
    Parse { query: String, message: String },

    /// Upstream answered 502, the page should be fetched again
    #[error("Search API: 502 bad gateway")]
    BadGateway,

    /// Upstream answered with any other non-success status
    #[error("Search API: invalid status code {status}")]
    Status { status: u16 },

    /// Area code missing from the geo table
    #[error("No coordinates found for area code {0}")]
    Geo(u32),

    /// Persistence failure
    #[error("Store error for {key}: {message}")]
    Store { key: String, message: String },

    /// Notification sink failure
    #[error("Notify error: {0}")]
    Notify(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Background task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The operation was interrupted by a cancellation request
    #[error("Operation cancelled")]
    Cancelled,
}

impl AppError {
    /// Create a query parse error.
    pub fn parse(query: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            query: query.into(),
            message: message.to_string(),
        }
    }

    /// Create a store error with the offending key.
    pub fn store(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Store {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create a notification error.
    pub fn notify(message: impl fmt::Display) -> Self {
        Self::Notify(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether a failed page fetch should be retried at the same offset.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::BadGateway => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AppError::BadGateway.is_transient());
        assert!(!AppError::Status { status: 500 }.is_transient());
        assert!(!AppError::Cancelled.is_transient());
        assert!(!AppError::Geo(28001).is_transient());
    }

    #[test]
    fn test_parse_error_message() {
        let err = AppError::parse("foo?min=x", "couldn't parse int x");
        assert_eq!(
            err.to_string(),
            "Invalid query 'foo?min=x': couldn't parse int x"
        );
    }
}
