// src/error.rs

//! Unified error handling for the result analyser.
//!
//! Run-level failures live in [`AppError`]. Failures that belong to a single
//! registration number are never raised as `AppError`; they are typed as
//! [`ParseError`] or [`FetchFailure`] and folded into the record's status.

use std::fmt;

use thiserror::Error;

/// Result type alias for run-level operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Range or policy rejected before any request was made
    #[error("Invalid range configuration: {0}")]
    InvalidRangeConfig(String),

    /// Stored result missing or unreadable
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a range/policy validation error.
    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::InvalidRangeConfig(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

/// Why a fetched document could not be turned into a record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The page is the publisher's "no such registration number" page.
    #[error("document does not contain a result")]
    NotFoundShape,

    /// The page belongs to a different registration number.
    #[error("registration number mismatch: requested {expected}, found {found}")]
    Mismatch { expected: u64, found: String },

    /// A structurally required field is absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A numeric field is outside its declared bounds.
    #[error("{field} out of range: {value}")]
    OutOfRange { field: String, value: f64 },

    /// A numeric field could not be read at all.
    #[error("{field} is not a number: '{raw}'")]
    Malformed { field: String, raw: String },
}

/// Terminal outcome of fetching one registration number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Every candidate URL reported that the record does not exist.
    #[error("no candidate URL has a record (after {retries} retries)")]
    NotFound { retries: u32 },

    /// At least one candidate failed at the transport level.
    #[error("network failure after {retries} retries: {message}")]
    Network { message: String, retries: u32 },
}

impl FetchFailure {
    /// Retries spent before giving up.
    pub fn retries(&self) -> u32 {
        match self {
            Self::NotFound { retries } | Self::Network { retries, .. } => *retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_range_message() {
        let err = AppError::invalid_range("start 10 > end 3");
        assert_eq!(
            err.to_string(),
            "Invalid range configuration: start 10 > end 3"
        );
    }

    #[test]
    fn test_fetch_failure_retries() {
        let failure = FetchFailure::Network {
            message: "timeout".into(),
            retries: 4,
        };
        assert_eq!(failure.retries(), 4);
        assert_eq!(FetchFailure::NotFound { retries: 0 }.retries(), 0);
    }
}
