//! Common error types and classification
//!
//! `CommonError` covers the failure patterns shared by the primitives in this
//! crate (configuration, serialization, validation, timeouts, internal
//! invariants). Module-specific errors (`VaultError`, `QueueError`,
//! `OAuthClientError`) compose with it and implement `ErrorClassification`
//! so callers can make retry decisions without matching on every variant.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across multiple modules
#[derive(Debug, Clone, Error)]
pub enum CommonError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error ({format}): {message}")]
    Serialization { message: String, format: String },

    #[error("Validation error for field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CommonError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn serialization_format<F: Into<String>, S: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: format.into() }
    }

    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

/// Standard interface for classifying errors by their characteristics.
pub trait ErrorClassification {
    /// Transient failures that may succeed when attempted again.
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    /// Data corruption, tampering or broken invariants.
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Config { .. } | Self::Serialization { .. } | Self::Validation { .. } => {
                ErrorSeverity::Error
            }
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Timeout { duration, .. } => Some(*duration),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error.
    use super::*;

    /// Validates `CommonError` display formatting.
    ///
    /// Assertions:
    /// - Confirms the validation message includes the field name.
    /// - Confirms the serialization message includes the format.
    #[test]
    fn test_display() {
        let err = CommonError::validation("page_size", "must be positive");
        assert_eq!(err.to_string(), "Validation error for field 'page_size': must be positive");

        let err = CommonError::serialization_format("JSON", "eof");
        assert!(err.to_string().contains("(JSON)"));
    }

    /// Validates classification of timeouts versus internal errors.
    ///
    /// Assertions:
    /// - Ensures timeouts are retryable with a retry hint.
    /// - Ensures internal errors are critical and not retryable.
    #[test]
    fn test_classification() {
        let timeout = CommonError::timeout("receive", Duration::from_secs(2));
        assert!(timeout.is_retryable());
        assert_eq!(timeout.retry_after(), Some(Duration::from_secs(2)));

        let internal = CommonError::internal("broken invariant");
        assert!(!internal.is_retryable());
        assert!(internal.is_critical());
    }
}
