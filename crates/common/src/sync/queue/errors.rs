use thiserror::Error;

use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

/// Delivery queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Common(#[from] CommonError),

    /// The receipt was never issued, already deleted, or superseded by a
    /// redelivery.
    #[error("Receipt handle not found: {0}")]
    ReceiptNotFound(String),

    #[error("Invalid queue configuration: {0}")]
    InvalidConfig(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

impl ErrorClassification for QueueError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Common(e) => e.is_retryable(),
            Self::ReceiptNotFound(_) | Self::InvalidConfig(_) => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Common(e) => e.severity(),
            Self::ReceiptNotFound(_) => ErrorSeverity::Warning,
            Self::InvalidConfig(_) => ErrorSeverity::Error,
        }
    }
}
