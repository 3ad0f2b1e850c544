use std::time::Duration;

use thiserror::Error;

use crate::infrastructure::queue::QueueError;
use crate::infrastructure::storage::StorageError;

use super::transcoder::TranscodeError;

pub type ConversionResult<T> = Result<T, ConversionError>;

/// Everything that can stop a conversion job.
///
/// Each variant is either permanent (the delivery is acknowledged and
/// dropped) or retryable (the delivery is requeued), see [`is_retryable`].
///
/// [`is_retryable`]: ConversionError::is_retryable
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Blob store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Transcoder rejected input: {0}")]
    TranscodeInvalidInput(String),

    #[error("Transcoder timed out after {0:?}")]
    TranscodeTimeout(Duration),

    #[error("Transcoder failed: {0}")]
    TranscodeProcessError(String),

    #[error("Publish failed: {0}")]
    PublishFailure(String),

    #[error("Scratch file error: {0}")]
    Scratch(#[from] std::io::Error),
}

impl ConversionError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConversionError::StoreUnavailable(_)
                | ConversionError::TranscodeTimeout(_)
                | ConversionError::TranscodeProcessError(_)
                | ConversionError::PublishFailure(_)
                | ConversionError::Scratch(_)
        )
    }
}

impl From<StorageError> for ConversionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => ConversionError::ObjectNotFound(key),
            StorageError::Io(e) => ConversionError::Scratch(e),
            other => ConversionError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<TranscodeError> for ConversionError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::InvalidInput(msg) => ConversionError::TranscodeInvalidInput(msg),
            TranscodeError::Timeout(limit) => ConversionError::TranscodeTimeout(limit),
            other => ConversionError::TranscodeProcessError(other.to_string()),
        }
    }
}

impl From<QueueError> for ConversionError {
    fn from(err: QueueError) -> Self {
        ConversionError::PublishFailure(err.to_string())
    }
}
