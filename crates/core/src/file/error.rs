//! File operation error types.

use thiserror::Error;

use crate::storage::StorageError;
use blink_shared::AppError;

/// File operation errors.
#[derive(Debug, Error)]
pub enum FileError {
    /// No metadata record for the id.
    #[error("File not found with ID: {0}")]
    NotFound(i64),

    /// Metadata exists but the object is missing from the store.
    #[error("File not found in storage with key: {0}")]
    ObjectNotFound(String),

    /// Upload carried no bytes.
    #[error("file is empty")]
    EmptyContent,

    /// Declared size disagrees with the bytes received.
    #[error("file size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Declared file size.
        expected: u64,
        /// Actual file size.
        actual: u64,
    },

    /// File too large.
    #[error("file too large: {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge {
        /// Actual file size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Object store write failed.
    #[error("storage write failed: {0}")]
    StorageWrite(#[source] StorageError),

    /// Object store read or presign failed.
    #[error("storage read failed: {0}")]
    StorageRead(#[source] StorageError),

    /// Object store delete failed.
    #[error("storage delete failed: {0}")]
    StorageDelete(#[source] StorageError),

    /// Metadata store rejected the read or write.
    #[error("metadata persistence failed: {0}")]
    Metadata(String),
}

impl FileError {
    /// Create a file size mismatch error.
    #[must_use]
    pub fn size_mismatch(expected: u64, actual: u64) -> Self {
        Self::SizeMismatch { expected, actual }
    }

    /// Create a metadata error.
    #[must_use]
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    /// True for both the missing-record and the missing-object cases.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ObjectNotFound(_))
    }
}

impl From<FileError> for AppError {
    fn from(err: FileError) -> Self {
        let msg = err.to_string();
        match err {
            FileError::NotFound(_) | FileError::ObjectNotFound(_) => Self::NotFound(msg),
            FileError::EmptyContent | FileError::SizeMismatch { .. } => Self::Validation(msg),
            FileError::FileTooLarge { .. } => Self::PayloadTooLarge(msg),
            FileError::StorageWrite(_)
            | FileError::StorageRead(_)
            | FileError::StorageDelete(_) => Self::ExternalService(msg),
            FileError::Metadata(_) => Self::Database(msg),
        }
    }
}
