//! File types and data structures.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::storage::ObjectStream;

/// Content type recorded when the client declares none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Persisted metadata for one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Auto-generated identifier. Never reused.
    pub id: i64,
    /// Name supplied by the uploader.
    pub original_file_name: String,
    /// Object key in the bucket. Unique and immutable.
    pub storage_key: String,
    /// MIME type.
    pub content_type: String,
    /// File size in bytes.
    pub file_size: i64,
    /// When the upload completed.
    pub upload_timestamp: DateTime<Utc>,
    /// Reserved; no operation reads or writes it.
    pub share_token: Option<String>,
}

/// Input for inserting a metadata record.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    /// Name supplied by the uploader.
    pub original_file_name: String,
    /// Object key in the bucket.
    pub storage_key: String,
    /// MIME type.
    pub content_type: String,
    /// File size in bytes.
    pub file_size: i64,
    /// Upload time.
    pub upload_timestamp: DateTime<Utc>,
}

/// Input for an upload.
#[derive(Debug, Clone)]
pub struct UploadInput {
    /// File bytes.
    pub content: Bytes,
    /// Name supplied by the uploader.
    pub original_name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Size the caller claims; checked against `content` when present.
    pub declared_size: Option<u64>,
}

impl UploadInput {
    /// Upload with the size derived from `content`.
    #[must_use]
    pub fn new(
        content: impl Into<Bytes>,
        original_name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            original_name: original_name.into(),
            content_type: content_type.into(),
            declared_size: None,
        }
    }

    /// Set the declared size.
    #[must_use]
    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }
}

/// An opened download. The caller owns `stream` and must drop it once the
/// body has been written (or the client went away).
pub struct FileDownload {
    /// Object body.
    pub stream: ObjectStream,
    /// MIME type recorded at upload.
    pub content_type: String,
    /// File size in bytes.
    pub file_size: i64,
    /// Name supplied by the uploader.
    pub file_name: String,
}

impl std::fmt::Debug for FileDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDownload")
            .field("content_type", &self.content_type)
            .field("file_size", &self.file_size)
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}
