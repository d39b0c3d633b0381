//! The object store seam used by the file orchestrator.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use super::error::StorageError;

/// Streamed object body. The holder owns the underlying connection and
/// releases it when the stream is dropped.
pub type ObjectStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Presigned URL for download.
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    /// The presigned URL.
    pub url: String,
    /// HTTP method to use (GET for download).
    pub method: String,
    /// When the URL expires.
    pub expires_at: DateTime<Utc>,
    /// Required headers for the request.
    pub headers: HashMap<String, String>,
}

/// Operations against a single bucket, keyed by opaque object key.
///
/// [`super::StorageService`] implements this over OpenDAL; tests provide
/// in-memory doubles.
pub trait ObjectStore: Send + Sync {
    /// Bucket (or root) every key is resolved against.
    fn bucket(&self) -> &str;

    /// Reject uploads the backend is configured to refuse.
    fn validate_upload(&self, size: u64) -> Result<(), StorageError> {
        let _ = size;
        Ok(())
    }

    /// Write `content` under `key`.
    fn put(
        &self,
        key: &str,
        content: Bytes,
        content_type: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Open a read stream for `key`.
    ///
    /// A missing object is reported as [`StorageError::NotFound`].
    fn open(&self, key: &str) -> impl Future<Output = Result<ObjectStream, StorageError>> + Send;

    /// Remove the object at `key`. Removing an absent key succeeds.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Produce a time-limited GET URL that serves the object as an attachment
    /// named `file_name`.
    fn presign_download(
        &self,
        key: &str,
        ttl: Duration,
        file_name: &str,
    ) -> impl Future<Output = Result<PresignedUrl, StorageError>> + Send;
}

/// Instant at which a URL issued at `now` with lifetime `ttl` expires.
///
/// Saturates at the maximum representable instant.
#[must_use]
pub fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
