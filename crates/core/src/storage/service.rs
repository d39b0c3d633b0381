//! Storage service implementation using Apache OpenDAL.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use opendal::{Operator, services};
use tracing::debug;
use uuid::Uuid;

use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;
use super::store::{ObjectStore, ObjectStream, PresignedUrl, expiry_after};

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    /// Storage key.
    pub storage_key: String,
    /// Object size in bytes.
    pub file_size: u64,
    /// Content type, when the backend records one.
    pub content_type: Option<String>,
}

/// Storage service for uploaded files.
pub struct StorageService {
    operator: Operator,
    config: StorageConfig,
}

impl StorageService {
    /// Create a new storage service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&config.provider)?;
        Ok(Self { operator, config })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                // Path-style addressing is OpenDAL's default, which non-AWS
                // endpoints such as MinIO require.
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);

                Ok(Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish())
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );

                Ok(Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish())
            }
        }
    }

    /// Look up size and content type of a stored object.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the object does not exist.
    pub async fn stat(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        let meta = self
            .operator
            .stat(key)
            .await
            .map_err(|e| StorageError::from_opendal(&e, key))?;

        Ok(ObjectMetadata {
            storage_key: key.to_string(),
            file_size: meta.content_length(),
            content_type: meta.content_type().map(String::from),
        })
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.config.provider.name()
    }
}

impl ObjectStore for StorageService {
    fn bucket(&self) -> &str {
        self.config.provider.bucket()
    }

    fn validate_upload(&self, size: u64) -> Result<(), StorageError> {
        if size > self.config.max_file_size {
            return Err(StorageError::file_too_large(
                size,
                self.config.max_file_size,
            ));
        }
        Ok(())
    }

    async fn put(&self, key: &str, content: Bytes, content_type: &str) -> Result<(), StorageError> {
        let size = content.len();
        let supports_content_type = self
            .operator
            .info()
            .full_capability()
            .write_with_content_type;

        let written = if supports_content_type {
            self.operator
                .write_with(key, content)
                .content_type(content_type)
                .await
        } else {
            self.operator.write(key, content).await
        };
        written.map_err(|e| StorageError::from_opendal(&e, key))?;

        debug!(key = %key, size, provider = self.provider_name(), "Object written");
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<ObjectStream, StorageError> {
        // The reader is lazy, so a missing object only surfaces through stat.
        self.stat(key).await?;

        let reader = self
            .operator
            .reader(key)
            .await
            .map_err(|e| StorageError::from_opendal(&e, key))?;
        let stream = reader
            .into_bytes_stream(..)
            .await
            .map_err(|e| StorageError::from_opendal(&e, key))?;

        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.operator
            .delete(key)
            .await
            .map_err(|e| StorageError::from_opendal(&e, key))
    }

    async fn presign_download(
        &self,
        key: &str,
        ttl: Duration,
        file_name: &str,
    ) -> Result<PresignedUrl, StorageError> {
        let disposition = attachment_disposition(file_name);
        let presigned = self
            .operator
            .presign_read_with(key, ttl)
            .override_content_disposition(&disposition)
            .await
            .map_err(|e| match e.kind() {
                opendal::ErrorKind::Unsupported => StorageError::PresignNotSupported,
                _ => StorageError::from_opendal(&e, key),
            })?;

        Ok(PresignedUrl {
            url: presigned.uri().to_string(),
            method: presigned.method().to_string(),
            expires_at: expiry_after(Utc::now(), ttl),
            headers: HashMap::new(),
        })
    }
}

/// Generate a storage key for an uploaded file.
///
/// Format: `{uuid_v4}-{sanitized_filename}`. The random prefix makes keys
/// unique without consulting the metadata store.
#[must_use]
pub fn generate_storage_key(original_name: &str) -> String {
    let sanitized = sanitize_filename(original_name);
    if sanitized.is_empty() {
        format!("{}-file", Uuid::new_v4())
    } else {
        format!("{}-{}", Uuid::new_v4(), sanitized)
    }
}

/// Sanitize filename for storage key.
///
/// Only allows ASCII alphanumeric characters, dots, hyphens, and underscores.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `Content-Disposition` value serving a download as `file_name`.
#[must_use]
pub fn attachment_disposition(file_name: &str) -> String {
    let escaped = file_name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("attachment; filename=\"{escaped}\"")
}
