//! File service implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use super::error::FileError;
use super::types::{DEFAULT_CONTENT_TYPE, FileDownload, FileRecord, NewFileRecord, UploadInput};
use crate::storage::{ObjectStore, PresignedUrl, StorageError, generate_storage_key};

/// Repository trait for file metadata persistence.
///
/// This trait is implemented by the db crate to provide actual database operations.
/// Each write commits as its own local transaction.
pub trait FileRepository: Send + Sync {
    /// Insert a record and return it with its assigned id.
    fn create(
        &self,
        input: NewFileRecord,
    ) -> impl Future<Output = Result<FileRecord, FileError>> + Send;

    /// Find record by id.
    fn find_by_id(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<FileRecord>, FileError>> + Send;

    /// Find record by storage key.
    fn find_by_storage_key(
        &self,
        storage_key: &str,
    ) -> impl Future<Output = Result<Option<FileRecord>, FileError>> + Send;

    /// Delete record by id. Returns whether a row was removed.
    fn delete(&self, id: i64) -> impl Future<Output = Result<bool, FileError>> + Send;
}

/// Coordinates the object store and the metadata store.
///
/// Holds no mutable state; share it behind an `Arc` across tasks.
pub struct FileService<S: ObjectStore, R: FileRepository> {
    storage: Arc<S>,
    repo: Arc<R>,
}

impl<S: ObjectStore, R: FileRepository> FileService<S, R> {
    /// Create a new file service.
    #[must_use]
    pub fn new(storage: Arc<S>, repo: Arc<R>) -> Self {
        Self { storage, repo }
    }

    /// Store a file and record its metadata.
    ///
    /// The object is written first; the record is inserted only after the
    /// write succeeds. If the insert fails the object is deleted again.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The content is empty, oversized, or disagrees with the declared size
    /// - The object write fails
    /// - The metadata insert fails
    pub async fn upload(&self, input: UploadInput) -> Result<FileRecord, FileError> {
        let size = u64::try_from(input.content.len()).unwrap_or(u64::MAX);
        if size == 0 {
            return Err(FileError::EmptyContent);
        }
        if let Some(declared) = input.declared_size
            && declared != size
        {
            return Err(FileError::size_mismatch(declared, size));
        }
        self.storage.validate_upload(size).map_err(|e| match e {
            StorageError::FileTooLarge { size, max } => FileError::FileTooLarge { size, max },
            other => FileError::StorageWrite(other),
        })?;

        let content_type = if input.content_type.trim().is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            input.content_type
        };
        let storage_key = generate_storage_key(&input.original_name);

        if let Err(e) = self
            .storage
            .put(&storage_key, input.content, &content_type)
            .await
        {
            error!(
                bucket = %self.storage.bucket(),
                key = %storage_key,
                file_name = %input.original_name,
                error = %e,
                "Object write failed"
            );
            return Err(FileError::StorageWrite(e));
        }

        let new_record = NewFileRecord {
            original_file_name: input.original_name,
            storage_key: storage_key.clone(),
            content_type,
            file_size: i64::try_from(size).unwrap_or(i64::MAX),
            upload_timestamp: Utc::now(),
        };

        match self.repo.create(new_record).await {
            Ok(record) => {
                info!(
                    id = record.id,
                    key = %record.storage_key,
                    size = record.file_size,
                    "File uploaded"
                );
                Ok(record)
            }
            Err(e) => {
                error!(key = %storage_key, error = %e, "Metadata insert failed, removing object");
                if let Err(cleanup) = self.storage.delete(&storage_key).await {
                    error!(
                        key = %storage_key,
                        error = %cleanup,
                        "Compensating delete failed, object is orphaned"
                    );
                }
                Err(e)
            }
        }
    }

    /// Open a download stream for a file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No record exists for `id`
    /// - The record exists but the object is missing
    /// - The object store fails
    pub async fn download(&self, id: i64) -> Result<FileDownload, FileError> {
        let record = self.get_metadata(id).await?;

        let stream = match self.storage.open(&record.storage_key).await {
            Ok(stream) => stream,
            Err(StorageError::NotFound { .. }) => {
                warn!(id, key = %record.storage_key, "Metadata present but object missing");
                return Err(FileError::ObjectNotFound(record.storage_key));
            }
            Err(e) => {
                error!(id, key = %record.storage_key, error = %e, "Object read failed");
                return Err(FileError::StorageRead(e));
            }
        };

        Ok(FileDownload {
            stream,
            content_type: record.content_type,
            file_size: record.file_size,
            file_name: record.original_file_name,
        })
    }

    /// Get file metadata by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is not found or the lookup fails.
    pub async fn get_metadata(&self, id: i64) -> Result<FileRecord, FileError> {
        self.repo
            .find_by_id(id)
            .await
            .inspect_err(|e| error!(id, error = %e, "Metadata lookup failed"))?
            .ok_or(FileError::NotFound(id))
    }

    /// Get file metadata by storage key.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails. An unknown key yields `None`.
    pub async fn find_by_storage_key(&self, key: &str) -> Result<Option<FileRecord>, FileError> {
        self.repo
            .find_by_storage_key(key)
            .await
            .inspect_err(|e| error!(key = %key, error = %e, "Metadata lookup failed"))
    }

    /// Delete a file.
    ///
    /// The object is removed first. The record is kept when that fails, so the
    /// caller can retry.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No record exists for `id`
    /// - Object deletion fails
    /// - Record deletion fails
    pub async fn delete(&self, id: i64) -> Result<(), FileError> {
        let record = self.get_metadata(id).await?;

        if let Err(e) = self.storage.delete(&record.storage_key).await {
            error!(id, key = %record.storage_key, error = %e, "Object delete failed");
            return Err(FileError::StorageDelete(e));
        }

        match self.repo.delete(id).await {
            Ok(true) => {
                info!(id, key = %record.storage_key, "File deleted");
                Ok(())
            }
            // Another request removed the row between lookup and delete.
            Ok(false) => Err(FileError::NotFound(id)),
            Err(e) => {
                error!(
                    id,
                    key = %record.storage_key,
                    error = %e,
                    "Object removed but metadata delete failed"
                );
                Err(e)
            }
        }
    }

    /// Issue a time-limited download link for a file.
    ///
    /// No state is kept for issued links; they stay valid until `ttl` elapses.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is not found or presigning fails.
    pub async fn generate_share_link(
        &self,
        id: i64,
        ttl: Duration,
    ) -> Result<PresignedUrl, FileError> {
        let record = self.get_metadata(id).await?;

        let presigned = self
            .storage
            .presign_download(&record.storage_key, ttl, &record.original_file_name)
            .await
            .map_err(|e| {
                error!(id, key = %record.storage_key, error = %e, "Presign failed");
                FileError::StorageRead(e)
            })?;

        info!(id, expires_at = %presigned.expires_at, "Share link issued");
        Ok(presigned)
    }

    /// Bucket every object of this service lives in.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.storage.bucket()
    }
}
