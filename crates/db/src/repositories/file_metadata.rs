//! File metadata repository for database operations.
//!
//! Implements the core [`FileRepository`](blink_core::file::FileRepository)
//! trait using SeaORM.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, NotSet, QueryFilter,
    Set, TransactionTrait,
};

use crate::entities::file_metadata;
use blink_core::file::{FileError, FileRecord, FileRepository, NewFileRecord};

/// File metadata repository implementation.
#[derive(Debug, Clone)]
pub struct FileMetadataRepository {
    db: DatabaseConnection,
}

impl FileMetadataRepository {
    /// Create a new file metadata repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl FileRepository for FileMetadataRepository {
    async fn create(&self, input: NewFileRecord) -> Result<FileRecord, FileError> {
        let active_model = file_metadata::ActiveModel {
            id: NotSet,
            original_file_name: Set(input.original_file_name),
            s3_object_key: Set(input.storage_key),
            content_type: Set(input.content_type),
            file_size: Set(input.file_size),
            upload_timestamp: Set(input.upload_timestamp.into()),
            share_token: Set(None),
        };

        let txn = self.db.begin().await.map_err(repository_error)?;
        let model = active_model.insert(&txn).await.map_err(repository_error)?;
        txn.commit().await.map_err(repository_error)?;

        Ok(to_domain(model))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<FileRecord>, FileError> {
        let model = file_metadata::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(repository_error)?;

        Ok(model.map(to_domain))
    }

    async fn find_by_storage_key(&self, storage_key: &str) -> Result<Option<FileRecord>, FileError> {
        let model = file_metadata::Entity::find()
            .filter(file_metadata::Column::S3ObjectKey.eq(storage_key))
            .one(&self.db)
            .await
            .map_err(repository_error)?;

        Ok(model.map(to_domain))
    }

    async fn delete(&self, id: i64) -> Result<bool, FileError> {
        let txn = self.db.begin().await.map_err(repository_error)?;
        let result = file_metadata::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(repository_error)?;
        txn.commit().await.map_err(repository_error)?;

        Ok(result.rows_affected > 0)
    }
}

fn repository_error(e: DbErr) -> FileError {
    FileError::metadata(e.to_string())
}

/// Convert database model to domain model.
fn to_domain(model: file_metadata::Model) -> FileRecord {
    FileRecord {
        id: model.id,
        original_file_name: model.original_file_name,
        storage_key: model.s3_object_key,
        content_type: model.content_type,
        file_size: model.file_size,
        upload_timestamp: model.upload_timestamp.with_timezone(&Utc),
        share_token: model.share_token,
    }
}
