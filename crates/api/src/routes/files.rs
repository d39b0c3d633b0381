//! File routes.
//!
//! Thin adapter over [`FileService`](blink_core::file::FileService): parses the
//! request, calls the orchestrator, and maps the result to a response.

use axum::{
    Json, Router,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::PathRejection,
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::info;

use crate::{AppState, error::ApiError};
use blink_core::file::{DEFAULT_CONTENT_TYPE, FileRecord, UploadInput};
use blink_core::storage::{attachment_disposition, sanitize_filename};
use blink_shared::AppError;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";

/// Name used when the part carries no file name.
const FALLBACK_FILE_NAME: &str = "file";

/// Creates the file routes, mounted under `/api/files`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_file))
        .route("/{id}", get(get_metadata).delete(delete_file))
        .route("/{id}/download", get(download_file))
        .route("/{id}/share", get(share_file))
}

// ============================================================================
// Response Types
// ============================================================================

/// File metadata as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecordResponse {
    /// File id.
    pub id: i64,
    /// Name supplied by the uploader.
    pub original_file_name: String,
    /// Object key in the bucket.
    pub s3_object_key: String,
    /// MIME type.
    pub content_type: String,
    /// Size in bytes.
    pub file_size: i64,
    /// Upload time (ISO 8601).
    pub upload_timestamp: String,
    /// Reserved.
    pub share_token: Option<String>,
}

impl From<FileRecord> for FileRecordResponse {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            original_file_name: record.original_file_name,
            s3_object_key: record.storage_key,
            content_type: record.content_type,
            file_size: record.file_size,
            upload_timestamp: record.upload_timestamp.to_rfc3339(),
            share_token: record.share_token,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn file_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

fn multipart_error(e: &MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError(AppError::PayloadTooLarge(e.body_text()))
    } else {
        ApiError::bad_request(e.body_text())
    }
}

/// `Content-Disposition` for a download. Names that cannot be carried in a
/// header fall back to their sanitized form.
fn disposition_header(file_name: &str) -> HeaderValue {
    HeaderValue::from_bytes(attachment_disposition(file_name).as_bytes())
        .or_else(|_| HeaderValue::from_str(&attachment_disposition(&sanitize_filename(file_name))))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/api/files/upload`
/// Upload the multipart part named `file`.
async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<FileRecordResponse>), ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut input = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_FILE_NAME)
            .to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let content = field.bytes().await.map_err(|e| multipart_error(&e))?;

        input = Some(UploadInput::new(content, file_name, content_type));
        break;
    }

    let input = input.ok_or_else(|| {
        ApiError::bad_request(format!("Multipart field '{FILE_FIELD}' is required"))
    })?;

    let record = state.files.upload(input).await?;
    info!(id = record.id, file_name = %record.original_file_name, "Upload accepted");

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET `/api/files/{id}/download`
/// Stream the file back as an attachment.
async fn download_file(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let id = file_id(path)?;
    let download = state.files.download(id).await?;

    let content_type = HeaderValue::from_str(&download.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let headers = [
        (header::CONTENT_TYPE, content_type),
        (
            header::CONTENT_DISPOSITION,
            disposition_header(&download.file_name),
        ),
        (header::CONTENT_LENGTH, HeaderValue::from(download.file_size)),
    ];

    // The body owns the object stream; it is released when the response
    // finishes or the client disconnects.
    Ok((StatusCode::OK, headers, Body::from_stream(download.stream)).into_response())
}

/// GET `/api/files/{id}`
/// Return file metadata.
async fn get_metadata(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<FileRecordResponse>, ApiError> {
    let id = file_id(path)?;
    let record = state.files.get_metadata(id).await?;
    Ok(Json(record.into()))
}

/// DELETE `/api/files/{id}`
/// Delete the object and its metadata.
async fn delete_file(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = file_id(path)?;
    state.files.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/api/files/{id}/share`
/// Issue a time-limited download URL as plain text.
async fn share_file(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<String, ApiError> {
    let id = file_id(path)?;
    let link = state
        .files
        .generate_share_link(id, state.share_link_ttl)
        .await?;
    Ok(link.url)
}
