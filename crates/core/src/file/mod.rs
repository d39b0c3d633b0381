//! File orchestration across object storage and metadata storage.
//!
//! This module provides:
//! - Upload (object write, then metadata insert, with compensating delete)
//! - Streamed download
//! - Metadata lookup
//! - Deletion (object first, then metadata)
//! - Time-limited share links

mod error;
mod service;
mod types;

#[cfg(test)]
mod tests;

pub use error::FileError;
pub use service::{FileRepository, FileService};
pub use types::{DEFAULT_CONTENT_TYPE, FileDownload, FileRecord, NewFileRecord, UploadInput};
