//! Object storage for uploaded files using Apache OpenDAL.
//!
//! This module provides vendor-agnostic object storage with support for:
//! - S3-compatible: MinIO, Cloudflare R2, AWS S3 (path-style addressing)
//! - Local filesystem (development only)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Apache OpenDAL                              │
//! │                   (Unified Storage API)                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ op.write_with("key", data) │ op.presign_read_with("key", ttl)   │
//! │ op.reader("key")           │ op.stat("key")                     │
//! │ op.delete("key")           │                                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Bucket creation is outside OpenDAL's scope and lives in [`bucket`].

pub mod bucket;
mod config;
mod error;
mod service;
mod store;

pub use bucket::{BucketProvisioner, BucketStatus, Provisioner, ensure_bucket};
pub use config::{StorageConfig, StorageProvider};
pub use error::StorageError;
pub use service::{
    ObjectMetadata, StorageService, attachment_disposition, generate_storage_key,
    sanitize_filename,
};
pub use store::{ObjectStore, ObjectStream, PresignedUrl, expiry_after};
