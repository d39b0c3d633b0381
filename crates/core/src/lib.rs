//! Core file orchestration logic for Blink.
//!
//! This crate contains the logic that keeps object storage and metadata
//! storage consistent, with ZERO web or database dependencies.
//!
//! # Modules
//!
//! - `storage` - Object store adapter (OpenDAL) and bucket bootstrap
//! - `file` - Upload, download, metadata, delete and share-link orchestration

pub mod file;
pub mod storage;
