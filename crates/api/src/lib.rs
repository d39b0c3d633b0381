//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST routes for file upload, download, metadata, delete and share links
//! - Mapping of application errors to HTTP responses

pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use blink_core::file::FileService;
use blink_core::storage::StorageService;
use blink_db::FileMetadataRepository;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// File service wired to the production object store and metadata store.
pub type Files = FileService<StorageService, FileMetadataRepository>;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// File orchestrator.
    pub files: Arc<Files>,
    /// Lifetime of issued share links.
    pub share_link_ttl: Duration,
    /// Largest accepted upload in bytes.
    pub max_file_size: u64,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .merge(routes::health::routes())
        .nest("/api/files", routes::files::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
