//! Defines routes for bundle ingestion and retrieval.
//!
//! ## Structure
//! - **Ingestion**
//!   - `POST /bundles` — multipart upload (`name` + `archive` ZIP)
//!
//! - **Read surface**
//!   - `GET /bundles/{slug}` — bundle record as JSON
//!   - `GET /bundles/{slug}/archive` — stream the stored archive
//!   - `GET /previews/{*key}` — stream a public preview font
//!
//! The wildcard `*key` mirrors the previews-bucket key layout
//! (`{slug}/previews/{file}`), so stored preview URLs resolve directly.

use crate::{
    handlers::{
        bundle_handlers::{download_archive, get_bundle, get_preview, ingest_bundle},
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Bundle archives run large; far beyond axum's 2 MB default.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Build and return the router for all ingestion routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // ingestion + read surface
        .route("/bundles", post(ingest_bundle))
        .route("/bundles/{slug}", get(get_bundle))
        .route("/bundles/{slug}/archive", get(download_archive))
        .route("/previews/{*key}", get(get_preview))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
