//! Shared application state handed to every handler.

use crate::services::catalog::CatalogService;
use crate::services::ingest::Ingestor;
use crate::services::storage::LocalBucket;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Catalog database pool (fonts, bundles, relationships).
    pub db: Arc<SqlitePool>,

    /// Access-controlled bucket holding whole bundle archives.
    pub downloads: LocalBucket,

    /// Public bucket holding per-font preview files.
    pub previews: LocalBucket,

    /// The ingestion pipeline.
    pub ingestor: Ingestor,
}

impl AppState {
    pub fn new(
        db: Arc<SqlitePool>,
        downloads: LocalBucket,
        previews: LocalBucket,
        preview_base_url: impl Into<String>,
    ) -> Self {
        let catalog = CatalogService::new(db.clone());
        let ingestor = Ingestor::new(
            downloads.clone(),
            previews.clone(),
            catalog,
            preview_base_url,
        );
        Self {
            db,
            downloads,
            previews,
            ingestor,
        }
    }
}
