//! Bundle records and the aggregate returned by a successful ingestion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Persisted output of uploading one extracted font.
///
/// One record per successfully uploaded font. Never mutated individually —
/// a bundle's whole preview list is replaced on re-upload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FontPreviewRecord {
    /// Original font file name inside the archive.
    pub name: String,

    /// Inferred style label (e.g. "Bold", "SemiBold", "Regular").
    pub style: String,

    /// Public URL of the preview file in the previews bucket.
    pub url: String,
}

/// Aggregate handed back to the caller once the pipeline reaches Complete.
///
/// `font_previews` is non-empty by construction: archives with zero usable
/// fonts fail the ingestion before any upload is scheduled.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct IngestionResult {
    /// Storage-relative path of the uploaded archive in the downloads bucket.
    /// Resolved to a signed URL at download time, not a public address.
    pub downloadable_file_url: String,

    /// Preview records sorted by file name for stable display order.
    pub bundle_font_previews: Vec<FontPreviewRecord>,

    /// Ids of existing catalog fonts whose family name matches an extracted
    /// font. Advisory: empty when nothing matches or matching failed.
    pub matched_font_ids: Vec<Uuid>,
}

/// A bundle row in the catalog database.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Bundle {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// URL-safe identifier derived from the product name. Unique.
    pub slug: String,

    /// Human-entered product name.
    pub name: String,

    /// Downloads-bucket key of the stored archive.
    pub downloadable_file_url: String,

    /// JSON-encoded list of `FontPreviewRecord`s.
    pub bundle_font_previews: String,

    /// When this bundle was first ingested.
    pub created_at: DateTime<Utc>,
}
