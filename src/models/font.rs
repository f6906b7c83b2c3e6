//! Read-only view of the product catalog used for bundle matching.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An `{id, name}` stub of an existing catalog font.
///
/// Owned by the catalog subsystem; the ingestion pipeline only reads these
/// to pre-link a bundle to fonts it already sells.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct CatalogFont {
    pub id: Uuid,

    /// Family name as it appears in the catalog (e.g. "Aurora").
    pub name: String,
}
