//! Read-only catalog lookups used to pre-link a bundle to existing fonts.

use crate::models::font::CatalogFont;
use crate::services::style::base_family_name;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Matches extracted font file names against the product catalog.
///
/// Matching is advisory: callers treat a lookup failure as zero matches
/// rather than failing the ingestion.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<SqlitePool>,
}

impl CatalogService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Find catalog fonts whose name exactly matches the base family name of
    /// any of the given font file names.
    ///
    /// De-duplicates family names first, then runs one batched `IN` lookup.
    /// Short-circuits without touching the database when no candidate names
    /// remain. Exact, case-sensitive string match; order-independent.
    pub async fn match_existing(
        &self,
        file_names: &[String],
    ) -> Result<Vec<CatalogFont>, sqlx::Error> {
        let names: BTreeSet<String> = file_names
            .iter()
            .map(|name| base_family_name(name))
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT id, name FROM fonts WHERE name IN (");
        {
            let mut separated = builder.separated(", ");
            for name in &names {
                separated.push_bind(name.clone());
            }
        }
        builder.push(")");

        let matches: Vec<CatalogFont> = builder.build_query_as().fetch_all(&*self.db).await?;
        debug!(
            "catalog matching: {} candidate families, {} matches",
            names.len(),
            matches.len()
        );
        Ok(matches)
    }
}
