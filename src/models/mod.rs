//! Core data models for the bundle ingestion service.
//!
//! Transient archive types live only for the duration of a single ingestion
//! call. Bundle and font records map to database tables via `sqlx::FromRow`
//! and serialize naturally as JSON via `serde`.

pub mod archive;
pub mod bundle;
pub mod font;
