//! Service layer: the ingestion pipeline and its collaborators.

pub mod archive;
pub mod catalog;
pub mod ingest;
pub mod storage;
pub mod style;
