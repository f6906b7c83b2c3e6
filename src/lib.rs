//! Font bundle ingestion service.
//!
//! Takes an uploaded ZIP archive of fonts, decomposes it into per-font
//! preview files, infers each font's style from its file name, uploads the
//! archive and the previews to two storage targets, and matches extracted
//! font families against the existing catalog.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
