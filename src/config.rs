use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub downloads_dir: String,
    pub previews_dir: String,
    pub database_url: String,
    pub preview_base_url: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Font bundle ingestion API")]
pub struct Args {
    /// Host to bind to (overrides BUNDLE_INGEST_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BUNDLE_INGEST_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory backing the access-controlled downloads bucket
    /// (overrides BUNDLE_INGEST_DOWNLOADS_DIR)
    #[arg(long)]
    pub downloads_dir: Option<String>,

    /// Directory backing the public previews bucket
    /// (overrides BUNDLE_INGEST_PREVIEWS_DIR)
    #[arg(long)]
    pub previews_dir: Option<String>,

    /// Database URL (overrides BUNDLE_INGEST_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public base URL preview keys are served under
    /// (overrides BUNDLE_INGEST_PREVIEW_BASE_URL)
    #[arg(long)]
    pub preview_base_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("BUNDLE_INGEST_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("BUNDLE_INGEST_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing BUNDLE_INGEST_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading BUNDLE_INGEST_PORT"),
        };
        let env_downloads =
            env::var("BUNDLE_INGEST_DOWNLOADS_DIR").unwrap_or_else(|_| "./data/downloads".into());
        let env_previews =
            env::var("BUNDLE_INGEST_PREVIEWS_DIR").unwrap_or_else(|_| "./data/previews".into());
        let env_db = env::var("BUNDLE_INGEST_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/catalog.db".into());
        let env_preview_base = env::var("BUNDLE_INGEST_PREVIEW_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}/previews", env_port));

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            downloads_dir: args.downloads_dir.unwrap_or(env_downloads),
            previews_dir: args.previews_dir.unwrap_or(env_previews),
            database_url: args.database_url.unwrap_or(env_db),
            preview_base_url: args.preview_base_url.unwrap_or(env_preview_base),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
