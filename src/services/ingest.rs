//! Ingestion orchestrator.
//!
//! Sequences the pipeline: decompose the archive, upload the archive and
//! every extracted font concurrently to the two storage targets, then match
//! extracted families against the catalog. Upload failures are fail-fast:
//! the first failed write aborts the remaining tasks and every object
//! already written during the attempt is deleted best-effort, so a failed
//! ingestion leaves no orphaned storage objects behind.

use crate::models::bundle::{FontPreviewRecord, IngestionResult};
use crate::services::archive::{self, ArchiveError};
use crate::services::catalog::CatalogService;
use crate::services::storage::{LocalBucket, StorageError};
use bytes::Bytes;
use chrono::Utc;
use std::io;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Typed failure of an ingestion call, one variant per pipeline stage that
/// can fail. Matching never fails the pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("bad archive: {0}")]
    InvalidArchive(#[source] zip::result::ZipError),
    #[error("no usable fonts: the archive contains no .otf files")]
    NoFontsFound,
    #[error("upload error: `{entry}`: {source}")]
    UploadFailure {
        entry: String,
        #[source]
        source: StorageError,
    },
}

impl From<ArchiveError> for IngestError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::InvalidArchive(inner) => IngestError::InvalidArchive(inner),
            ArchiveError::NoFontsFound => IngestError::NoFontsFound,
        }
    }
}

/// Progress callback: `(settled_tasks, total_tasks)`, invoked after each
/// upload task settles. Purely advisory.
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

enum UploadOutcome {
    Archive { key: String },
    Preview { key: String, record: FontPreviewRecord },
}

/// Runs the ingestion pipeline against the two buckets and the catalog.
#[derive(Clone)]
pub struct Ingestor {
    downloads: LocalBucket,
    previews: LocalBucket,
    catalog: CatalogService,
    preview_base_url: String,
}

impl Ingestor {
    pub fn new(
        downloads: LocalBucket,
        previews: LocalBucket,
        catalog: CatalogService,
        preview_base_url: impl Into<String>,
    ) -> Self {
        Self {
            downloads,
            previews,
            catalog,
            preview_base_url: preview_base_url.into(),
        }
    }

    /// Ingest one uploaded archive.
    ///
    /// Decomposition happens strictly before any upload is scheduled, so a
    /// rejected archive means zero storage writes. No automatic retries:
    /// callers re-invoke with the original bytes after a failure.
    pub async fn ingest(
        &self,
        archive_bytes: Bytes,
        slug: &str,
        progress: Option<&ProgressFn>,
    ) -> Result<IngestionResult, IngestError> {
        // --- Decomposing ---
        let decomposed = archive::decompose(&archive_bytes)?;
        debug!(
            "ingesting `{}`: {} fonts out of {} archive entries",
            slug,
            decomposed.fonts.len(),
            decomposed.entries.len()
        );

        // --- Uploading ---
        // The whole archive and every font preview are independent tasks;
        // the archive key carries a millisecond timestamp so re-uploads never
        // overwrite an archive a customer may be downloading, while preview
        // keys are slug-scoped upserts.
        let archive_key = format!(
            "protected/bundles/{}-{}.zip",
            slug,
            Utc::now().timestamp_millis()
        );

        let total = decomposed.fonts.len() + 1;
        let mut tasks: JoinSet<Result<UploadOutcome, (String, StorageError)>> = JoinSet::new();

        {
            let bucket = self.downloads.clone();
            let key = archive_key.clone();
            let bytes = archive_bytes.clone();
            tasks.spawn(async move {
                match bucket.put_bytes(&key, bytes).await {
                    Ok(stored) => Ok(UploadOutcome::Archive { key: stored.key }),
                    Err(err) => Err((key, err)),
                }
            });
        }
        for font in &decomposed.fonts {
            let bucket = self.previews.clone();
            let key = format!("{}/previews/{}", slug, font.file_name);
            let record = FontPreviewRecord {
                name: font.file_name.clone(),
                style: font.style.clone(),
                url: format!(
                    "{}/{}",
                    self.preview_base_url.trim_end_matches('/'),
                    key
                ),
            };
            let bytes = font.raw_bytes.clone();
            tasks.spawn(async move {
                match bucket.put_bytes(&key, bytes).await {
                    Ok(_) => Ok(UploadOutcome::Preview { key, record }),
                    Err(err) => Err((key, err)),
                }
            });
        }

        let mut written: Vec<(LocalBucket, String)> = Vec::new();
        let mut archive_url = None;
        let mut previews = Vec::new();
        let mut settled = 0usize;
        let mut failure: Option<(String, StorageError)> = None;

        while let Some(joined) = tasks.join_next().await {
            settled += 1;
            if let Some(report) = progress {
                report(settled, total);
            }
            match joined {
                Ok(Ok(UploadOutcome::Archive { key })) => {
                    written.push((self.downloads.clone(), key.clone()));
                    archive_url = Some(key);
                }
                Ok(Ok(UploadOutcome::Preview { key, record })) => {
                    written.push((self.previews.clone(), key));
                    previews.push(record);
                }
                Ok(Err((entry, err))) => {
                    failure = Some((entry, err));
                    break;
                }
                Err(join_err) => {
                    failure = Some((
                        "upload task".to_string(),
                        StorageError::Io(io::Error::other(join_err)),
                    ));
                    break;
                }
            }
        }

        if let Some((entry, source)) = failure {
            tasks.abort_all();
            // Drain so writes that raced the abort are cleaned up too.
            while let Some(joined) = tasks.join_next().await {
                if let Ok(Ok(outcome)) = joined {
                    written.push(match outcome {
                        UploadOutcome::Archive { key } => (self.downloads.clone(), key),
                        UploadOutcome::Preview { key, .. } => (self.previews.clone(), key),
                    });
                }
            }
            self.cleanup(&written).await;
            return Err(IngestError::UploadFailure { entry, source });
        }

        let Some(downloadable_file_url) = archive_url else {
            // Cannot happen once every task succeeded; treated as an upload
            // failure of the archive itself.
            self.cleanup(&written).await;
            return Err(IngestError::UploadFailure {
                entry: archive_key,
                source: StorageError::Io(io::Error::other("archive upload produced no key")),
            });
        };

        // Completion order of the upload tasks is arbitrary; sort by file
        // name so the stored preview list has a stable display order.
        previews.sort_by(|a, b| a.name.cmp(&b.name));

        // --- Matching ---
        let file_names: Vec<String> = previews.iter().map(|p| p.name.clone()).collect();
        let matched_font_ids = match self.catalog.match_existing(&file_names).await {
            Ok(stubs) => stubs.into_iter().map(|font| font.id).collect(),
            Err(err) => {
                warn!("catalog matching failed, continuing without matches: {}", err);
                Vec::new()
            }
        };

        Ok(IngestionResult {
            downloadable_file_url,
            bundle_font_previews: previews,
            matched_font_ids,
        })
    }

    /// Best-effort removal of everything a failed attempt managed to write.
    async fn cleanup(&self, written: &[(LocalBucket, String)]) {
        for (bucket, key) in written {
            if let Err(err) = bucket.delete(key).await {
                warn!("failed to remove `{}` during ingestion cleanup: {}", key, err);
            }
        }
    }
}
