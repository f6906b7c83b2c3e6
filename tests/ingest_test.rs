//! End-to-end tests for the ingestion pipeline: decomposition, dual-target
//! upload, catalog matching, and failure cleanup — against real temp
//! directories and an in-memory SQLite catalog.

use bundle_ingest::db;
use bundle_ingest::services::catalog::CatalogService;
use bundle_ingest::services::ingest::{IngestError, Ingestor};
use bundle_ingest::services::storage::LocalBucket;
use bytes::Bytes;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

const PREVIEW_BASE: &str = "http://previews.test";

struct TestEnv {
    downloads_dir: TempDir,
    previews_dir: TempDir,
    db: Arc<SqlitePool>,
    ingestor: Ingestor,
}

async fn test_env() -> TestEnv {
    // A single connection so every handle sees the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    let db = Arc::new(pool);

    let downloads_dir = TempDir::new().unwrap();
    let previews_dir = TempDir::new().unwrap();
    let downloads = LocalBucket::new(downloads_dir.path());
    let previews = LocalBucket::new(previews_dir.path());
    let ingestor = Ingestor::new(
        downloads,
        previews,
        CatalogService::new(db.clone()),
        PREVIEW_BASE,
    );

    TestEnv {
        downloads_dir,
        previews_dir,
        db,
        ingestor,
    }
}

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer
}

async fn seed_font(db: &SqlitePool, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO fonts (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(db)
        .await
        .unwrap();
    id
}

/// Every regular file below `root`, relative paths sorted.
fn files_under(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, root, out);
                } else {
                    out.push(
                        path.strip_prefix(root)
                            .unwrap()
                            .to_string_lossy()
                            .replace('\\', "/"),
                    );
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

#[tokio::test]
async fn aurora_bundle_end_to_end() {
    let env = test_env().await;
    let aurora_id = seed_font(&env.db, "Aurora").await;
    seed_font(&env.db, "Borealis").await;

    let archive = build_zip(&[
        ("Aurora-Regular.otf", b"regular-bytes"),
        ("Aurora-Bold.otf", b"bold-bytes"),
        ("readme.txt", b"thanks for buying"),
    ]);

    let result = env
        .ingestor
        .ingest(Bytes::from(archive.clone()), "aurora", None)
        .await
        .unwrap();

    // Previews: one record per .otf, sorted by file name, public URLs.
    assert_eq!(result.bundle_font_previews.len(), 2);
    let bold = &result.bundle_font_previews[0];
    let regular = &result.bundle_font_previews[1];
    assert_eq!(bold.name, "Aurora-Bold.otf");
    assert_eq!(bold.style, "Bold");
    assert_eq!(
        bold.url,
        format!("{}/aurora/previews/Aurora-Bold.otf", PREVIEW_BASE)
    );
    assert_eq!(regular.name, "Aurora-Regular.otf");
    assert_eq!(regular.style, "Regular");
    for record in &result.bundle_font_previews {
        assert!(record.url.starts_with(PREVIEW_BASE));
    }

    // The archive landed under a timestamped protected key, byte-identical
    // to the upload (readme.txt included).
    assert!(result
        .downloadable_file_url
        .starts_with("protected/bundles/aurora-"));
    assert!(result.downloadable_file_url.ends_with(".zip"));
    let stored_archive = std::fs::read(
        env.downloads_dir
            .path()
            .join(&result.downloadable_file_url),
    )
    .unwrap();
    assert_eq!(stored_archive, archive);

    // Preview files exist; the readme never left the archive.
    let preview_files = files_under(env.previews_dir.path());
    assert_eq!(
        preview_files,
        [
            "aurora/previews/Aurora-Bold.otf",
            "aurora/previews/Aurora-Regular.otf"
        ]
    );

    // Only the matching family is linked.
    assert_eq!(result.matched_font_ids, [aurora_id]);
}

#[tokio::test]
async fn archive_without_fonts_fails_before_any_write() {
    let env = test_env().await;
    let archive = build_zip(&[("image.png", b"png"), ("readme.txt", b"hi")]);

    let err = env
        .ingestor
        .ingest(Bytes::from(archive), "no-fonts", None)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::NoFontsFound));

    // Decomposition precedes upload scheduling: nothing hit either bucket.
    assert!(files_under(env.downloads_dir.path()).is_empty());
    assert!(files_under(env.previews_dir.path()).is_empty());
}

#[tokio::test]
async fn garbage_bytes_fail_as_invalid_archive() {
    let env = test_env().await;
    let err = env
        .ingestor
        .ingest(Bytes::from_static(b"not a zip at all"), "junk", None)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::InvalidArchive(_)));
    assert!(files_under(env.downloads_dir.path()).is_empty());
}

#[tokio::test]
async fn upload_failure_removes_objects_written_before_it() {
    let env = test_env().await;

    // A file where the slug directory must go makes every preview write
    // fail while the archive write can still succeed.
    std::fs::write(env.previews_dir.path().join("blocked"), b"in the way").unwrap();

    let archive = build_zip(&[("Aurora-Bold.otf", b"font")]);
    let err = env
        .ingestor
        .ingest(Bytes::from(archive), "blocked", None)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::UploadFailure { .. }));

    // The archive that may have landed first was cleaned up again.
    assert!(files_under(env.downloads_dir.path()).is_empty());
}

#[tokio::test]
async fn progress_reports_every_settled_task() {
    let env = test_env().await;
    let archive = build_zip(&[
        ("Aurora-Regular.otf", b"a"),
        ("Aurora-Bold.otf", b"b"),
    ]);

    let seen: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress = move |settled: usize, total: usize| {
        sink.lock().unwrap().push((settled, total));
    };

    env.ingestor
        .ingest(Bytes::from(archive), "aurora", Some(&progress))
        .await
        .unwrap();

    // Two fonts plus the archive itself: three tasks, reported in order.
    let seen = seen.lock().unwrap();
    assert_eq!(seen.as_slice(), [(1, 3), (2, 3), (3, 3)]);
}

#[tokio::test]
async fn reingesting_a_slug_replaces_its_previews() {
    let env = test_env().await;

    let first = build_zip(&[("Aurora-Bold.otf", b"v1")]);
    env.ingestor
        .ingest(Bytes::from(first), "aurora", None)
        .await
        .unwrap();

    let second = build_zip(&[("Aurora-Bold.otf", b"v2"), ("Aurora-Thin.otf", b"thin")]);
    let result = env
        .ingestor
        .ingest(Bytes::from(second), "aurora", None)
        .await
        .unwrap();

    let names: Vec<&str> = result
        .bundle_font_previews
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, ["Aurora-Bold.otf", "Aurora-Thin.otf"]);

    // Preview keys upsert in place; both archive uploads are kept because
    // their keys carry distinct timestamps.
    let stored = std::fs::read(
        env.previews_dir
            .path()
            .join("aurora/previews/Aurora-Bold.otf"),
    )
    .unwrap();
    assert_eq!(stored, b"v2");
}

#[tokio::test]
async fn matching_short_circuits_on_empty_input() {
    // No migrations on purpose: a real query would fail with "no such
    // table", so an Ok result proves the lookup never ran.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let catalog = CatalogService::new(Arc::new(pool));

    let matches = catalog.match_existing(&[]).await.unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn matching_is_order_independent() {
    let env = test_env().await;
    let a = seed_font(&env.db, "A").await;
    let b = seed_font(&env.db, "B").await;
    let catalog = CatalogService::new(env.db.clone());

    let forward = ["A-Bold.otf".to_string(), "B-Regular.otf".to_string()];
    let backward = ["B-Regular.otf".to_string(), "A-Bold.otf".to_string()];

    for input in [&forward[..], &backward[..]] {
        let mut ids: Vec<Uuid> = catalog
            .match_existing(input)
            .await
            .unwrap()
            .into_iter()
            .map(|font| font.id)
            .collect();
        ids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(ids, expected);
    }
}

#[tokio::test]
async fn matching_deduplicates_families() {
    let env = test_env().await;
    let aurora = seed_font(&env.db, "Aurora").await;
    let catalog = CatalogService::new(env.db.clone());

    let input = [
        "Aurora-Thin.otf".to_string(),
        "Aurora-Bold.otf".to_string(),
        "Aurora-Black.otf".to_string(),
    ];
    let matches = catalog.match_existing(&input).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, aurora);
    assert_eq!(matches[0].name, "Aurora");
}
