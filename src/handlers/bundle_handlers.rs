//! HTTP handlers for bundle ingestion and retrieval.
//! Parses the multipart upload, drives the ingestion pipeline, and persists
//! its output in one transaction once the pipeline reaches Complete.

use crate::{
    errors::AppError,
    models::bundle::{Bundle, FontPreviewRecord, IngestionResult},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::services::style::slugify;

/// Response body of a successful ingestion.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub slug: String,
    #[serde(flatten)]
    pub result: IngestionResult,
}

/// Full bundle record as stored in the catalog.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleResponse {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub downloadable_file_url: String,
    pub bundle_font_previews: Vec<FontPreviewRecord>,
    pub matched_font_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// POST `/bundles` — ingest an uploaded font bundle.
///
/// Multipart fields: `name` (human-entered product name, slugified here)
/// and `archive` (the ZIP). Nothing is written to the database unless the
/// whole pipeline succeeds; storage writes of a failed attempt are cleaned
/// up by the orchestrator.
pub async fn ingest_bundle(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut product_name: Option<String> = None;
    let mut archive_bytes: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("malformed multipart body: {}", err)))?
    {
        match field.name() {
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(format!("reading `name`: {}", err)))?;
                product_name = Some(text);
            }
            Some("archive") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::bad_request(format!("reading `archive`: {}", err)))?;
                archive_bytes = Some(bytes);
            }
            _ => {}
        }
    }

    let name = product_name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("missing `name` field"))?;
    let archive = archive_bytes
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::bad_request("missing `archive` file"))?;

    let slug = slugify(&name);
    if slug.is_empty() {
        return Err(AppError::bad_request(
            "product name contains no usable characters",
        ));
    }

    let progress_slug = slug.clone();
    let progress = move |settled: usize, total: usize| {
        tracing::debug!(
            "upload progress for `{}`: {}/{} ({}%)",
            progress_slug,
            settled,
            total,
            settled * 100 / total
        );
    };
    let result = state.ingestor.ingest(archive, &slug, Some(&progress)).await?;

    // Persist bundle + relationship rows as a single logical update. The
    // preview list is replaced wholesale on re-upload.
    let previews_json = serde_json::to_string(&result.bundle_font_previews)?;
    let mut tx = state.db.begin().await?;
    let bundle_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO bundles (id, slug, name, downloadable_file_url, bundle_font_previews, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(slug) DO UPDATE SET
            name = excluded.name,
            downloadable_file_url = excluded.downloadable_file_url,
            bundle_font_previews = excluded.bundle_font_previews
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&slug)
    .bind(&name)
    .bind(&result.downloadable_file_url)
    .bind(&previews_json)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM bundle_fonts WHERE bundle_id = ?")
        .bind(bundle_id)
        .execute(&mut *tx)
        .await?;
    for font_id in &result.matched_font_ids {
        sqlx::query("INSERT INTO bundle_fonts (bundle_id, font_id) VALUES (?, ?)")
            .bind(bundle_id)
            .bind(font_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    tracing::info!(
        "ingested bundle `{}`: {} previews, {} catalog matches",
        slug,
        result.bundle_font_previews.len(),
        result.matched_font_ids.len()
    );

    Ok((StatusCode::CREATED, Json(IngestResponse { slug, result })))
}

/// GET `/bundles/{slug}` — fetch one bundle record as JSON.
pub async fn get_bundle(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<BundleResponse>, AppError> {
    let bundle = fetch_bundle(&state, &slug).await?;
    let previews: Vec<FontPreviewRecord> = serde_json::from_str(&bundle.bundle_font_previews)?;
    let matched_font_ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT font_id FROM bundle_fonts WHERE bundle_id = ?")
            .bind(bundle.id)
            .fetch_all(&*state.db)
            .await?;

    Ok(Json(BundleResponse {
        id: bundle.id,
        slug: bundle.slug,
        name: bundle.name,
        downloadable_file_url: bundle.downloadable_file_url,
        bundle_font_previews: previews,
        matched_font_ids,
        created_at: bundle.created_at,
    }))
}

/// GET `/bundles/{slug}/archive` — stream the stored archive.
///
/// Stands in for the signed-URL resolver a storefront would put in front of
/// the downloads bucket.
pub async fn download_archive(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let bundle = fetch_bundle(&state, &slug).await?;
    let (file, size) = state
        .downloads
        .open_reader(&bundle.downloadable_file_url)
        .await?;

    let file_name = bundle
        .downloadable_file_url
        .rsplit('/')
        .next()
        .unwrap_or("bundle.zip")
        .to_string();

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/zip"),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&size.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// GET `/previews/{*key}` — stream a public preview font.
pub async fn get_preview(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (file, size) = state.previews.open_reader(&key).await?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("font/otf"));
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&size.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    Ok(response)
}

async fn fetch_bundle(state: &AppState, slug: &str) -> Result<Bundle, AppError> {
    let bundle = sqlx::query_as::<_, Bundle>(
        "SELECT id, slug, name, downloadable_file_url, bundle_font_previews, created_at
         FROM bundles WHERE slug = ?",
    )
    .bind(slug)
    .fetch_one(&*state.db)
    .await
    .map_err(|err| match err {
        sqlx::Error::RowNotFound => AppError::not_found(format!("bundle `{}` not found", slug)),
        other => AppError::from(other),
    })?;
    Ok(bundle)
}
