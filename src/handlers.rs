use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use axum::{
    Json,
    body::Body,
    extract::{self, Query, State, rejection::QueryRejection},
    http::{
        HeaderMap, HeaderName, HeaderValue,
        header::{AsHeaderName, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HOST},
    },
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::{
    config::{Config, non_empty},
    error::ApiError,
    platform::Platform,
    sanitize::{build_content_disposition, content_type_for_filename, sanitize_ascii_filename},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    status: &'static str,
    platform: Platform,
    title: String,
    file: String,
    download_url: String,
    credit: String,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        warn!("rejected download query: {}", rejection.body_text());
        ApiError::invalid_url("Invalid query string: pass a single url parameter")
    })?;

    let url = query
        .url
        .as_deref()
        .and_then(non_empty)
        .ok_or_else(|| ApiError::missing_parameter("No URL provided"))?;

    let stored = state.downloader.download(url).await?;
    let code = state.links.register(stored.filename.clone()).await;
    let download_url = format!("{}/d/{code}", request_base_url(&state.config, &headers));

    info!(
        "stored {} download {:?} as {:?} behind /d/{code}",
        stored.platform, stored.title, stored.filename
    );

    Ok(Json(DownloadResponse {
        status: "success",
        platform: stored.platform,
        title: stored.title,
        file: stored.filename,
        download_url,
        credit: state.config.credit.clone(),
    }))
}

pub async fn serve_short_link(
    State(state): State<AppState>,
    extract::Path(code): extract::Path<String>,
) -> Result<Response, ApiError> {
    let filename = state
        .links
        .resolve(&code)
        .await
        .ok_or_else(|| ApiError::not_found("Invalid or expired link"))?;

    serve_stored_file(state.downloader.download_dir(), &filename).await
}

pub async fn serve_downloaded_file(
    State(state): State<AppState>,
    extract::Path(filename): extract::Path<String>,
) -> Result<Response, ApiError> {
    if !is_plain_filename(&filename) {
        warn!("rejected stored file request for {:?}", filename);
        return Err(ApiError::not_found("File not found"));
    }

    serve_stored_file(state.downloader.download_dir(), &filename).await
}

async fn serve_stored_file(download_dir: &Path, filename: &str) -> Result<Response, ApiError> {
    let path = resolve_stored_file(download_dir, filename)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|error| ApiError::internal(format!("Could not read file metadata: {error}")))?;
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|error| ApiError::internal(format!("Could not open stored file: {error}")))?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(content_type_for_filename(filename)),
    );
    headers.insert(
        CONTENT_LENGTH,
        HeaderValue::from_str(&metadata.len().to_string())
            .map_err(|_| ApiError::internal("Could not build the download size header."))?,
    );
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&build_content_disposition(filename))
            .map_err(|_| ApiError::internal("Could not build the download header."))?,
    );
    headers.insert(
        HeaderName::from_static("x-download-filename"),
        HeaderValue::from_str(&sanitize_ascii_filename(filename))
            .map_err(|_| ApiError::internal("Could not build the filename header."))?,
    );

    Ok((headers, body).into_response())
}

/// Returns the canonical path of `filename` inside `download_dir`, or `None`
/// when it is missing, not a regular file, or escapes the directory.
async fn resolve_stored_file(
    download_dir: &Path,
    filename: &str,
) -> Result<Option<PathBuf>, ApiError> {
    let candidate = download_dir.join(filename);
    let metadata = match tokio::fs::metadata(&candidate).await {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(ApiError::internal(format!(
                "Could not read stored file: {error}"
            )));
        }
    };

    if !metadata.is_file() {
        return Ok(None);
    }

    let canonical_dir = tokio::fs::canonicalize(download_dir).await.map_err(|error| {
        ApiError::internal(format!("Could not resolve the downloads directory: {error}"))
    })?;
    let canonical_candidate = tokio::fs::canonicalize(&candidate).await.map_err(|error| {
        ApiError::internal(format!("Could not resolve stored file: {error}"))
    })?;

    if !canonical_candidate.starts_with(&canonical_dir) {
        warn!(
            "blocked a file outside the downloads directory: {:?}",
            canonical_candidate
        );
        return Ok(None);
    }

    Ok(Some(canonical_candidate))
}

fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.contains(['/', '\\', '\0'])
}

fn header_value<'a>(headers: &'a HeaderMap, name: impl AsHeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(non_empty)
}

/// Base URL for links handed back to the caller: the configured public URL,
/// or whatever host the request came in on.
fn request_base_url(config: &Config, headers: &HeaderMap) -> String {
    if let Some(base) = &config.public_base_url {
        return base.clone();
    }

    let host = header_value(headers, HOST).unwrap_or("localhost");
    let scheme = if config.trust_proxy_headers {
        header_value(headers, "x-forwarded-proto")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| matches!(*value, "http" | "https"))
            .unwrap_or("http")
    } else {
        "http"
    };

    format!("{scheme}://{host}")
}
