//! Backup download, verification and status endpoints.

use super::{ApiError, AppState};
use crate::cleanup;
use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::Response;
use bookvault_core::archive::{self, BackupArchive};
use bookvault_core::checksum::file_checksum;
use bookvault_core::names::secure_filename;
use bookvault_core::{BackupStatus, ByteRange, VaultError};
use serde::Deserialize;
use serde_json::{Value, json};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

const X_CHECKSUM: HeaderName = HeaderName::from_static("x-checksum");
const X_TOTAL_SIZE: HeaderName = HeaderName::from_static("x-total-size");

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    chunk_size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    checksum: Option<String>,
    filename: Option<String>,
}

/// GET /backup
///
/// Zips every database, then streams the archive (or the requested byte
/// range of it) in `chunk_size` pieces. The archive stays on disk for the
/// configured retention period so interrupted downloads can resume.
pub async fn download_handler(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let config = state.config.clone();

    // create_backup checks that every database exists before writing.
    let set = config.databases.clone();
    let dir = config.backups_dir.clone();
    let now = chrono::Local::now().naive_local();
    let backup = tokio::task::spawn_blocking(move || archive::create_backup(&set, &dir, now))
        .await
        .map_err(|e| ApiError::internal(format!("Backup failed: {e}")))?
        .map_err(|e| match e {
            VaultError::DatabaseMissing(path) => {
                let shown = config.databases.display_path(&path);
                ApiError::not_found(format!("Database file {shown} not found"))
            }
            other => ApiError::internal(format!("Backup failed: {other}")),
        })?;

    info!(
        file = %backup.file_name,
        size = backup.size,
        checksum = %backup.checksum,
        "Created backup archive"
    );
    cleanup::remove_file_after(backup.path.clone(), config.backup_retention);

    let chunk_size = query
        .chunk_size
        .as_deref()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(config.default_chunk_size)
        .max(1);

    let range_header = match headers.get(header::RANGE) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ApiError::bad_request("Invalid range header"))?
                .to_string(),
        ),
        None => None,
    };
    let range = match &range_header {
        Some(value) => ByteRange::parse(value, backup.size).map_err(|e| match e {
            VaultError::RangeNotSatisfiable => {
                ApiError::new(StatusCode::RANGE_NOT_SATISFIABLE, "Range not satisfiable")
            }
            _ => ApiError::bad_request("Invalid range header"),
        })?,
        None => ByteRange::full(backup.size),
    };

    debug!(
        start = range.start,
        end = range.end,
        chunk_size,
        "Streaming backup archive"
    );
    stream_archive(&backup, range, chunk_size, range_header.is_some())
        .await
        .map_err(|e| ApiError::internal(format!("Backup failed: {e}")))
}

async fn stream_archive(
    backup: &BackupArchive,
    range: ByteRange,
    chunk_size: usize,
    partial: bool,
) -> Result<Response, Box<dyn std::error::Error + Send + Sync>> {
    let mut file = File::open(&backup.path).await?;
    file.seek(SeekFrom::Start(range.start)).await?;
    let length = range.content_length();

    let mut builder = Response::builder()
        .status(if partial {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        })
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", backup.file_name),
        )
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONTENT_LENGTH, length)
        .header(X_CHECKSUM, HeaderValue::from_str(backup.checksum.as_str())?)
        .header(X_TOTAL_SIZE, backup.size);
    if partial {
        builder = builder.header(header::CONTENT_RANGE, range.content_range(backup.size));
    }

    Ok(builder.body(chunked_body(file, length, chunk_size))?)
}

/// Body that yields at most `length` bytes of `file`, `chunk_size` at a time.
fn chunked_body(file: File, length: u64, chunk_size: usize) -> Body {
    let stream = futures::stream::try_unfold((file, length), move |(mut file, remaining)| async move {
        if remaining == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        let want = remaining.min(chunk_size as u64) as usize;
        let mut buf = vec![0u8; want];
        let read = file.read(&mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        buf.truncate(read);
        Ok(Some((Bytes::from(buf), (file, remaining - read as u64))))
    });
    Body::from_stream(stream)
}

/// GET /backup/verify?checksum=&filename=
pub async fn verify_handler(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<Value>, ApiError> {
    let (Some(checksum), Some(filename)) = (
        query.checksum.filter(|c| !c.is_empty()),
        query.filename.filter(|f| !f.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Missing checksum or filename"));
    };

    let name = secure_filename(&filename);
    let path = state.config.backups_dir.join(&name);
    if name.is_empty() || !path.is_file() {
        return Err(ApiError::not_found("Backup file not found"));
    }

    let calculated = tokio::task::spawn_blocking(move || file_checksum(&path))
        .await
        .map_err(|e| ApiError::internal(format!("Verification failed: {e}")))?
        .map_err(|e| ApiError::internal(format!("Verification failed: {e}")))?;

    if calculated.matches(&checksum) {
        Ok(Json(json!({ "verified": true })))
    } else {
        warn!(file = %name, "Backup checksum mismatch");
        Ok(Json(json!({
            "verified": false,
            "expected": calculated.as_str(),
            "received": checksum,
        })))
    }
}

/// GET /backup/status
pub async fn status_handler(State(state): State<AppState>) -> Json<BackupStatus> {
    Json(state.config.databases.status())
}
