//! Restore upload and operation status endpoints.

use super::{ApiError, AppState};
use crate::cleanup;
use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use bookvault_core::archive::stamp;
use bookvault_core::names::secure_filename;
use bookvault_core::upload::{self, assemble_chunks, chunk_path, single_upload_path};
use bookvault_core::{Operation, VaultError, restore};
use serde_json::{Value, json};
use std::path::PathBuf;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// The file part of a restore request, staged on disk under the uploads
/// root. The staged file is removed when this is dropped unless it was
/// placed into a session first.
struct UploadedFile {
    file_name: String,
    staged: TempPath,
}

/// Fields of a restore request. Any of them may be absent.
#[derive(Default)]
struct RestoreForm {
    chunk: Option<String>,
    upload_id: Option<String>,
    total_chunks: Option<String>,
    checksum: Option<String>,
    backup_file: Option<UploadedFile>,
}

impl RestoreForm {
    /// Read every field, streaming the file part into `staging_dir` as it
    /// arrives.
    async fn read(mut multipart: Multipart, staging_dir: PathBuf) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "backup_file" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let (mut out, staged) = staging_file(staging_dir.clone()).await?;
                let mut size: u64 = 0;
                while let Some(bytes) = field.chunk().await.map_err(multipart_error)? {
                    out.write_all(&bytes)
                        .await
                        .map_err(|e| ApiError::internal(format!("Failed to store upload: {e}")))?;
                    size += bytes.len() as u64;
                }
                out.flush()
                    .await
                    .map_err(|e| ApiError::internal(format!("Failed to store upload: {e}")))?;
                debug!(file = %file_name, size, "Received backup file");
                form.backup_file = Some(UploadedFile { file_name, staged });
                continue;
            }

            let value = field.text().await.map_err(multipart_error)?;
            match name.as_str() {
                "chunk" => form.chunk = Some(value),
                "upload_id" => form.upload_id = Some(value),
                "total_chunks" => form.total_chunks = Some(value),
                "checksum" => form.checksum = Some(value),
                _ => {}
            }
        }
        Ok(form)
    }
}

/// A fresh hidden file in `dir`, deleted on drop.
async fn staging_file(dir: PathBuf) -> Result<(tokio::fs::File, TempPath), ApiError> {
    let named = tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&dir)?;
        tempfile::Builder::new().prefix(".incoming-").tempfile_in(&dir)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Failed to store upload: {e}")))?
    .map_err(|e| ApiError::internal(format!("Failed to store upload: {e}")))?;
    let (file, path) = named.into_parts();
    Ok((tokio::fs::File::from_std(file), path))
}

/// Keeps the status multer assigns, so an oversized body is a 413.
fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::new(err.status(), format!("Invalid multipart request: {}", err.body_text()))
}

/// Registry refusals. These never touch the operation itself.
fn session_error(err: VaultError, upload_id: &str) -> ApiError {
    match err {
        VaultError::UnknownOperation(_) => ApiError::not_found("Upload session not found"),
        other => ApiError::new(StatusCode::CONFLICT, other.to_string()).with("upload_id", upload_id),
    }
}

/// POST /restore
///
/// Accepts either a whole archive or one chunk of it. Chunked uploads share
/// an `upload_id`; chunk `0` opens the session and the last chunk triggers
/// assembly and restore.
pub async fn restore_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let form = RestoreForm::read(multipart, state.config.uploads_dir.clone()).await?;

    let is_chunk = form.chunk.is_some();
    let upload_id = match form.upload_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => {
            if secure_filename(id) != id {
                return Err(ApiError::bad_request("Invalid upload_id"));
            }
            id.to_string()
        }
        _ => uuid::Uuid::new_v4().to_string(),
    };
    let session_dir = state.config.uploads_dir.join(&upload_id);

    if !is_chunk || form.chunk.as_deref().map(str::trim) == Some("0") {
        let total_chunks = match form.total_chunks.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| {
                    ApiError::bad_request("Invalid total_chunks").with("upload_id", upload_id.as_str())
                })?,
        };
        state
            .registry()?
            .begin(
                upload_id.clone(),
                total_chunks,
                state.config.relative(&session_dir),
                chrono::Utc::now(),
            )
            .map_err(|e| session_error(e, &upload_id))?;
        tokio::fs::create_dir_all(&session_dir)
            .await
            .map_err(|e| fail(&state, &upload_id, ApiError::internal(format!("Restore failed: {e}"))))?;
        info!(upload_id = %upload_id, total_chunks, "Restore session opened");
    } else {
        state
            .registry()?
            .uploading(&upload_id)
            .map_err(|e| session_error(e, &upload_id))?;
    }

    let Some(file) = form.backup_file else {
        return Err(ApiError::bad_request("No backup file provided"));
    };
    if file.file_name.is_empty() {
        return Err(ApiError::bad_request("No backup file selected"));
    }

    if is_chunk {
        receive_chunk(&state, &upload_id, session_dir, form.chunk.as_deref(), file, form.checksum).await
    } else {
        let target = single_upload_path(&session_dir);
        place(&state, &upload_id, file, target.clone()).await?;
        state
            .registry()?
            .mark_restoring(&upload_id)
            .map_err(|e| session_error(e, &upload_id))?;
        finish_restore(&state, &upload_id, target, form.checksum).await
    }
}

async fn receive_chunk(
    state: &AppState,
    upload_id: &str,
    session_dir: PathBuf,
    chunk: Option<&str>,
    file: UploadedFile,
    checksum: Option<String>,
) -> Result<Json<Value>, ApiError> {
    let index = chunk
        .map(str::trim)
        .and_then(|c| c.parse::<u32>().ok())
        .ok_or_else(|| ApiError::bad_request("Invalid chunk number").with("upload_id", upload_id))?;

    let total = state
        .registry()?
        .uploading(upload_id)
        .map(|op| op.total_chunks)
        .map_err(|e| session_error(e, upload_id))?;
    if index >= total {
        return Err(ApiError::bad_request(format!(
            "Chunk {index} out of range for {total} chunks"
        ))
        .with("upload_id", upload_id));
    }

    place(state, upload_id, file, chunk_path(&session_dir, index)).await?;

    // Moves the operation to `restoring` when this was the last piece.
    let progress = state
        .registry()?
        .record_chunk(upload_id, index)
        .map_err(|e| session_error(e, upload_id))?;

    if !progress.complete {
        return Ok(Json(json!({
            "success": true,
            "upload_id": upload_id,
            "message": format!("Chunk {index} received successfully"),
            "chunks_received": progress.chunks_received,
            "total_chunks": progress.total_chunks,
        })));
    }

    info!(upload_id, total, "All chunks received, assembling archive");
    let dir = session_dir.clone();
    let combined = tokio::task::spawn_blocking(move || assemble_chunks(&dir, total))
        .await
        .map_err(|e| fail(state, upload_id, ApiError::internal(format!("Restore failed: {e}"))))?
        .map_err(|err| match err {
            e @ VaultError::MissingChunk { .. } => {
                fail(state, upload_id, ApiError::bad_request(e.to_string()))
            }
            other => fail(state, upload_id, ApiError::internal(format!("Restore failed: {other}"))),
        })?;

    finish_restore(state, upload_id, combined, checksum).await
}

/// Move a staged upload into its session, failing the operation on error.
async fn place(state: &AppState, upload_id: &str, file: UploadedFile, target: PathBuf) -> Result<(), ApiError> {
    let staged = file.staged;
    tokio::task::spawn_blocking(move || upload::place(&staged, &target))
        .await
        .map_err(|e| fail(state, upload_id, ApiError::internal(format!("Restore failed: {e}"))))?
        .map_err(|e| fail(state, upload_id, ApiError::internal(format!("Restore failed: {e}"))))
}

/// Verify the optional checksum, then restore from `archive`. The operation
/// is already `restoring`.
async fn finish_restore(
    state: &AppState,
    upload_id: &str,
    archive: PathBuf,
    checksum: Option<String>,
) -> Result<Json<Value>, ApiError> {
    let path = archive.clone();
    let verified = tokio::task::spawn_blocking(move || restore::verify_upload(&path, checksum.as_deref()))
        .await
        .map_err(|e| fail(state, upload_id, ApiError::internal(format!("Restore failed: {e}"))))?;
    match verified {
        Ok(()) => {}
        Err(VaultError::ChecksumMismatch { expected, calculated }) => {
            warn!(upload_id, "Restore upload failed checksum verification");
            return Err(fail(
                state,
                upload_id,
                ApiError::bad_request("Checksum verification failed")
                    .with("expected", expected)
                    .with("calculated", calculated),
            ));
        }
        Err(e) => {
            return Err(fail(state, upload_id, ApiError::internal(format!("Restore failed: {e}"))));
        }
    }

    let set = state.config.databases.clone();
    let timestamp = stamp(chrono::Local::now().naive_local());
    let outcome = tokio::task::spawn_blocking(move || restore::perform_restore(&set, &archive, &timestamp))
        .await
        .map_err(|e| fail(state, upload_id, ApiError::internal(format!("Restore failed: {e}"))))?;

    let restored = match outcome {
        Ok(restored) => restored,
        Err(e @ (VaultError::InvalidArchive | VaultError::NoDatabasesInArchive)) => {
            return Err(fail(state, upload_id, ApiError::bad_request(e.to_string())));
        }
        Err(VaultError::Zip(_)) => {
            return Err(fail(state, upload_id, ApiError::bad_request("Invalid zip file provided")));
        }
        Err(e) => {
            return Err(fail(state, upload_id, ApiError::internal(format!("Restore failed: {e}"))));
        }
    };

    let restored_files: Vec<String> = restored
        .iter()
        .map(|p| state.config.databases.display_path(p))
        .collect();
    state
        .registry()?
        .complete(
            upload_id,
            restored_files.iter().map(PathBuf::from).collect(),
            chrono::Utc::now(),
        )
        .map_err(|e| session_error(e, upload_id))?;
    cleanup::remove_operation_after(
        state.operations.clone(),
        state.config.root.clone(),
        upload_id.to_string(),
        state.config.operation_retention,
    );

    info!(upload_id, files = ?restored_files, "Database restore completed");
    Ok(Json(json!({
        "success": true,
        "message": "Database restore completed successfully",
        "restored_files": restored_files,
        "upload_id": upload_id,
    })))
}

/// Mark `upload_id` failed with the error's message and tag the error with
/// the id.
fn fail(state: &AppState, upload_id: &str, error: ApiError) -> ApiError {
    match state.operations.lock() {
        Ok(mut ops) => {
            let _ = ops.fail(upload_id, Some(error.message().to_string()));
        }
        Err(_) => warn!(upload_id, "Operation registry lock poisoned"),
    }
    error.with("upload_id", upload_id)
}

/// GET /operation/status/{upload_id}
pub async fn operation_status_handler(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> Result<Json<Operation>, ApiError> {
    state
        .registry()?
        .get(&upload_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Operation not found"))
}
