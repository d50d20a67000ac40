//! # Delayed Cleanup
//!
//! Generated archives and finished restore sessions are kept around for a
//! while so clients can resume downloads or poll the outcome, then removed
//! by detached tasks.

use crate::api::SharedRegistry;
use bookvault_core::upload::discard_session;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Delete `path` after `delay`. A file that is already gone is ignored.
pub fn remove_file_after(path: PathBuf, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Removed expired backup archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove backup archive"),
        }
    })
}

/// Forget operation `id` and delete its upload directory after `delay`.
///
/// The operation's `temp_dir` is resolved against `root`.
pub fn remove_operation_after(
    registry: SharedRegistry,
    root: PathBuf,
    id: String,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let removed = match registry.lock() {
            Ok(mut ops) => ops.remove(&id),
            Err(_) => {
                warn!(upload_id = %id, "Operation registry lock poisoned; skipping cleanup");
                return;
            }
        };
        let Some(op) = removed else {
            return;
        };

        let dir = root.join(op.temp_dir);
        let outcome = tokio::task::spawn_blocking(move || discard_session(&dir)).await;
        match outcome {
            Ok(Ok(())) => debug!(upload_id = %id, "Cleaned up restore operation"),
            Ok(Err(e)) => warn!(upload_id = %id, error = %e, "Failed to remove upload directory"),
            Err(e) => warn!(upload_id = %id, error = %e, "Cleanup task panicked"),
        }
    })
}
