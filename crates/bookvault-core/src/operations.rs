//! # Operations Module
//!
//! Tracking of restore sessions so that clients can poll their progress.
//!
//! An operation moves through a fixed lifecycle:
//!
//! ```text
//! uploading ──► restoring ──► completed
//!     │             │
//!     └─────────────┴──────► failed
//! ```
//!
//! The registry is a plain ordered map; callers share it behind a lock.

use crate::{Result, VaultError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

// =============================================================================
// OPERATION
// =============================================================================

/// Kind of tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Restore,
}

/// Lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Uploading,
    Restoring,
    Completed,
    Failed,
}

impl OperationStatus {
    /// Lowercase name, as serialized.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Restoring => "restoring",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed and failed operations accept no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A tracked restore session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub started_at: DateTime<Utc>,
    pub chunks_received: u32,
    pub total_chunks: u32,
    pub temp_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restored_files: Option<Vec<PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Distinct chunk indices stored so far.
    #[serde(skip)]
    received: BTreeSet<u32>,
}

impl Operation {
    /// A fresh restore session in the `uploading` state.
    ///
    /// `total_chunks` is raised to at least 1.
    #[must_use]
    pub fn restore(total_chunks: u32, temp_dir: PathBuf, now: DateTime<Utc>) -> Self {
        Self {
            kind: OperationKind::Restore,
            status: OperationStatus::Uploading,
            started_at: now,
            chunks_received: 0,
            total_chunks: total_chunks.max(1),
            temp_dir,
            completed_at: None,
            restored_files: None,
            error: None,
            received: BTreeSet::new(),
        }
    }

    /// Whether every expected chunk has arrived.
    #[must_use]
    pub fn all_chunks_received(&self) -> bool {
        self.chunks_received >= self.total_chunks
    }
}

/// Progress after recording a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub chunks_received: u32,
    pub total_chunks: u32,
    pub complete: bool,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// All known operations, keyed by upload id.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, Operation>,
}

impl OperationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new restore session.
    ///
    /// An existing session with the same id is replaced only while it is
    /// still uploading, so a client may restart an upload but not reopen a
    /// session that is restoring or finished.
    pub fn begin(
        &mut self,
        id: impl Into<String>,
        total_chunks: u32,
        temp_dir: PathBuf,
        now: DateTime<Utc>,
    ) -> Result<&Operation> {
        let id = id.into();
        if let Some(existing) = self.operations.get(&id) {
            if existing.status != OperationStatus::Uploading {
                return Err(closed(&id, existing.status));
            }
        }
        self.operations
            .insert(id.clone(), Operation::restore(total_chunks, temp_dir, now));
        Ok(&self.operations[&id])
    }

    /// Look up an operation.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Operation> {
        self.operations.get(id)
    }

    /// Check if an operation is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.operations.contains_key(id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Operation> {
        self.operations
            .get_mut(id)
            .ok_or_else(|| VaultError::UnknownOperation(id.to_string()))
    }

    /// Look up an operation that still accepts chunks.
    pub fn uploading(&self, id: &str) -> Result<&Operation> {
        let op = self
            .get(id)
            .ok_or_else(|| VaultError::UnknownOperation(id.to_string()))?;
        if op.status != OperationStatus::Uploading {
            return Err(closed(id, op.status));
        }
        Ok(op)
    }

    /// Count chunk `index` as received. Repeated indices are not counted
    /// twice.
    ///
    /// When this chunk completes the upload the operation moves to
    /// `restoring` in the same step, so exactly one caller sees
    /// `complete == true`.
    pub fn record_chunk(&mut self, id: &str, index: u32) -> Result<ChunkProgress> {
        let op = self.get_mut(id)?;
        if op.status != OperationStatus::Uploading {
            return Err(closed(id, op.status));
        }
        if op.received.insert(index) {
            op.chunks_received = op.received.len() as u32;
        }
        let complete = op.all_chunks_received();
        if complete {
            op.status = OperationStatus::Restoring;
        }
        Ok(ChunkProgress {
            chunks_received: op.chunks_received,
            total_chunks: op.total_chunks,
            complete,
        })
    }

    /// Move from `uploading` to `restoring`.
    ///
    /// Fails with [`VaultError::OperationClosed`] from any other state, so
    /// only one caller can start the restore.
    pub fn mark_restoring(&mut self, id: &str) -> Result<()> {
        let op = self.get_mut(id)?;
        if op.status != OperationStatus::Uploading {
            return Err(closed(id, op.status));
        }
        op.status = OperationStatus::Restoring;
        Ok(())
    }

    /// Move from `restoring` to `completed`, recording what was restored.
    pub fn complete(&mut self, id: &str, restored: Vec<PathBuf>, now: DateTime<Utc>) -> Result<()> {
        let op = self.get_mut(id)?;
        if op.status != OperationStatus::Restoring {
            return Err(closed(id, op.status));
        }
        op.status = OperationStatus::Completed;
        op.completed_at = Some(now);
        op.restored_files = Some(restored);
        Ok(())
    }

    /// Move to `failed`, optionally recording the cause.
    ///
    /// A completed operation stays completed. An earlier error is kept.
    pub fn fail(&mut self, id: &str, error: Option<String>) -> Result<()> {
        let op = self.get_mut(id)?;
        if op.status == OperationStatus::Completed {
            return Err(closed(id, op.status));
        }
        op.status = OperationStatus::Failed;
        if op.error.is_none() {
            op.error = error;
        }
        Ok(())
    }

    /// Forget an operation, returning it.
    pub fn remove(&mut self, id: &str) -> Option<Operation> {
        self.operations.remove(id)
    }

    /// Number of tracked operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if no operations are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }
}

fn closed(id: &str, status: OperationStatus) -> VaultError {
    VaultError::OperationClosed {
        id: id.to_string(),
        status: status.as_str().to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn begin_starts_uploading() {
        let mut reg = OperationRegistry::new();
        let op = reg.begin("a", 3, PathBuf::from("temp_uploads/a"), t(100)).unwrap();
        assert_eq!(op.status, OperationStatus::Uploading);
        assert_eq!(op.total_chunks, 3);
        assert_eq!(op.chunks_received, 0);
        assert!(reg.contains("a"));
    }

    #[test]
    fn zero_total_is_raised_to_one() {
        let mut reg = OperationRegistry::new();
        assert_eq!(reg.begin("a", 0, PathBuf::new(), t(0)).unwrap().total_chunks, 1);
    }

    #[test]
    fn repeated_chunks_count_once() {
        let mut reg = OperationRegistry::new();
        reg.begin("a", 2, PathBuf::new(), t(0)).unwrap();

        let first = reg.record_chunk("a", 0).unwrap();
        assert_eq!(first.chunks_received, 1);
        assert!(!first.complete);

        let again = reg.record_chunk("a", 0).unwrap();
        assert_eq!(again.chunks_received, 1);

        let last = reg.record_chunk("a", 1).unwrap();
        assert!(last.complete);
        assert_eq!(reg.get("a").unwrap().status, OperationStatus::Restoring);
    }

    #[test]
    fn finished_session_rejects_chunks() {
        let mut reg = OperationRegistry::new();
        reg.begin("a", 2, PathBuf::new(), t(0)).unwrap();
        reg.record_chunk("a", 0).unwrap();
        reg.record_chunk("a", 1).unwrap();

        // A duplicate final chunk while restoring does not restart anything.
        assert!(matches!(
            reg.record_chunk("a", 1),
            Err(VaultError::OperationClosed { .. })
        ));

        reg.complete("a", Vec::new(), t(1)).unwrap();
        assert!(reg.record_chunk("a", 1).is_err());
        assert!(reg.uploading("a").is_err());
        assert!(reg.mark_restoring("a").is_err());
        assert!(reg.fail("a", Some("late".into())).is_err());

        let op = reg.get("a").unwrap();
        assert_eq!(op.status, OperationStatus::Completed);
        assert!(op.error.is_none());
    }

    #[test]
    fn only_one_caller_starts_restoring() {
        let mut reg = OperationRegistry::new();
        reg.begin("a", 1, PathBuf::new(), t(0)).unwrap();
        reg.mark_restoring("a").unwrap();
        match reg.mark_restoring("a") {
            Err(VaultError::OperationClosed { status, .. }) => assert_eq!(status, "restoring"),
            other => panic!("expected OperationClosed, got {other:?}"),
        }
    }

    #[test]
    fn begin_restarts_only_uploading_sessions() {
        let mut reg = OperationRegistry::new();
        reg.begin("a", 3, PathBuf::new(), t(0)).unwrap();
        reg.record_chunk("a", 0).unwrap();

        let restarted = reg.begin("a", 2, PathBuf::new(), t(1)).unwrap();
        assert_eq!(restarted.chunks_received, 0);
        assert_eq!(restarted.total_chunks, 2);

        reg.mark_restoring("a").unwrap();
        assert!(reg.begin("a", 2, PathBuf::new(), t(2)).is_err());

        reg.complete("a", Vec::new(), t(3)).unwrap();
        assert!(reg.begin("a", 2, PathBuf::new(), t(4)).is_err());
    }

    #[test]
    fn complete_requires_restoring() {
        let mut reg = OperationRegistry::new();
        reg.begin("a", 1, PathBuf::new(), t(0)).unwrap();
        assert!(reg.complete("a", Vec::new(), t(1)).is_err());
        assert_eq!(reg.get("a").unwrap().status, OperationStatus::Uploading);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let mut reg = OperationRegistry::new();
        assert!(matches!(
            reg.record_chunk("missing", 0),
            Err(VaultError::UnknownOperation(_))
        ));
        assert!(reg.mark_restoring("missing").is_err());
        assert!(reg.remove("missing").is_none());
    }

    #[test]
    fn lifecycle_to_completed() {
        let mut reg = OperationRegistry::new();
        reg.begin("a", 1, PathBuf::new(), t(0)).unwrap();
        reg.mark_restoring("a").unwrap();
        assert_eq!(reg.get("a").unwrap().status, OperationStatus::Restoring);

        reg.complete("a", vec![PathBuf::from("database/books_data.db")], t(5))
            .unwrap();
        let op = reg.get("a").unwrap();
        assert_eq!(op.status, OperationStatus::Completed);
        assert!(op.status.is_terminal());
        assert_eq!(op.completed_at, Some(t(5)));
        assert_eq!(op.restored_files.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn failure_keeps_earlier_error() {
        let mut reg = OperationRegistry::new();
        reg.begin("a", 1, PathBuf::new(), t(0)).unwrap();
        reg.fail("a", Some("disk full".into())).unwrap();
        reg.fail("a", None).unwrap();
        let op = reg.get("a").unwrap();
        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.error.as_deref(), Some("disk full"));
    }

    #[test]
    fn json_shape() {
        let mut reg = OperationRegistry::new();
        reg.begin("a", 2, PathBuf::from("temp_uploads/a"), t(0)).unwrap();
        reg.record_chunk("a", 0).unwrap();

        let json = serde_json::to_value(reg.get("a").unwrap()).unwrap();
        assert_eq!(json["type"], "restore");
        assert_eq!(json["status"], "uploading");
        assert_eq!(json["chunks_received"], 1);
        assert_eq!(json["total_chunks"], 2);
        assert_eq!(json["temp_dir"], "temp_uploads/a");
        assert!(json.get("completed_at").is_none());
        assert!(json.get("received").is_none());
    }
}
