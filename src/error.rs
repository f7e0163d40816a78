//! Typed error conditions.
//!
//! Library functions return `anyhow::Result`; the conditions a caller may want to branch on
//! are raised as `UndoError` and can be recovered with `err.downcast_ref::<UndoError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UndoError {
    /// Storage root (or its snapshots/ directory) does not exist yet.
    #[error("storage not initialized at {0} (run `undoai watch` first)")]
    NotInitialized(PathBuf),

    #[error("snapshot {0} not found")]
    SnapshotNotFound(String),

    /// Metadata lists the file but its compressed blob is missing.
    #[error("snapshot file not found: {name} (snapshot {id})")]
    BlobNotFound { id: String, name: String },

    #[error("snapshot was created in a different project: {recorded} (current: {current})")]
    ProjectMismatch { recorded: PathBuf, current: PathBuf },

    #[error("no files match the specified pattern(s): {}", patterns.join(", "))]
    NoMatch { patterns: Vec<String> },

    #[error("{path} is outside of project root {root}")]
    OutsideProject { path: PathBuf, root: PathBuf },

    #[error("undoai is already watching (pid {pid})")]
    AlreadyRunning { pid: u32 },
}

impl UndoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SnapshotNotFound(_) | Self::BlobNotFound { .. })
    }
}

/// Shortcut for `err.downcast_ref::<UndoError>()`.
pub fn undo_error(err: &anyhow::Error) -> Option<&UndoError> {
    err.downcast_ref::<UndoError>()
}
