//! snapshots/meta: metadata.json of one snapshot.
//!
//! Файл: <root>/snapshots/<id>/metadata.json (pretty JSON, camelCase keys):
//!   {
//!     "timestamp": 1700000000000,
//!     "date": "2023-11-14T22:13:20.000Z",
//!     "projectRoot": "/home/dev/project",
//!     "changedFiles": ["/home/dev/project/src/a.ts", ...],
//!     "fileCount": 1,
//!     "label": "AI_BURST"
//!   }
//!
//! `changedFiles` lists only files whose blob was written successfully.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotLabel {
    AiBurst,
    Auto,
}

impl fmt::Display for SnapshotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotLabel::AiBurst => f.write_str("AI_BURST"),
            SnapshotLabel::Auto => f.write_str("AUTO"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub timestamp: u64,
    pub date: String,
    pub project_root: PathBuf,
    pub changed_files: Vec<PathBuf>,
    pub file_count: usize,
    pub label: SnapshotLabel,
}

impl SnapshotMetadata {
    pub fn new(
        timestamp: u64,
        project_root: &Path,
        changed_files: Vec<PathBuf>,
        label: SnapshotLabel,
    ) -> Self {
        Self {
            timestamp,
            date: iso8601_ms(timestamp),
            project_root: project_root.to_path_buf(),
            file_count: changed_files.len(),
            changed_files,
            label,
        }
    }
}

/// "2023-11-14T22:13:20.000Z" for a unix-ms timestamp.
pub fn iso8601_ms(ts_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts_ms as i64)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write metadata.json into `dir` (tmp + rename).
pub fn write_metadata(dir: &Path, m: &SnapshotMetadata) -> Result<PathBuf> {
    let path = dir.join(METADATA_FILE);
    let tmp = path.with_extension("json.tmp");

    let json = serde_json::to_string_pretty(m).context("serialize snapshot metadata")?;
    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .with_context(|| format!("open tmp metadata {}", tmp.display()))?;
        f.write_all(json.as_bytes())?;
        f.flush()?;
    }
    fs::rename(&tmp, &path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(path)
}

/// Read metadata.json from `dir`.
pub fn read_metadata(dir: &Path) -> Result<SnapshotMetadata> {
    let path = dir.join(METADATA_FILE);
    let buf = fs::read_to_string(&path)
        .with_context(|| format!("open metadata {}", path.display()))?;
    let m: SnapshotMetadata = serde_json::from_str(&buf)
        .with_context(|| format!("parse metadata json {}", path.display()))?;
    Ok(m)
}
