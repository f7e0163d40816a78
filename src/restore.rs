//! Restore flow: choose which files of a snapshot go back, then write them.
//!
//! plan_restore():
//!   candidates = metadata.changed_files
//!   patterns   -> keep files matching at least one glob (absolute stored path); none left = NoMatch
//!   selector   -> explicit subset of the candidates; empty selection = Cancelled (not an error)
//!
//! execute(): checks the project root once, then restores file by file. Every file gets an
//! outcome; one failure never stops the rest.

use anyhow::Result;
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::error::UndoError;
use crate::metrics::{record_file_restored, record_restore_failure};
use crate::patterns::build_globset;
use crate::snapshots::{ensure_same_project, SnapshotMetadata, SnapshotStore};

/// Picks a subset of candidate files (interactive prompt in the CLI, fixed lists in tests).
pub trait FileSelector {
    fn select(&mut self, candidates: &[PathBuf], project_root: &Path) -> Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestorePlan {
    Files(Vec<PathBuf>),
    Cancelled,
}

pub fn plan_restore(
    meta: &SnapshotMetadata,
    patterns: &[String],
    selector: Option<&mut dyn FileSelector>,
) -> Result<RestorePlan> {
    let mut files: Vec<PathBuf> = meta.changed_files.clone();

    if !patterns.is_empty() {
        let set = build_globset(patterns)?;
        files.retain(|f| set.is_match(f));
        if files.is_empty() {
            return Err(UndoError::NoMatch {
                patterns: patterns.to_vec(),
            }
            .into());
        }
        info!("{} file(s) match {}", files.len(), patterns.join(", "));
    }

    if let Some(sel) = selector {
        let picked = sel.select(&files, &meta.project_root)?;
        // keep snapshot order, drop anything that was not offered
        files.retain(|f| picked.contains(f));
        if files.is_empty() {
            return Ok(RestorePlan::Cancelled);
        }
    }

    Ok(RestorePlan::Files(files))
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub outcomes: Vec<FileOutcome>,
}

impl RestoreReport {
    pub fn restored(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }
}

/// Restore `files` of snapshot `id` into `project_root`.
///
/// Fails before writing anything if the snapshot is unknown or was taken in another project.
pub fn execute(
    store: &SnapshotStore,
    id: &str,
    project_root: &Path,
    files: &[PathBuf],
) -> Result<RestoreReport> {
    let meta = store.snapshot_metadata(id)?;
    ensure_same_project(&meta, project_root)?;

    let mut report = RestoreReport::default();
    for f in files {
        let error = match store.restore_file(f, id, project_root) {
            Ok(()) => {
                record_file_restored();
                None
            }
            Err(e) => {
                warn!("restore {}: {}: {:#}", id, f.display(), e);
                record_restore_failure();
                Some(format!("{:#}", e))
            }
        };
        report.outcomes.push(FileOutcome {
            path: f.clone(),
            error,
        });
    }
    info!(
        "restore {}: {} of {} file(s) restored",
        id,
        report.restored(),
        files.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::undo_error;
    use crate::snapshots::SnapshotLabel;

    struct FixedSelection(Vec<PathBuf>);

    impl FileSelector for FixedSelection {
        fn select(&mut self, candidates: &[PathBuf], _root: &Path) -> Result<Vec<PathBuf>> {
            Ok(candidates
                .iter()
                .filter(|c| self.0.contains(c))
                .cloned()
                .collect())
        }
    }

    fn meta() -> SnapshotMetadata {
        SnapshotMetadata::new(
            1_700_000_000_000,
            Path::new("/p"),
            vec![
                PathBuf::from("/p/src/a.rs"),
                PathBuf::from("/p/src/b.rs"),
                PathBuf::from("/p/README.md"),
            ],
            SnapshotLabel::AiBurst,
        )
    }

    #[test]
    fn no_filters_restores_everything() {
        let plan = plan_restore(&meta(), &[], None).unwrap();
        assert_eq!(plan, RestorePlan::Files(meta().changed_files));
    }

    #[test]
    fn pattern_filter_keeps_matching_files() {
        let plan = plan_restore(&meta(), &["**/*.rs".to_string()], None).unwrap();
        assert_eq!(
            plan,
            RestorePlan::Files(vec![
                PathBuf::from("/p/src/a.rs"),
                PathBuf::from("/p/src/b.rs")
            ])
        );
    }

    #[test]
    fn pattern_without_match_is_an_error() {
        let err = plan_restore(&meta(), &["**/*.py".to_string()], None).unwrap_err();
        assert!(matches!(undo_error(&err), Some(UndoError::NoMatch { .. })));
    }

    #[test]
    fn empty_selection_cancels() {
        let mut sel = FixedSelection(vec![]);
        let plan = plan_restore(&meta(), &[], Some(&mut sel)).unwrap();
        assert_eq!(plan, RestorePlan::Cancelled);
    }

    #[test]
    fn selection_applies_after_filter() {
        // README is picked but was filtered out by the pattern
        let mut sel = FixedSelection(vec![
            PathBuf::from("/p/src/b.rs"),
            PathBuf::from("/p/README.md"),
        ]);
        let plan = plan_restore(&meta(), &["**/*.rs".to_string()], Some(&mut sel)).unwrap();
        assert_eq!(plan, RestorePlan::Files(vec![PathBuf::from("/p/src/b.rs")]));
    }
}
