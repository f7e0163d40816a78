//! Watch session: aggregator -> classifier -> snapshot store.
//!
//! For every flushed batch the handler measures the time since the previous flush (since
//! session start for the first one), classifies the batch and, on a positive verdict,
//! captures it as an AI_BURST snapshot. Otherwise the verdict is only reported.
//!
//! No baseline snapshot is taken when the store is empty: the first snapshot is the first
//! qualifying batch.
//!
//! The session owns the daemon lock for its whole lifetime; stop() stops the aggregator
//! (letting a running capture finish) before the lock is released.

use anyhow::{Context, Result};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::batch::ChangeBatch;
use crate::burst::{classify, ImportantFiles, Verdict};
use crate::config::UndoConfig;
use crate::lock::DaemonLock;
use crate::metrics::record_batch_below_threshold;
use crate::snapshots::{SnapshotLabel, SnapshotStore};

use super::aggregator::{flush_callback, log_errors, Aggregator, AggregatorOptions};

/// What happened to one flushed batch.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Captured {
        id: String,
        verdict: Verdict,
        changed: usize,
    },
    Skipped {
        verdict: Verdict,
        changed: usize,
    },
    Failed {
        verdict: Verdict,
        changed: usize,
        error: String,
    },
}

impl BatchOutcome {
    pub fn verdict(&self) -> &Verdict {
        match self {
            BatchOutcome::Captured { verdict, .. }
            | BatchOutcome::Skipped { verdict, .. }
            | BatchOutcome::Failed { verdict, .. } => verdict,
        }
    }

    pub fn snapshot_id(&self) -> Option<&str> {
        match self {
            BatchOutcome::Captured { id, .. } => Some(id),
            _ => None,
        }
    }
}

pub type OutcomeCallback = Box<dyn FnMut(&BatchOutcome) + Send + 'static>;

/// Per-batch decision + capture. Lives on the aggregator's worker thread.
pub struct BurstHandler {
    store: SnapshotStore,
    project_root: PathBuf,
    important: ImportantFiles,
    last_flush: Instant,
}

impl BurstHandler {
    pub fn new(store: SnapshotStore, project_root: &Path, important: ImportantFiles) -> Self {
        Self {
            store,
            project_root: project_root.to_path_buf(),
            important,
            last_flush: Instant::now(),
        }
    }

    pub fn handle(&mut self, batch: ChangeBatch) -> BatchOutcome {
        self.handle_at(batch, Instant::now())
    }

    /// Same as `handle` with an explicit flush instant.
    pub fn handle_at(&mut self, batch: ChangeBatch, now: Instant) -> BatchOutcome {
        let since_ms = now.saturating_duration_since(self.last_flush).as_millis() as u64;
        self.last_flush = now;

        let changed = batch.len();
        let verdict = classify(&batch, |p| self.important.is_important(p), since_ms);

        if !verdict.should_snapshot {
            info!("{} file(s) changed ({})", changed, verdict.reason);
            record_batch_below_threshold();
            return BatchOutcome::Skipped { verdict, changed };
        }

        match self
            .store
            .create_snapshot(&batch, &self.project_root, SnapshotLabel::AiBurst)
        {
            Ok(id) => {
                info!(
                    "snapshot {} saved ({} file(s) changed, reason: {})",
                    id, changed, verdict.reason
                );
                BatchOutcome::Captured {
                    id,
                    verdict,
                    changed,
                }
            }
            Err(e) => {
                error!("failed to create snapshot: {:#}", e);
                BatchOutcome::Failed {
                    verdict,
                    changed,
                    error: format!("{:#}", e),
                }
            }
        }
    }
}

/// Every spelling of the storage root that event paths under `project_root` can take:
/// as configured (made absolute), canonical, and re-rooted under `project_root` when the
/// canonical storage lives inside the canonical project.
pub fn storage_exclusions(storage_root: &Path, project_root: &Path) -> Result<Vec<PathBuf>> {
    let absolute = if storage_root.is_absolute() {
        storage_root.to_path_buf()
    } else {
        std::env::current_dir()
            .context("current dir")?
            .join(storage_root)
    };
    let mut out = vec![absolute.clone()];

    if let Ok(canon) = std::fs::canonicalize(&absolute) {
        if let Ok(canon_project) = std::fs::canonicalize(project_root) {
            if let Ok(rel) = canon.strip_prefix(&canon_project) {
                out.push(project_root.join(rel));
            }
        }
        out.push(canon);
    }
    out.sort();
    out.dedup();
    Ok(out)
}

pub struct WatchSession {
    aggregator: Aggregator,
    lock: DaemonLock,
    project_root: PathBuf,
    first_run: bool,
}

impl WatchSession {
    /// Initialise storage and start watching `project_root`.
    pub fn start(
        cfg: &UndoConfig,
        project_root: &Path,
        lock: DaemonLock,
        mut on_outcome: OutcomeCallback,
    ) -> Result<Self> {
        let store = SnapshotStore::init(cfg.storage_root())?;
        let first_run = store.snapshot_count()? == 0;
        if first_run {
            info!("no snapshots yet: the first one is taken on the first qualifying change batch");
        }

        let important = ImportantFiles::with_defaults(project_root, &cfg.extra_important)
            .context("compile importance globs")?;
        let mut handler = BurstHandler::new(store, project_root, important);

        let opts = AggregatorOptions {
            root: project_root.to_path_buf(),
            debounce: cfg.debounce(),
            ignore: cfg.ignore_patterns(),
            exclude: storage_exclusions(cfg.storage_root(), project_root)?,
        };
        let mut aggregator = Aggregator::new(
            opts,
            flush_callback(move |batch| {
                let outcome = handler.handle(batch);
                on_outcome(&outcome);
            }),
            log_errors(),
        )?;
        aggregator.start()?;

        info!(
            "watching {} (storage {}, debounce {} ms, pid {})",
            project_root.display(),
            cfg.storage_root().display(),
            cfg.debounce_ms,
            lock.pid()
        );

        Ok(Self {
            aggregator,
            lock,
            project_root: project_root.to_path_buf(),
            first_run,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// True if the store had no snapshots when the session started.
    pub fn is_first_run(&self) -> bool {
        self.first_run
    }

    pub fn pid(&self) -> u32 {
        self.lock.pid()
    }

    /// Stop watching: pending changes are dropped, a running capture completes, then the
    /// daemon lock is released.
    pub fn stop(mut self) {
        self.aggregator.stop();
        info!("stopped watching {}", self.project_root.display());
        drop(self.lock);
    }
}
