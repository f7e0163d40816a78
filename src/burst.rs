//! Burst classification: does a flushed batch deserve a snapshot?
//!
//! Rules (first match wins):
//! 1. len >= BURST_MIN_FILES                                   -> snapshot ("burst size")
//! 2. any path is important (manifests, locks, env, CI, schema) -> snapshot ("important file")
//! 3. len >= VELOCITY_MIN_FILES and since_prior < VELOCITY_WINDOW_MS
//!                                                             -> snapshot ("high velocity")
//! 4. otherwise                                                -> no snapshot ("below threshold")
//!
//! `classify` has no I/O; the importance predicate is injected by the caller.

use anyhow::Result;
use globset::GlobSet;
use std::fmt;
use std::path::Path;

use crate::batch::ChangeBatch;
use crate::patterns::{build_globset, DEFAULT_IMPORTANT};

pub const BURST_MIN_FILES: usize = 3;
pub const VELOCITY_MIN_FILES: usize = 2;
pub const VELOCITY_WINDOW_MS: u64 = 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reason {
    BurstSize,
    ImportantFile,
    HighVelocity,
    BelowThreshold,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::BurstSize => "burst size",
            Reason::ImportantFile => "important file",
            Reason::HighVelocity => "high velocity",
            Reason::BelowThreshold => "below threshold",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub should_snapshot: bool,
    pub reason: Reason,
}

impl Verdict {
    fn snapshot(reason: Reason) -> Self {
        Self {
            should_snapshot: true,
            reason,
        }
    }
}

pub fn classify<F>(batch: &ChangeBatch, is_important: F, ms_since_prior_batch: u64) -> Verdict
where
    F: Fn(&Path) -> bool,
{
    let n = batch.len();
    if n >= BURST_MIN_FILES {
        return Verdict::snapshot(Reason::BurstSize);
    }
    if batch.iter().any(|p| is_important(p)) {
        return Verdict::snapshot(Reason::ImportantFile);
    }
    if n >= VELOCITY_MIN_FILES && ms_since_prior_batch < VELOCITY_WINDOW_MS {
        return Verdict::snapshot(Reason::HighVelocity);
    }
    Verdict {
        should_snapshot: false,
        reason: Reason::BelowThreshold,
    }
}

/// Importance predicate over a glob set, matched against paths relative to the project root.
pub struct ImportantFiles {
    root: std::path::PathBuf,
    set: GlobSet,
}

impl ImportantFiles {
    pub fn new<S: AsRef<str>>(project_root: &Path, patterns: &[S]) -> Result<Self> {
        Ok(Self {
            root: project_root.to_path_buf(),
            set: build_globset(patterns)?,
        })
    }

    /// Defaults plus `extra`.
    pub fn with_defaults(project_root: &Path, extra: &[String]) -> Result<Self> {
        let mut all: Vec<String> = DEFAULT_IMPORTANT.iter().map(|s| s.to_string()).collect();
        all.extend(extra.iter().cloned());
        Self::new(project_root, &all)
    }

    pub fn is_important(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root) {
            Ok(rel) => self.set.is_match(rel),
            Err(_) => false,
        }
    }
}
