//! Centralized configuration for undoai.
//!
//! Everything is read from the environment once (`UndoConfig::from_env()`) and can be
//! overridden with the fluent `with_*` setters (tests use those instead of env vars).
//!
//! Env:
//! - UNDOAI_HOME         storage root (default ~/.undoai)
//! - UNDOAI_DEBOUNCE_MS  quiet period before a batch is flushed (default 2000)
//! - UNDOAI_IGNORE       extra ignore globs, comma separated (added to patterns::DEFAULT_IGNORE)
//! - UNDOAI_IMPORTANT    extra importance globs, comma separated (added to patterns::DEFAULT_IMPORTANT)

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::patterns::{split_list, DEFAULT_IGNORE};

pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;
pub const STORAGE_DIR_NAME: &str = ".undoai";

#[derive(Clone, Debug)]
pub struct UndoConfig {
    /// Root of on-disk state: <root>/snapshots, <root>/daemon.pid.
    /// Env: UNDOAI_HOME (default ~/.undoai)
    pub storage_root: PathBuf,

    /// Debounce delay in milliseconds.
    /// Env: UNDOAI_DEBOUNCE_MS (default 2000)
    pub debounce_ms: u64,

    /// Ignore globs appended to the defaults.
    /// Env: UNDOAI_IGNORE
    pub extra_ignore: Vec<String>,

    /// Importance globs appended to the defaults.
    /// Env: UNDOAI_IMPORTANT
    pub extra_important: Vec<String>,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            extra_ignore: Vec::new(),
            extra_important: Vec::new(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STORAGE_DIR_NAME)
}

impl UndoConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("UNDOAI_HOME") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.storage_root = PathBuf::from(s);
            }
        }

        if let Ok(v) = std::env::var("UNDOAI_DEBOUNCE_MS") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.debounce_ms = n;
            }
        }

        if let Ok(v) = std::env::var("UNDOAI_IGNORE") {
            cfg.extra_ignore = split_list(&v);
        }

        if let Ok(v) = std::env::var("UNDOAI_IMPORTANT") {
            cfg.extra_important = split_list(&v);
        }

        cfg
    }

    pub fn with_storage_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.storage_root = root.into();
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn with_extra_ignore(mut self, globs: Vec<String>) -> Self {
        self.extra_ignore = globs;
        self
    }

    pub fn with_extra_important(mut self, globs: Vec<String>) -> Self {
        self.extra_important = globs;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.storage_root.join(crate::snapshots::store::SNAPSHOTS_DIR)
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Default ignore globs followed by the configured extras.
    pub fn ignore_patterns(&self) -> Vec<String> {
        DEFAULT_IGNORE
            .iter()
            .map(|s| s.to_string())
            .chain(self.extra_ignore.iter().cloned())
            .collect()
    }
}

impl fmt::Display for UndoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UndoConfig {{ storage_root: {}, debounce_ms: {}, extra_ignore: [{}], extra_important: [{}] }}",
            self.storage_root.display(),
            self.debounce_ms,
            self.extra_ignore.join(", "),
            self.extra_important.join(", "),
        )
    }
}
