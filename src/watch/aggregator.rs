//! Change event aggregator: raw filesystem events -> debounced ChangeBatch.
//!
//! Threads:
//! - notify's watcher thread (or any caller of `on_raw_event`) filters paths and sends them
//!   over an mpsc channel. Intake never blocks on the consumer.
//! - one worker thread owns the pending set and the quiet-period deadline. Every event pushes
//!   the deadline to now + debounce; when the deadline passes with a non-empty set, the set is
//!   swapped for an empty one and the flush callback runs with the old set.
//!
//! The worker is the only reader/writer of the pending set, so the swap needs no lock, and
//! events arriving while the callback runs simply queue in the channel.
//!
//! stop(): detach from notify, tell the worker to quit and join it. A callback already running
//! finishes first; the unflushed pending set is dropped.

use anyhow::{Context, Result};
use globset::GlobSet;
use log::{debug, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::batch::ChangeBatch;
use crate::metrics::record_batch_flushed;
use crate::patterns::build_globset;

/// Kind of a raw event. All kinds are aggregated identically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Modify,
    Remove,
}

pub type FlushCallback = Box<dyn FnMut(ChangeBatch) + Send + 'static>;
pub type ErrorSink = Arc<dyn Fn(&str) + Send + Sync + 'static>;

/// Helpers for building callbacks.
pub fn flush_callback<F>(f: F) -> FlushCallback
where
    F: FnMut(ChangeBatch) + Send + 'static,
{
    Box::new(f)
}

pub fn error_sink<F>(f: F) -> ErrorSink
where
    F: Fn(&str) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Error sink that only logs.
pub fn log_errors() -> ErrorSink {
    error_sink(|msg| warn!("watcher error: {msg}"))
}

#[derive(Clone, Debug)]
pub struct AggregatorOptions {
    /// Directory watched recursively by `start()`.
    pub root: PathBuf,
    pub debounce: Duration,
    /// Globs matched against absolute event paths; matches never enter the pending set.
    pub ignore: Vec<String>,
    /// Path prefixes that are dropped as well (e.g. the storage root when it lives inside
    /// the project).
    pub exclude: Vec<PathBuf>,
}

enum Msg {
    Change(PathBuf),
    SourceError(String),
    Stop,
}

#[derive(Clone)]
struct Intake {
    ignore: Arc<GlobSet>,
    exclude: Arc<Vec<PathBuf>>,
    tx: Sender<Msg>,
}

impl Intake {
    fn accepts(&self, path: &Path) -> bool {
        !self.ignore.is_match(path) && !self.exclude.iter().any(|p| path.starts_with(p))
    }

    fn push(&self, path: PathBuf) -> bool {
        if !self.accepts(&path) {
            return false;
        }
        self.tx.send(Msg::Change(path)).is_ok()
    }

    fn error(&self, msg: String) {
        let _ = self.tx.send(Msg::SourceError(msg));
    }
}

pub struct Aggregator {
    root: PathBuf,
    intake: Intake,
    worker: Option<JoinHandle<()>>,
    watcher: Option<RecommendedWatcher>,
}

impl Aggregator {
    /// Spawn the worker. Nothing is watched until `start()`; `on_raw_event` works right away.
    pub fn new(opts: AggregatorOptions, on_flush: FlushCallback, on_error: ErrorSink) -> Result<Self> {
        let ignore = build_globset(&opts.ignore).context("compile ignore globs")?;
        let (tx, rx) = mpsc::channel::<Msg>();
        let debounce = opts.debounce;

        let worker = thread::Builder::new()
            .name("undoai-aggregator".into())
            .spawn(move || run_worker(rx, debounce, on_flush, on_error))
            .context("spawn aggregator thread")?;

        Ok(Self {
            root: opts.root,
            intake: Intake {
                ignore: Arc::new(ignore),
                exclude: Arc::new(opts.exclude),
                tx,
            },
            worker: Some(worker),
            watcher: None,
        })
    }

    /// Begin receiving events for the root (recursive).
    pub fn start(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }
        let intake = self.intake.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(ev) => {
                let kind = match map_kind(&ev.kind) {
                    Some(k) => k,
                    None => return,
                };
                for path in ev.paths {
                    // directory events carry no content; removed paths cannot be checked
                    if kind != ChangeKind::Remove && path.is_dir() {
                        continue;
                    }
                    intake.push(path);
                }
            }
            Err(e) => intake.error(e.to_string()),
        })
        .context("create filesystem watcher")?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .with_context(|| format!("watch {}", self.root.display()))?;
        debug!("aggregator: watching {}", self.root.display());
        self.watcher = Some(watcher);
        Ok(())
    }

    /// Feed one raw event. Returns false if the path is ignored or the aggregator stopped.
    pub fn on_raw_event(&self, path: impl Into<PathBuf>, _kind: ChangeKind) -> bool {
        self.intake.push(path.into())
    }

    /// Report an error of the raw event source to the error sink.
    pub fn on_source_error(&self, msg: impl Into<String>) {
        self.intake.error(msg.into());
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Detach from the event source and stop the worker without flushing.
    pub fn stop(&mut self) {
        if let Some(w) = self.watcher.take() {
            drop(w);
        }
        if let Some(worker) = self.worker.take() {
            let _ = self.intake.tx.send(Msg::Stop);
            if worker.join().is_err() {
                warn!("aggregator: worker thread panicked");
            }
            debug!("aggregator: stopped");
        }
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn map_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Add),
        EventKind::Modify(_) | EventKind::Any => Some(ChangeKind::Modify),
        EventKind::Remove(_) => Some(ChangeKind::Remove),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

fn run_worker(
    rx: Receiver<Msg>,
    debounce: Duration,
    mut on_flush: FlushCallback,
    on_error: ErrorSink,
) {
    let mut pending = ChangeBatch::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let msg = match deadline {
            None => match rx.recv() {
                Ok(m) => m,
                Err(_) => break,
            },
            Some(d) => {
                let wait = d.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(m) => m,
                    Err(RecvTimeoutError::Timeout) => {
                        deadline = None;
                        let batch = std::mem::take(&mut pending);
                        if !batch.is_empty() {
                            debug!("aggregator: flush {} path(s)", batch.len());
                            record_batch_flushed();
                            on_flush(batch);
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        };

        match msg {
            Msg::Change(path) => {
                pending.insert(path);
                deadline = Some(Instant::now() + debounce);
            }
            Msg::SourceError(e) => on_error(&e),
            Msg::Stop => break,
        }
    }

    if !pending.is_empty() {
        debug!("aggregator: dropping {} unflushed path(s)", pending.len());
    }
}
