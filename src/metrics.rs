//! Lightweight process-local metrics for undoai.
//!
//! Атомарные счётчики, без блокировок:
//! - Watch (flushed batches, verdicts)
//! - Capture (snapshots, files captured/skipped, compressed bytes)
//! - Restore (files written)

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Watch -----
static BATCHES_FLUSHED: AtomicU64 = AtomicU64::new(0);
static BATCHES_BELOW_THRESHOLD: AtomicU64 = AtomicU64::new(0);

// ----- Capture -----
static SNAPSHOTS_CREATED: AtomicU64 = AtomicU64::new(0);
static FILES_CAPTURED: AtomicU64 = AtomicU64::new(0);
static FILES_SKIPPED: AtomicU64 = AtomicU64::new(0);
static BYTES_STORED: AtomicU64 = AtomicU64::new(0);

// ----- Restore -----
static FILES_RESTORED: AtomicU64 = AtomicU64::new(0);
static RESTORE_FAILURES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub batches_flushed: u64,
    pub batches_below_threshold: u64,

    pub snapshots_created: u64,
    pub files_captured: u64,
    pub files_skipped: u64,
    pub bytes_stored: u64,

    pub files_restored: u64,
    pub restore_failures: u64,
}

impl MetricsSnapshot {
    /// Share of flushed batches that produced a snapshot.
    pub fn snapshot_ratio(&self) -> f64 {
        if self.batches_flushed == 0 {
            0.0
        } else {
            self.snapshots_created as f64 / self.batches_flushed as f64
        }
    }
}

// ----- Recorders (Watch) -----

pub fn record_batch_flushed() {
    BATCHES_FLUSHED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_batch_below_threshold() {
    BATCHES_BELOW_THRESHOLD.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Capture) -----

pub fn record_snapshot_created() {
    SNAPSHOTS_CREATED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_file_captured(compressed_bytes: usize) {
    FILES_CAPTURED.fetch_add(1, Ordering::Relaxed);
    BYTES_STORED.fetch_add(compressed_bytes as u64, Ordering::Relaxed);
}

pub fn record_file_skipped() {
    FILES_SKIPPED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Restore) -----

pub fn record_file_restored() {
    FILES_RESTORED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_restore_failure() {
    RESTORE_FAILURES.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        batches_flushed: BATCHES_FLUSHED.load(Ordering::Relaxed),
        batches_below_threshold: BATCHES_BELOW_THRESHOLD.load(Ordering::Relaxed),
        snapshots_created: SNAPSHOTS_CREATED.load(Ordering::Relaxed),
        files_captured: FILES_CAPTURED.load(Ordering::Relaxed),
        files_skipped: FILES_SKIPPED.load(Ordering::Relaxed),
        bytes_stored: BYTES_STORED.load(Ordering::Relaxed),
        files_restored: FILES_RESTORED.load(Ordering::Relaxed),
        restore_failures: RESTORE_FAILURES.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    BATCHES_FLUSHED.store(0, Ordering::Relaxed);
    BATCHES_BELOW_THRESHOLD.store(0, Ordering::Relaxed);
    SNAPSHOTS_CREATED.store(0, Ordering::Relaxed);
    FILES_CAPTURED.store(0, Ordering::Relaxed);
    FILES_SKIPPED.store(0, Ordering::Relaxed);
    BYTES_STORED.store(0, Ordering::Relaxed);
    FILES_RESTORED.store(0, Ordering::Relaxed);
    RESTORE_FAILURES.store(0, Ordering::Relaxed);
}
