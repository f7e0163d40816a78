use anyhow::{Context, Result};
use log::info;
use std::sync::mpsc;

use undoai::config::UndoConfig;
use undoai::lock::DaemonLock;
use undoai::metrics;
use undoai::watch::{BatchOutcome, WatchSession};

/// CLI: watch: следить за текущим каталогом до Ctrl-C / `undoai stop`.
///
/// Порядок остановки: aggregator (незавершённый batch отбрасывается, идущий снапшот
/// дописывается) -> release lock.
pub fn exec() -> Result<()> {
    let cfg = UndoConfig::from_env();
    let root = crate::util::project_root()?;

    let lock = DaemonLock::try_acquire(&cfg.storage_root)
        .context("use `undoai stop` to stop the running watcher")?;

    // до старта сессии: SIGTERM во время запуска тоже приводит к штатной остановке
    let rx = stop_signal()?;

    let session = WatchSession::start(&cfg, &root, lock, Box::new(print_outcome))?;

    println!("undoai is watching {}", root.display());
    println!("  storage:  {}", cfg.storage_root.display());
    println!("  debounce: {} ms", cfg.debounce_ms);
    if session.is_first_run() {
        println!("  no snapshots yet: the first one is taken on the first qualifying change");
    }
    println!("Press Ctrl-C to stop.");

    let _ = rx.recv();

    session.stop();

    let m = metrics::snapshot();
    info!(
        "session totals: batches={} snapshots={} files_captured={} files_skipped={} bytes_stored={}",
        m.batches_flushed, m.snapshots_created, m.files_captured, m.files_skipped, m.bytes_stored
    );
    println!("undoai stopped");
    Ok(())
}

/// Ctrl-C / SIGTERM -> one message on the returned channel.
fn stop_signal() -> Result<mpsc::Receiver<()>> {
    let (tx, rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("install Ctrl-C/SIGTERM handler")?;
    Ok(rx)
}

fn print_outcome(outcome: &BatchOutcome) {
    match outcome {
        BatchOutcome::Captured { id, verdict, changed } => {
            println!(
                "snapshot saved ({} file{} changed)  reason: {}  id: {}",
                changed,
                crate::util::plural(*changed),
                verdict.reason,
                id
            );
        }
        BatchOutcome::Skipped { verdict, changed } => {
            println!(
                "{} file{} changed ({}, no snapshot)",
                changed,
                crate::util::plural(*changed),
                verdict.reason
            );
        }
        BatchOutcome::Failed { error, .. } => {
            eprintln!("failed to create snapshot: {}", error);
        }
    }
}
