use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;

use undoai::batch::ChangeBatch;
use undoai::burst::{ImportantFiles, Reason};
use undoai::config::UndoConfig;
use undoai::error::{undo_error, UndoError};
use undoai::lock::DaemonLock;
use undoai::snapshots::{SnapshotLabel, SnapshotStore};
use undoai::watch::{BatchOutcome, BurstHandler, WatchSession};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("undoai-watch-{prefix}-{pid}-{t}-{id}"))
}

fn touch(project: &Path, rel: &str) -> Result<PathBuf> {
    let p = project.join(rel);
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&p, rel.as_bytes())?;
    Ok(p)
}

#[test]
fn handler_follows_classifier_verdicts() -> Result<()> {
    let base = unique_root("handler");
    let project = base.join("project");
    fs::create_dir_all(&project)?;
    let storage = base.join("storage");
    let store = SnapshotStore::init(&storage)?;
    let important = ImportantFiles::with_defaults(&project, &[])?;
    let mut h = BurstHandler::new(store, &project, important);

    let t0 = Instant::now() + Duration::from_secs(10);

    // 1) три файла -> burst
    let batch: ChangeBatch = ["a.rs", "b.rs", "c.rs"]
        .iter()
        .map(|r| touch(&project, r))
        .collect::<Result<_>>()?;
    let out = h.handle_at(batch, t0);
    assert_eq!(out.verdict().reason, Reason::BurstSize);
    let id = out.snapshot_id().expect("snapshot expected").to_string();
    let store = SnapshotStore::open(&storage)?;
    let meta = store.snapshot_metadata(&id)?;
    assert_eq!(meta.file_count, 3);
    assert_eq!(meta.label, SnapshotLabel::AiBurst);

    // 2) один обычный файл -> ничего
    let batch: ChangeBatch = vec![touch(&project, "notes.txt")?].into_iter().collect();
    let out = h.handle_at(batch, t0 + Duration::from_secs(5));
    assert!(matches!(out, BatchOutcome::Skipped { changed: 1, .. }));
    assert_eq!(out.verdict().reason, Reason::BelowThreshold);
    assert_eq!(store.snapshot_count()?, 1);

    // 3) один важный файл -> snapshot
    let batch: ChangeBatch = vec![touch(&project, "package.json")?].into_iter().collect();
    let out = h.handle_at(batch, t0 + Duration::from_secs(10));
    assert_eq!(out.verdict().reason, Reason::ImportantFile);
    assert!(out.snapshot_id().is_some());

    // 4) два файла через 500 ms -> high velocity
    let batch: ChangeBatch = vec![touch(&project, "x.rs")?, touch(&project, "y.rs")?]
        .into_iter()
        .collect();
    let out = h.handle_at(batch, t0 + Duration::from_millis(10_500));
    assert_eq!(out.verdict().reason, Reason::HighVelocity);
    assert!(out.snapshot_id().is_some());

    // 5) два файла через 1500 ms -> ниже порога
    let batch: ChangeBatch = vec![touch(&project, "x.rs")?, touch(&project, "y.rs")?]
        .into_iter()
        .collect();
    let out = h.handle_at(batch, t0 + Duration::from_millis(12_000));
    assert!(!out.verdict().should_snapshot);
    assert_eq!(store.snapshot_count()?, 3);
    Ok(())
}

#[test]
fn second_lock_is_refused_while_first_is_held() -> Result<()> {
    let storage = unique_root("lock");

    assert_eq!(DaemonLock::probe(&storage)?, None);
    let lock = DaemonLock::try_acquire(&storage)?;
    assert_eq!(lock.pid(), std::process::id());
    assert!(lock.path().exists());

    let err = DaemonLock::try_acquire(&storage).err().expect("must be refused");
    match undo_error(&err) {
        Some(UndoError::AlreadyRunning { pid }) => assert_eq!(*pid, std::process::id()),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(DaemonLock::probe(&storage)?, Some(std::process::id()));

    let path = lock.path().to_path_buf();
    drop(lock);
    // the file stays (same inode for the next holder) but carries no pid
    assert!(path.exists());
    assert_eq!(fs::read_to_string(&path)?, "");
    assert_eq!(DaemonLock::probe(&storage)?, None);

    // stale pid from a crashed holder: nobody holds the lock
    fs::write(&path, "424242")?;
    assert_eq!(DaemonLock::probe(&storage)?, None);
    assert!(path.exists());

    let again = DaemonLock::try_acquire(&storage)?;
    assert_eq!(fs::read_to_string(&path)?, std::process::id().to_string());
    assert_eq!(DaemonLock::probe(&storage)?, Some(again.pid()));
    Ok(())
}

#[test]
fn burst_of_real_file_writes_creates_one_snapshot() -> Result<()> {
    let base = unique_root("e2e");
    fs::create_dir_all(&base)?;
    let project = fs::canonicalize(&base)?.join("project");
    // directories exist before watching starts: files in freshly created dirs can race the
    // recursive watch registration
    fs::create_dir_all(project.join("src"))?;
    fs::create_dir_all(project.join(".git"))?;
    // storage inside the project: its own writes must not trigger new batches
    let storage = project.join(".undoai");

    let cfg = UndoConfig::default()
        .with_storage_root(&storage)
        .with_debounce_ms(300);
    let lock = DaemonLock::try_acquire(&storage)?;

    let (tx, rx) = mpsc::channel::<BatchOutcome>();
    let session = WatchSession::start(
        &cfg,
        &project,
        lock,
        Box::new(move |o: &BatchOutcome| {
            let _ = tx.send(o.clone());
        }),
    )?;
    assert!(session.is_first_run());
    assert_eq!(DaemonLock::probe(&storage)?, Some(std::process::id()));

    let written = vec![
        touch(&project, "src/main.rs")?,
        touch(&project, "src/lib.rs")?,
        touch(&project, "README.md")?,
        touch(&project, ".git/index")?,
    ];

    let out = rx.recv_timeout(Duration::from_secs(10))?;
    let id = match &out {
        BatchOutcome::Captured { id, changed, .. } => {
            assert_eq!(*changed, 3);
            id.clone()
        }
        other => panic!("expected a snapshot, got {other:?}"),
    };
    assert!(rx.recv_timeout(Duration::from_millis(1500)).is_err());

    session.stop();
    assert_eq!(DaemonLock::probe(&storage)?, None);

    let store = SnapshotStore::open(&storage)?;
    let meta = store.snapshot_metadata(&id)?;
    assert_eq!(meta.project_root, project);
    assert_eq!(meta.changed_files.len(), 3);
    assert!(!meta.changed_files.contains(&written[3]));
    Ok(())
}

#[cfg(unix)]
#[test]
fn storage_reached_through_symlink_does_not_feed_back() -> Result<()> {
    let base = unique_root("symlink");
    fs::create_dir_all(&base)?;
    let base = fs::canonicalize(&base)?;
    let project = base.join("project");
    fs::create_dir_all(project.join("src"))?;
    std::os::unix::fs::symlink(&project, base.join("link"))?;
    // same directory as project/.undoai, spelled through the link
    let storage = base.join("link").join(".undoai");

    let cfg = UndoConfig::default()
        .with_storage_root(&storage)
        .with_debounce_ms(200);
    let lock = DaemonLock::try_acquire(&storage)?;
    let (tx, rx) = mpsc::channel::<BatchOutcome>();
    let session = WatchSession::start(
        &cfg,
        &project,
        lock,
        Box::new(move |o: &BatchOutcome| {
            let _ = tx.send(o.clone());
        }),
    )?;

    for rel in ["src/a.rs", "src/b.rs", "src/c.rs"] {
        touch(&project, rel)?;
    }

    let out = rx.recv_timeout(Duration::from_secs(10))?;
    assert!(matches!(out, BatchOutcome::Captured { changed: 3, .. }), "{out:?}");
    // the store's own blob/metadata writes must not come back as batches
    let extra: Vec<BatchOutcome> = rx.try_iter().collect();
    assert!(extra.is_empty(), "{extra:?}");
    assert!(
        rx.recv_timeout(Duration::from_millis(1500)).is_err(),
        "snapshot writes triggered another batch"
    );

    session.stop();
    assert_eq!(SnapshotStore::open(&project.join(".undoai"))?.snapshot_count()?, 1);
    Ok(())
}
