use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use undoai::batch::ChangeBatch;
use undoai::watch::{error_sink, flush_callback, log_errors, Aggregator, AggregatorOptions, ChangeKind};

fn opts(debounce_ms: u64, ignore: &[&str]) -> AggregatorOptions {
    AggregatorOptions {
        root: PathBuf::from("/proj"),
        debounce: Duration::from_millis(debounce_ms),
        ignore: ignore.iter().map(|s| s.to_string()).collect(),
        exclude: vec![PathBuf::from("/proj/.undoai")],
    }
}

fn collecting(opts: AggregatorOptions) -> Result<(Aggregator, Receiver<ChangeBatch>)> {
    let (tx, rx) = mpsc::channel();
    let agg = Aggregator::new(
        opts,
        flush_callback(move |batch| {
            let _ = tx.send(batch);
        }),
        log_errors(),
    )?;
    Ok((agg, rx))
}

fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

#[test]
fn repeated_paths_collapse_into_one_batch() -> Result<()> {
    let (agg, rx) = collecting(opts(100, &[]))?;

    for _ in 0..5 {
        agg.on_raw_event(p("/proj/src/a.rs"), ChangeKind::Modify);
    }
    agg.on_raw_event(p("/proj/src/b.rs"), ChangeKind::Add);
    agg.on_raw_event(p("/proj/src/a.rs"), ChangeKind::Remove);

    let batch = rx.recv_timeout(Duration::from_secs(5))?;
    assert_eq!(batch.len(), 2);
    assert!(batch.contains(&p("/proj/src/a.rs")));
    assert!(batch.contains(&p("/proj/src/b.rs")));

    // exactly one flush
    assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    Ok(())
}

#[test]
fn timer_resets_on_every_event() -> Result<()> {
    let (agg, rx) = collecting(opts(300, &[]))?;

    // 8 events 20 ms apart: the quiet period never elapses in between
    for i in 0..8 {
        agg.on_raw_event(p(&format!("/proj/f{i}.txt")), ChangeKind::Modify);
        thread::sleep(Duration::from_millis(20));
    }

    let batch = rx.recv_timeout(Duration::from_secs(5))?;
    assert_eq!(batch.len(), 8);
    assert!(rx.recv_timeout(Duration::from_millis(600)).is_err());

    // next burst -> next batch
    agg.on_raw_event(p("/proj/late.txt"), ChangeKind::Modify);
    let batch = rx.recv_timeout(Duration::from_secs(5))?;
    assert_eq!(batch.len(), 1);
    assert!(batch.contains(&p("/proj/late.txt")));
    Ok(())
}

#[test]
fn ignored_and_excluded_paths_never_enter_a_batch() -> Result<()> {
    let (agg, rx) = collecting(opts(
        80,
        &["**/.git/**", "**/node_modules/**", "**/*.tmp"],
    ))?;

    assert!(!agg.on_raw_event(p("/proj/.git/index"), ChangeKind::Modify));
    assert!(!agg.on_raw_event(p("/proj/node_modules/x/index.js"), ChangeKind::Add));
    assert!(!agg.on_raw_event(p("/proj/src/edit.tmp"), ChangeKind::Add));
    assert!(!agg.on_raw_event(p("/proj/.undoai/snapshots/1/metadata.json"), ChangeKind::Add));
    assert!(agg.on_raw_event(p("/proj/src/lib.rs"), ChangeKind::Modify));

    let batch = rx.recv_timeout(Duration::from_secs(5))?;
    assert_eq!(batch.iter().collect::<Vec<_>>(), vec![p("/proj/src/lib.rs").as_path()]);
    Ok(())
}

#[test]
fn ignore_only_events_produce_no_flush() -> Result<()> {
    let (agg, rx) = collecting(opts(50, &["**/.git/**"]))?;
    agg.on_raw_event(p("/proj/.git/HEAD"), ChangeKind::Modify);
    assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    Ok(())
}

#[test]
fn stop_drops_pending_changes() -> Result<()> {
    let (mut agg, rx) = collecting(opts(500, &[]))?;
    agg.on_raw_event(p("/proj/a.txt"), ChangeKind::Modify);
    agg.on_raw_event(p("/proj/b.txt"), ChangeKind::Modify);

    agg.stop();
    assert!(!agg.is_running());
    assert!(rx.recv_timeout(Duration::from_millis(900)).is_err());

    // intake is closed after stop
    assert!(!agg.on_raw_event(p("/proj/c.txt"), ChangeKind::Modify));
    Ok(())
}

#[test]
fn source_errors_go_to_the_sink_and_do_not_stop_aggregation() -> Result<()> {
    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let errs = errors.clone();
    let (tx, rx) = mpsc::channel();
    let agg = Aggregator::new(
        opts(80, &[]),
        flush_callback(move |batch| {
            let _ = tx.send(batch);
        }),
        error_sink(move |msg| errs.lock().unwrap().push(msg.to_string())),
    )?;

    agg.on_source_error("inotify queue overflow");
    agg.on_raw_event(p("/proj/a.txt"), ChangeKind::Add);

    let batch = rx.recv_timeout(Duration::from_secs(5))?;
    assert_eq!(batch.len(), 1);
    assert_eq!(errors.lock().unwrap().as_slice(), ["inotify queue overflow".to_string()]);
    Ok(())
}

#[test]
fn slow_flush_does_not_block_intake() -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let agg = Aggregator::new(
        opts(50, &[]),
        flush_callback(move |batch| {
            // первый flush "снимает снапшот" долго
            thread::sleep(Duration::from_millis(400));
            let _ = tx.send(batch);
        }),
        log_errors(),
    )?;

    agg.on_raw_event(p("/proj/first.txt"), ChangeKind::Modify);
    // let the first flush start
    thread::sleep(Duration::from_millis(150));

    let t0 = Instant::now();
    for i in 0..100 {
        assert!(agg.on_raw_event(p(&format!("/proj/during{i}.txt")), ChangeKind::Modify));
    }
    assert!(t0.elapsed() < Duration::from_millis(200), "intake blocked");

    let first = rx.recv_timeout(Duration::from_secs(5))?;
    assert_eq!(first.len(), 1);
    let second = rx.recv_timeout(Duration::from_secs(5))?;
    assert_eq!(second.len(), 100);
    Ok(())
}

#[test]
fn stop_waits_for_a_running_flush() -> Result<()> {
    let done = Arc::new(Mutex::new(false));
    let flag = done.clone();
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let mut agg = Aggregator::new(
        opts(30, &[]),
        flush_callback(move |_batch| {
            let _ = started_tx.send(());
            // снапшот в процессе записи
            thread::sleep(Duration::from_millis(400));
            *flag.lock().unwrap() = true;
        }),
        log_errors(),
    )?;

    agg.on_raw_event(p("/proj/a.txt"), ChangeKind::Modify);
    started_rx.recv_timeout(Duration::from_secs(5))?;
    assert!(!*done.lock().unwrap());

    agg.stop();
    assert!(*done.lock().unwrap(), "stop returned before the flush finished");
    Ok(())
}
