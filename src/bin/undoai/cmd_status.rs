use anyhow::Result;
use serde_json::json;

use undoai::config::UndoConfig;
use undoai::lock::DaemonLock;
use undoai::snapshots::SnapshotStore;

use crate::util::format_bytes;

/// JSON-aware status (when json=true prints one JSON object).
pub fn exec(json: bool) -> Result<()> {
    let cfg = UndoConfig::from_env();
    let root = &cfg.storage_root;

    let pid = DaemonLock::probe(root)?;
    let (initialized, count, size) = if SnapshotStore::is_initialized(root) {
        let store = SnapshotStore::open(root)?;
        (true, store.snapshot_count()?, store.total_size()?)
    } else {
        (false, 0, 0)
    };

    if json {
        let v = json!({
            "running": pid.is_some(),
            "pid": pid,
            "storage": {
                "root": root,
                "initialized": initialized,
                "snapshots": count,
                "size_bytes": size,
            },
            "config": {
                "debounce_ms": cfg.debounce_ms,
                "extra_ignore": cfg.extra_ignore,
                "extra_important": cfg.extra_important,
            },
        });
        println!("{}", serde_json::to_string_pretty(&v)?);
        return Ok(());
    }

    println!("undoai status");
    match pid {
        Some(pid) => println!("  watcher:   running (pid {})", pid),
        None => println!("  watcher:   not running"),
    }
    if initialized {
        println!("  storage:   {}", root.display());
        println!("  snapshots: {}", count);
        println!("  size:      {}", format_bytes(size));
    } else {
        println!("  storage:   not initialized (run `undoai watch`)");
    }
    println!("  config:    {}", cfg);
    Ok(())
}
