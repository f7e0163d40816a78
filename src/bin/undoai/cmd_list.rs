use anyhow::Result;
use serde_json::json;

use undoai::config::UndoConfig;
use undoai::snapshots::SnapshotStore;

use crate::util::{now_ms, relative_time};

pub fn exec(json: bool) -> Result<()> {
    let cfg = UndoConfig::from_env();
    let store = SnapshotStore::open(&cfg.storage_root)?;
    let entries = store.list_snapshots()?;

    if json {
        let arr: Vec<_> = entries
            .iter()
            .map(|e| {
                json!({
                    "id": e.id,
                    "timestamp": e.metadata.timestamp,
                    "date": e.metadata.date,
                    "projectRoot": e.metadata.project_root,
                    "fileCount": e.metadata.file_count,
                    "label": e.metadata.label,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&arr)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("no snapshots");
        return Ok(());
    }
    let now = now_ms();
    println!("{:<15} {:<26} {:>6}  {:<9} {}", "ID", "DATE", "FILES", "LABEL", "AGE");
    for e in &entries {
        println!(
            "{:<15} {:<26} {:>6}  {:<9} {}",
            e.id,
            e.metadata.date,
            e.metadata.file_count,
            e.metadata.label.to_string(),
            relative_time(e.metadata.timestamp, now)
        );
    }
    Ok(())
}
