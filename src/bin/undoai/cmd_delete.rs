use anyhow::Result;

use undoai::config::UndoConfig;
use undoai::snapshots::SnapshotStore;

pub fn exec(id: String) -> Result<()> {
    let cfg = UndoConfig::from_env();
    let store = SnapshotStore::open(&cfg.storage_root)?;
    store.delete_snapshot(id.trim())?;
    println!("delete: OK (id={})", id.trim());
    Ok(())
}
