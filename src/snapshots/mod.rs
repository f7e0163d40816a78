//! Snapshots module split into submodules:
//! - meta.rs: SnapshotMetadata / SnapshotLabel and metadata.json I/O.
//! - store.rs: SnapshotStore (create/restore/list/delete/size over <root>/snapshots).

pub mod meta;
pub mod store;

pub use meta::{SnapshotLabel, SnapshotMetadata};
pub use store::{ensure_same_project, SnapshotEntry, SnapshotStore};
