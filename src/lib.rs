// Базовые модули
pub mod error;
pub mod config;
pub mod metrics;
pub mod patterns;
pub mod lock;

// Захват: codec -> batch -> burst -> snapshots
pub mod codec;
pub mod batch;
pub mod burst;
pub mod snapshots; // src/snapshots/{mod,meta,store}.rs

// Наблюдение и восстановление
pub mod watch;     // src/watch/{mod,aggregator,session}.rs
pub mod restore;

// Удобные реэкспорты
pub use batch::ChangeBatch;
pub use burst::{classify, ImportantFiles, Reason, Verdict};
pub use config::UndoConfig;
pub use error::{undo_error, UndoError};
pub use lock::DaemonLock;
pub use restore::{execute, plan_restore, FileSelector, RestorePlan, RestoreReport};
pub use snapshots::{SnapshotEntry, SnapshotLabel, SnapshotMetadata, SnapshotStore};
pub use watch::{Aggregator, AggregatorOptions, BatchOutcome, WatchSession};
