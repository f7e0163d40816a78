//! Watch pipeline:
//! - aggregator.rs: raw filesystem events -> debounced ChangeBatch (notify + worker thread).
//! - session.rs: ChangeBatch -> classify -> AI_BURST snapshot; owns the daemon lock.

pub mod aggregator;
pub mod session;

pub use aggregator::{
    error_sink, flush_callback, log_errors, Aggregator, AggregatorOptions, ChangeKind,
    ErrorSink, FlushCallback,
};
pub use session::{BatchOutcome, BurstHandler, OutcomeCallback, WatchSession};
