//! Step-level progress for [`crate::enrich`].
//!
//! A run is one derivation step followed by one join step per region
//! layer. The CLI renders these with `indicatif`; library callers that do
//! not care pass [`null_progress`].

use std::sync::Arc;

/// Receives step updates from an enrichment run.
///
/// Shared as `Arc<dyn ProgressCallback>`, so implementations must be
/// `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Number of steps the run will take (layers + 1).
    fn set_total(&self, total: u64);

    /// Marks `delta` more steps as done.
    fn inc(&self, delta: u64);

    /// Names the step now running, e.g. `"Joining precinct"`.
    fn set_message(&self, msg: String);

    /// Ends a successful run with a summary line.
    fn finish(&self, msg: String);

    /// Ends an aborted run without leaving a summary behind.
    fn finish_and_clear(&self);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
