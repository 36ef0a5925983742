//! Progress-callback trait for per-group and per-stage run events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through a directory.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a terminal spinner, a log, or a job record
//! without the library knowing anything about how the host application
//! reports progress. Groups are processed one at a time, so events for a
//! given group always arrive in order: start, stages, complete.
//!
//! # Example
//!
//! ```rust
//! use edgequake_studygen::{PipelineConfig, RunProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl RunProgressCallback for CountingCallback {
//!     fn on_group_complete(&self, label: &str, success: bool, _message: &str) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("#{n} {label}: {}", if success { "ok" } else { "failed" });
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::runner::Stage;
use std::sync::Arc;

/// Called by the orchestrator and stage runner as work progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait RunProgressCallback: Send + Sync {
    /// Called once after discovery, before any group runs.
    ///
    /// # Arguments
    /// * `total_groups`: number of file groups found
    fn on_run_start(&self, total_groups: usize) {
        let _ = total_groups;
    }

    /// Called before a source's stages run.
    ///
    /// # Arguments
    /// * `label`: human-readable source name (`lecture1.mp4`, `week2/ (4 images)`)
    /// * `total_steps`: number of stages that will be considered
    fn on_group_start(&self, label: &str, total_steps: usize) {
        let _ = (label, total_steps);
    }

    /// Called when a stage begins doing real work (not for skipped stages).
    fn on_stage_start(&self, label: &str, stage: Stage) {
        let _ = (label, stage);
    }

    /// Called after a stage finished or was skipped because its output exists.
    fn on_stage_complete(&self, label: &str, stage: Stage, skipped: bool) {
        let _ = (label, stage, skipped);
    }

    /// Called once a source has a final result.
    ///
    /// # Arguments
    /// * `success`: `false` if any required stage failed
    /// * `message`: the result's human-readable message
    fn on_group_complete(&self, label: &str, success: bool, message: &str) {
        let _ = (label, success, message);
    }

    /// Called once after all three passes.
    fn on_run_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
