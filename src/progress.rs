//! Progress-callback trait for per-table stage events.
//!
//! Inject an [`Arc<dyn TableProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the LLM-backed stages work through the tables. The CLI uses it
//! to drive its progress bar; library users can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use tablesnap::{PipelineConfig, TableProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl TableProgressCallback for CountingCallback {
//!     fn on_table_complete(&self, ordinal: usize, total: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("table {}/{} done", ordinal, total);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn TableProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Which stage is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Titles,
    Summaries,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Titles => f.write_str("titles"),
            StageKind::Summaries => f.write_str("summaries"),
        }
    }
}

/// Called by the LLM-backed stages as they work.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Ordinals are 1-based positions among table records.
pub trait TableProgressCallback: Send + Sync {
    /// Called once before the first request of a stage.
    ///
    /// `total` counts tables for summaries and requests for titles.
    fn on_stage_start(&self, stage: StageKind, total: usize) {
        let _ = (stage, total);
    }

    /// Called just before a summary request is sent.
    fn on_table_start(&self, ordinal: usize, total: usize) {
        let _ = (ordinal, total);
    }

    /// Called when a table's summary was generated.
    fn on_table_complete(&self, ordinal: usize, total: usize) {
        let _ = (ordinal, total);
    }

    /// Called when a table's summary failed and was marked.
    fn on_table_error(&self, ordinal: usize, total: usize, error: &str) {
        let _ = (ordinal, total, error);
    }

    /// Called after each title request, successful or not.
    fn on_title_batch(&self, batch: usize, batches: usize, titled: usize) {
        let _ = (batch, batches, titled);
    }

    /// Called once after a stage has finished.
    fn on_stage_complete(&self, stage: StageKind, total: usize, succeeded: usize) {
        let _ = (stage, total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TableProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn TableProgressCallback>;
