//! Per-stage run statistics.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What one stage did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Table records the stage handled.
    pub tables: usize,
    /// Records that received a generated title or summary.
    pub succeeded: usize,
    /// Records left untitled or marked with the failure marker.
    pub failed: usize,
    /// Chat requests issued.
    pub requests: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub duration_ms: u64,
    /// File the stage wrote, when run through [`crate::convert`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl StageReport {
    /// Average wall-clock seconds per table, or 0 when there were none.
    pub fn secs_per_table(&self) -> f64 {
        if self.tables == 0 {
            0.0
        } else {
            self.duration_ms as f64 / 1000.0 / self.tables as f64
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Reports of a full [`crate::convert::run_pipeline`] run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub extract: StageReport,
    pub titles: StageReport,
    pub summaries: StageReport,
    pub render: StageReport,
}

impl PipelineReport {
    /// Path of the final Markdown document.
    pub fn markdown_path(&self) -> Option<&PathBuf> {
        self.render.output_path.as_ref()
    }
}
