//! # tablesnap
//!
//! Turn the tables found in a parsed financial report into a readable
//! Markdown document, with an LLM-written title and summary per table.
//!
//! ## Why this crate?
//!
//! PDF layout analysers emit a flat "content list" of every element on every
//! page. The tables in it are raw HTML with no stable names, so they are hard
//! to skim or search. This crate keeps only the tables, asks a chat model for
//! one compact Chinese title per table (one batched request) and one short
//! analysis per table, and renders every table as a Markdown section.
//!
//! ## Pipeline Overview
//!
//! ```text
//! {base}_content_list.json
//!  │
//!  ├─ 1. Extract    keep type == "table"       → {base}_origin_tables.json
//!  ├─ 2. Titles     one batched chat request   → {base}_table_titles.json
//!  ├─ 3. Summaries  one chat request per table → {base}_table_summaries.json
//!  └─ 4. Render     fixed section template     → {base}_表格.md
//! ```
//!
//! Every stage reads the previous stage's file and can be run on its own.
//! Requests are sent strictly one at a time.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tablesnap::{run_pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials come from config.yaml: an `api` section with `key` and `base_url`
//!     let config = PipelineConfig::default();
//!     let report = run_pipeline("report_content_list.json", &config).await?;
//!     eprintln!(
//!         "{} tables, {} summarised",
//!         report.extract.tables, report.summaries.succeeded
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tablesnap` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Failure handling
//!
//! A missing or malformed input or configuration file aborts the stage
//! before anything is written. A failed title request leaves its tables
//! untitled. A failed summary affects only its table, which is written with
//! the [`SUMMARY_FAILURE_MARKER`] instead.
//!
//! ## Providers
//!
//! Requests go through `edgequake_llm::LLMProvider`. By default one
//! OpenAI-compatible provider is built per model from the configuration
//! file; pass your own with [`PipelineConfigBuilder::provider`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod files;
pub mod model;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ApiConfig, PipelineConfig, PipelineConfigBuilder, DEFAULT_CONFIG_PATH};
pub use convert::{
    extract_tables_file, generate_summaries_file, generate_titles_file, render_markdown_file,
    resolve_provider, run_pipeline, run_pipeline_sync, run_pipeline_to_file,
};
pub use error::{ExtractionError, RecordError, TableSnapError};
pub use model::{
    ContentElement, SummaryOutcome, TablesDocument, SUMMARY_FAILURE_MARKER, TABLE_TYPE,
    TITLE_FAILURE_MARKER,
};
pub use naming::Stage;
pub use output::{PipelineReport, StageReport};
pub use pipeline::decode::decode_response;
pub use progress::{NoopProgressCallback, ProgressCallback, StageKind, TableProgressCallback};
pub use provider::{build_provider, chat_messages, completion_options};
