//! Error types for the tablesnap library.
//!
//! Three error types map onto three failure scopes:
//!
//! * [`TableSnapError`] is **fatal**: the stage cannot run at all (missing
//!   configuration, malformed input JSON, unwritable output). Returned as
//!   `Err(TableSnapError)` from every file-level entry point in
//!   [`crate::convert`]; no output file is written when it occurs.
//!
//! * [`ExtractionError`]: the response decoder ran out of strategies. The
//!   caller decides what that means: the title stage keeps the untitled
//!   records, the summary stage marks a single record as failed.
//!
//! * [`RecordError`] is **non-fatal**: one table's summary could not be
//!   produced. Stored in [`crate::model::SummaryOutcome::Failed`] and written
//!   out as the failure marker, so the rest of the batch is unaffected.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the tablesnap library.
#[derive(Debug, Error)]
pub enum TableSnapError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// The API configuration file does not exist.
    #[error("Configuration file not found: '{path}'\nCreate it with an 'api' section holding 'key' and 'base_url', or pass --api-key/--base-url.")]
    ConfigNotFound { path: PathBuf },

    /// The configuration file exists but is unreadable or lacks required keys.
    #[error("Invalid configuration file '{path}': {detail}")]
    ConfigInvalid { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// Input is not valid JSON, has the wrong shape, or an element lacks `type`.
    #[error("Malformed input '{path}': {detail}")]
    MalformedInput { path: PathBuf, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The chat provider for a model could not be built.
    #[error("LLM provider for model '{model}' is not configured.\n{hint}")]
    ProviderNotConfigured { model: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The response decoder exhausted every strategy without recovering JSON.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("no valid JSON{} recoverable from response: {preview:?}", field_suffix(.target_field))]
pub struct ExtractionError {
    /// First 100 characters of the response text.
    pub preview: String,
    /// Field the caller asked for, if any.
    pub target_field: Option<String>,
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(f) => format!(" or field '{f}'"),
        None => String::new(),
    }
}

/// A non-fatal error for a single table record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// The chat call failed.
    #[error("Table {ordinal}: request failed: {detail}")]
    Request { ordinal: usize, detail: String },

    /// The response was not the expected JSON.
    #[error("Table {ordinal}: response could not be decoded: {detail}")]
    Decode { ordinal: usize, detail: String },

    /// The response parsed but carried no usable `summary`.
    #[error("Table {ordinal}: response has no summary text")]
    MissingSummary { ordinal: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_error_mentions_field() {
        let e = ExtractionError {
            preview: "hello".into(),
            target_field: Some("titles".into()),
        };
        let msg = e.to_string();
        assert!(msg.contains("field 'titles'"), "got: {msg}");
        assert!(msg.contains("hello"));
    }

    #[test]
    fn extraction_error_without_field() {
        let e = ExtractionError {
            preview: "x".into(),
            target_field: None,
        };
        assert!(!e.to_string().contains("field"));
    }

    #[test]
    fn config_not_found_display() {
        let e = TableSnapError::ConfigNotFound {
            path: PathBuf::from("config.yaml"),
        };
        assert!(e.to_string().contains("config.yaml"));
    }

    #[test]
    fn record_error_display() {
        let e = RecordError::MissingSummary { ordinal: 3 };
        assert!(e.to_string().contains("Table 3"));
    }

    #[test]
    fn provider_not_configured_names_model() {
        let e = TableSnapError::ProviderNotConfigured {
            model: "qwen-plus".into(),
            hint: "bad header".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("qwen-plus"));
        assert!(msg.contains("bad header"));
    }
}
