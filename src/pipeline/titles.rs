//! Title generation: one batched request names every table.
//!
//! The tables are sent together and the model answers with
//! `{"titles": {"0": "...", "1": "..."}}`. Each title is cleaned and written
//! back as `"{ordinal}.{title}"`, where the ordinal is the 1-based position
//! of the record among table records only.
//!
//! Very large documents are split into requests of at most
//! [`PipelineConfig::title_chunk_size`] tables; keys in each response are
//! local to its chunk and the written ordinal stays global. A failed request
//! or a response that cannot be decoded leaves its chunk's records exactly as
//! they were; the stage itself never fails.

use crate::config::PipelineConfig;
use crate::error::ExtractionError;
use crate::model::{ContentElement, TITLE_FAILURE_MARKER};
use crate::output::StageReport;
use crate::pipeline::decode::decode_response;
use crate::progress::StageKind;
use crate::prompts::{title_batch_prompt, TITLE_SYSTEM_PROMPT};
use crate::provider::{chat_messages, completion_options};
use edgequake_llm::LLMProvider;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Title every table record in `records`, in place.
///
/// Chunks whose request fails or whose response cannot be decoded are
/// counted as failed and left untitled.
pub async fn generate_titles(
    provider: &Arc<dyn LLMProvider>,
    records: &mut [ContentElement],
    config: &PipelineConfig,
) -> StageReport {
    let start = Instant::now();
    let table_indices: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_table())
        .map(|(i, _)| i)
        .collect();

    let mut report = StageReport {
        tables: table_indices.len(),
        ..Default::default()
    };

    if table_indices.is_empty() {
        warn!("No table records to title");
        return report;
    }

    let chunk_size = config.title_chunk_size.max(1);
    let batches = table_indices.len().div_ceil(chunk_size);
    info!(
        "Titling {} tables in {} request(s) with {}",
        table_indices.len(),
        batches,
        provider.model()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(StageKind::Titles, batches);
    }

    let options = completion_options(config.title_temperature, config.json_mode);
    for (batch_no, chunk) in table_indices.chunks(chunk_size).enumerate() {
        let offset = batch_no * chunk_size;
        let batch: Vec<ContentElement> = chunk
            .iter()
            .map(|&i| records[i].without_annotations())
            .collect();

        let messages = chat_messages(TITLE_SYSTEM_PROMPT, title_batch_prompt(&batch));

        report.requests += 1;
        let response = match provider.chat(&messages, Some(&options)).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    "Title batch {}/{} request failed, keeping records untitled: {}",
                    batch_no + 1,
                    batches,
                    e
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_title_batch(batch_no + 1, batches, 0);
                }
                continue;
            }
        };
        report.prompt_tokens += response.prompt_tokens as u64;
        report.completion_tokens += response.completion_tokens as u64;

        let titled = match decode_title_mapping(&response.content) {
            Ok(mapping) => {
                let mut titled = 0;
                for (local, &idx) in chunk.iter().enumerate() {
                    let raw = lookup_title(&mapping, local);
                    if raw.is_some() {
                        titled += 1;
                    }
                    let title = format_title(offset + local, raw.as_deref());
                    debug!("Table {}: {}", offset + local + 1, title);
                    records[idx].title = Some(title);
                }
                titled
            }
            Err(e) => {
                error!(
                    "Title batch {}/{} could not be decoded, keeping records untitled: {}",
                    batch_no + 1,
                    batches,
                    e
                );
                0
            }
        };

        report.succeeded += titled;
        if let Some(ref cb) = config.progress_callback {
            cb.on_title_batch(batch_no + 1, batches, titled);
        }
    }

    report.failed = report.tables - report.succeeded;
    report.duration_ms = start.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(StageKind::Titles, report.tables, report.succeeded);
    }
    info!(
        "Titled {}/{} tables in {}ms",
        report.succeeded, report.tables, report.duration_ms
    );
    report
}

/// Decode the `titles` object out of a model response.
pub fn decode_title_mapping(response: &str) -> Result<Map<String, Value>, ExtractionError> {
    match decode_response(response, Some("titles"))? {
        Value::Object(map) => Ok(map),
        _ => Err(ExtractionError {
            preview: response.chars().take(100).collect(),
            target_field: Some("titles".to_string()),
        }),
    }
}

/// Title for the chunk-local ordinal `local`. Numbers are stringified; other
/// non-string values count as missing.
fn lookup_title(mapping: &Map<String, Value>, local: usize) -> Option<String> {
    match mapping.get(&local.to_string())? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Remove whitespace (including full-width spaces and newlines) and Chinese
/// semicolons.
pub fn clean_title(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '；')
        .collect()
}

/// `"{ordinal + 1}.{cleaned}"`, using the failure marker when `raw` is `None`.
pub fn format_title(ordinal: usize, raw: Option<&str>) -> String {
    format!(
        "{}.{}",
        ordinal + 1,
        clean_title(raw.unwrap_or(TITLE_FAILURE_MARKER))
    )
}
