//! File-level entry points, one per stage, plus the full pipeline.
//!
//! Each function reads its input file, runs one stage, and writes the
//! result next to the input following the [`crate::naming`] chain (or to an
//! explicit output path). Fatal errors return before anything is written.

use crate::config::PipelineConfig;
use crate::error::TableSnapError;
use crate::files::{read_content_list, read_tables, write_atomic, write_json};
use crate::model::TablesDocument;
use crate::naming::{next_path, Stage};
use crate::output::{PipelineReport, StageReport};
use crate::pipeline::{extract, render, summaries, titles};
use crate::provider::build_provider;
use edgequake_llm::LLMProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};

/// Indent of the origin-tables file.
const ORIGIN_TABLES_INDENT: &[u8] = b"    ";

/// Indent of the titles and summaries files.
const DOCUMENT_INDENT: &[u8] = b"  ";

fn output_or_default(input: &Path, output: Option<&Path>, from: Stage) -> PathBuf {
    output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| next_path(input, from))
}

/// Resolve the provider for `model`, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`): used as-is, whatever the
///    model.
/// 2. **API configuration**: the config file plus any key/base-URL
///    overrides, turned into an edgequake-llm OpenAI-compatible provider
///    bound to `model`.
///
/// Missing or malformed configuration is fatal.
pub fn resolve_provider(
    config: &PipelineConfig,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, TableSnapError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let api = config.api()?;
    let provider = build_provider(&api, model, config.api_timeout_secs)?;
    info!("Using {} at {}", model, api.base_url);
    Ok(provider)
}

/// Content list → origin-tables file.
pub fn extract_tables_file(
    content_list: impl AsRef<Path>,
    output: Option<&Path>,
) -> Result<StageReport, TableSnapError> {
    let start = Instant::now();
    let input = content_list.as_ref();
    let _span = info_span!("extract", input = %input.display()).entered();

    let elements = read_content_list(input)?;
    let tables = extract::extract_tables(elements);

    let out = output_or_default(input, output, Stage::ContentList);
    write_json(&out, &tables, ORIGIN_TABLES_INDENT)?;
    info!("Extracted {} tables to {}", tables.len(), out.display());

    Ok(StageReport {
        tables: tables.len(),
        succeeded: tables.len(),
        duration_ms: start.elapsed().as_millis() as u64,
        output_path: Some(out),
        ..Default::default()
    })
}

/// Origin-tables file → titles file.
pub async fn generate_titles_file(
    origin_tables: impl AsRef<Path>,
    output: Option<&Path>,
    config: &PipelineConfig,
) -> Result<StageReport, TableSnapError> {
    let input = origin_tables.as_ref();
    let provider = resolve_provider(config, &config.title_model)?;
    titles_with_provider(&provider, input, output, config).await
}

async fn titles_with_provider(
    provider: &Arc<dyn LLMProvider>,
    input: &Path,
    output: Option<&Path>,
    config: &PipelineConfig,
) -> Result<StageReport, TableSnapError> {
    let span = info_span!("titles", input = %input.display());
    async {
        let mut records = read_tables(input)?;
        let mut report = titles::generate_titles(provider, &mut records, config).await;

        let out = output_or_default(input, output, Stage::OriginTables);
        write_json(&out, &TablesDocument::from(records), DOCUMENT_INDENT)?;
        info!(
            "Titles written to {} ({}/{} titled)",
            out.display(),
            report.succeeded,
            report.tables
        );
        report.output_path = Some(out);
        Ok(report)
    }
    .instrument(span)
    .await
}

/// Titles file → summaries file.
pub async fn generate_summaries_file(
    table_titles: impl AsRef<Path>,
    output: Option<&Path>,
    config: &PipelineConfig,
) -> Result<StageReport, TableSnapError> {
    let input = table_titles.as_ref();
    let provider = resolve_provider(config, &config.summary_model)?;
    summaries_with_provider(&provider, input, output, config).await
}

async fn summaries_with_provider(
    provider: &Arc<dyn LLMProvider>,
    input: &Path,
    output: Option<&Path>,
    config: &PipelineConfig,
) -> Result<StageReport, TableSnapError> {
    let span = info_span!("summaries", input = %input.display());
    async {
        let mut records = read_tables(input)?;
        let mut report = summaries::generate_summaries(provider, &mut records, config).await;

        let out = output_or_default(input, output, Stage::TableTitles);
        write_json(&out, &TablesDocument::from(records), DOCUMENT_INDENT)?;
        info!(
            "Summaries written to {} ({}/{} generated)",
            out.display(),
            report.succeeded,
            report.tables
        );
        report.output_path = Some(out);
        Ok(report)
    }
    .instrument(span)
    .await
}

/// Summaries file → Markdown document.
pub fn render_markdown_file(
    table_summaries: impl AsRef<Path>,
    output: Option<&Path>,
) -> Result<StageReport, TableSnapError> {
    let start = Instant::now();
    let input = table_summaries.as_ref();
    let _span = info_span!("render", input = %input.display()).entered();

    let records = read_tables(input)?;
    let markdown = render::render_markdown(&records);

    let out = output_or_default(input, output, Stage::TableSummaries);
    write_atomic(&out, markdown.as_bytes())?;
    info!("Rendered {} tables to {}", records.len(), out.display());

    Ok(StageReport {
        tables: records.len(),
        succeeded: records.len(),
        duration_ms: start.elapsed().as_millis() as u64,
        output_path: Some(out),
        ..Default::default()
    })
}

/// Run every stage on a content list, writing each intermediate file next
/// to it.
///
/// Both providers are resolved first, so a configuration problem aborts the
/// run before any file is written. Past that point request failures only
/// leave tables untitled or tagged with the summary failure marker.
pub async fn run_pipeline(
    content_list: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineReport, TableSnapError> {
    run_stages(content_list.as_ref(), None, config).await
}

/// Like [`run_pipeline`], but writes the Markdown document to `output`
/// instead of next to the input. Intermediate files stay next to the input.
pub async fn run_pipeline_to_file(
    content_list: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineReport, TableSnapError> {
    run_stages(content_list.as_ref(), Some(output.as_ref()), config).await
}

async fn run_stages(
    input: &Path,
    markdown_output: Option<&Path>,
    config: &PipelineConfig,
) -> Result<PipelineReport, TableSnapError> {
    let title_provider = resolve_provider(config, &config.title_model)?;
    let summary_provider = resolve_provider(config, &config.summary_model)?;
    info!("Starting pipeline: {}", input.display());

    let extract = extract_tables_file(input, None)?;
    let origin = next_path(input, Stage::ContentList);

    let titles = titles_with_provider(&title_provider, &origin, None, config).await?;
    let titled = next_path(&origin, Stage::OriginTables);

    let summaries = summaries_with_provider(&summary_provider, &titled, None, config).await?;
    let summarised = next_path(&titled, Stage::TableTitles);

    let render = render_markdown_file(&summarised, markdown_output)?;

    info!(
        "Pipeline complete: {} tables, {} titled, {} summarised",
        extract.tables, titles.succeeded, summaries.succeeded
    );
    Ok(PipelineReport {
        extract,
        titles,
        summaries,
        render,
    })
}

/// Synchronous wrapper around [`run_pipeline`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_pipeline_sync(
    content_list: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineReport, TableSnapError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TableSnapError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_pipeline(content_list, config))
}
