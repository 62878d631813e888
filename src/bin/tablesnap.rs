//! CLI binary for tablesnap.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig`, runs one stage (or all of them) and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tablesnap::{
    extract_tables_file, generate_summaries_file, generate_titles_file, render_markdown_file,
    run_pipeline, run_pipeline_to_file, PipelineConfig, ProgressCallback, StageKind, StageReport,
    TableProgressCallback, DEFAULT_CONFIG_PATH,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar per LLM stage plus a log line per
/// summarised table.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the table currently being summarised.
    table_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading tables…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            table_started: Mutex::new(None),
        })
    }

    /// Clear whatever is on screen; a no-op when a stage already did.
    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    /// Switch to the full progress-bar style once `total` is known.
    fn activate_bar(&self, stage: StageKind, total: usize) {
        let unit = match stage {
            StageKind::Titles => "requests",
            StageKind::Summaries => "tables",
        };
        let progress_style = ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.reset();
        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix(match stage {
            StageKind::Titles => "Titling",
            StageKind::Summaries => "Summarising",
        });
    }

    fn take_elapsed(&self) -> f64 {
        self.table_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl TableProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: StageKind, total: usize) {
        self.activate_bar(stage, total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting {stage} ({total})…"))
        ));
    }

    fn on_table_start(&self, ordinal: usize, _total: usize) {
        if let Ok(mut t) = self.table_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(format!("table {ordinal}"));
    }

    fn on_table_complete(&self, ordinal: usize, total: usize) {
        let secs = self.take_elapsed();
        self.bar.println(format!(
            "  {} Table {:>3}/{:<3}  {}",
            green("✓"),
            ordinal,
            total,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_table_error(&self, ordinal: usize, total: usize, error: &str) {
        let secs = self.take_elapsed();
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Table {:>3}/{:<3}  {}  {}",
            red("✗"),
            ordinal,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_title_batch(&self, batch: usize, batches: usize, titled: usize) {
        self.bar.println(format!(
            "  {} Request {:>3}/{:<3}  {}",
            green("✓"),
            batch,
            batches,
            dim(&format!("{titled} titled")),
        ));
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: StageKind, total: usize, succeeded: usize) {
        let failed = total.saturating_sub(succeeded);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!("{} {stage}: {} ok", green("✔"), bold(&succeeded.to_string()));
        } else {
            eprintln!(
                "{} {stage}: {}/{} ok  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full run: writes every intermediate file next to the input
  tablesnap run report/康师傅2024_content_list.json

  # Individual stages
  tablesnap extract   report/康师傅2024_content_list.json
  tablesnap titles    report/康师傅2024_origin_tables.json
  tablesnap summaries report/康师傅2024_table_titles.json
  tablesnap render    report/康师傅2024_table_summaries.json -o 康师傅2024.md

  # Different models, chunked title requests
  tablesnap --title-model qwen-max --title-chunk-size 30 run x_content_list.json

FILES:
  {base}_content_list.json    → {base}_origin_tables.json
  {base}_origin_tables.json   → {base}_table_titles.json
  {base}_table_titles.json    → {base}_table_summaries.json
  {base}_table_summaries.json → {base}_表格.md

CONFIGURATION (config.yaml, JSON also accepted):
  api:
    key: sk-...
    base_url: https://dashscope.aliyuncs.com/compatible-mode/v1

ENVIRONMENT VARIABLES:
  TABLESNAP_CONFIG        Path of the configuration file
  TABLESNAP_API_KEY       Overrides api.key
  TABLESNAP_BASE_URL      Overrides api.base_url
  RUST_LOG                tracing filter (overrides -v / -q)
"#;

/// Title, summarise and render the tables of a parsed report.
#[derive(Parser, Debug)]
#[command(
    name = "tablesnap",
    version,
    about = "Turn the tables of a parsed report into titled, summarised Markdown",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API configuration file ({"api": {"key", "base_url"}}).
    #[arg(long, global = true, env = "TABLESNAP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// API key; overrides the configuration file.
    #[arg(long, global = true, env = "TABLESNAP_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API base URL; overrides the configuration file.
    #[arg(long, global = true, env = "TABLESNAP_BASE_URL")]
    base_url: Option<String>,

    /// Model for the batched title request.
    #[arg(long, global = true, env = "TABLESNAP_TITLE_MODEL", default_value = "deepseek-v3")]
    title_model: String,

    /// Model for per-table summaries.
    #[arg(long, global = true, env = "TABLESNAP_SUMMARY_MODEL", default_value = "qwen-plus")]
    summary_model: String,

    /// Maximum tables per title request.
    #[arg(long, global = true, env = "TABLESNAP_TITLE_CHUNK_SIZE", default_value_t = 50,
          value_parser = clap::value_parser!(u64).range(1..))]
    title_chunk_size: u64,

    /// Recover summaries from fenced or noisy responses.
    #[arg(long, global = true, env = "TABLESNAP_LENIENT_SUMMARIES")]
    lenient_summaries: bool,

    /// Per-request LLM timeout in seconds (default: HTTP client default).
    #[arg(long, global = true, env = "TABLESNAP_API_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    api_timeout: Option<u64>,

    /// Disable progress bar.
    #[arg(long, global = true, env = "TABLESNAP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TABLESNAP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "TABLESNAP_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep the table elements of a content list.
    Extract(StageArgs),
    /// Give every table a numbered title (one request).
    Titles(StageArgs),
    /// Write an analysis for every table (one request per table).
    Summaries(StageArgs),
    /// Render the summarised tables as Markdown.
    Render(StageArgs),
    /// Run extract, titles, summaries and render in sequence.
    Run(StageArgs),
}

impl Command {
    fn uses_llm(&self) -> bool {
        matches!(self, Command::Titles(_) | Command::Summaries(_) | Command::Run(_))
    }
}

#[derive(Args, Debug)]
struct StageArgs {
    /// Input file of the stage.
    input: PathBuf,

    /// Output path (default: derived from the input name).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for the LLM stages.
    let show_progress = !cli.quiet && !cli.no_progress && cli.command.uses_llm();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn TableProgressCallback>);

    let outcome = async {
        let config = build_config(&cli, progress_cb)?;
        run_command(&cli, &config).await
    }
    .await;

    // Stages that send no requests or fail early never finish the bar.
    if let Some(ref cb) = cli_progress {
        cb.finish();
    }
    outcome
}

async fn run_command(cli: &Cli, config: &PipelineConfig) -> Result<()> {
    match &cli.command {
        Command::Extract(args) => {
            let report = extract_tables_file(&args.input, args.output.as_deref())
                .context("Extraction failed")?;
            if !cli.quiet {
                print_stage("extract", &report);
            }
        }
        Command::Titles(args) => {
            let report = generate_titles_file(&args.input, args.output.as_deref(), config)
                .await
                .context("Title generation failed")?;
            if !cli.quiet {
                print_stage("titles", &report);
                print_tokens(&report);
            }
        }
        Command::Summaries(args) => {
            let report = generate_summaries_file(&args.input, args.output.as_deref(), config)
                .await
                .context("Summary generation failed")?;
            if !cli.quiet {
                print_stage("summaries", &report);
                print_tokens(&report);
            }
        }
        Command::Render(args) => {
            let report = render_markdown_file(&args.input, args.output.as_deref())
                .context("Rendering failed")?;
            if !cli.quiet {
                print_stage("render", &report);
            }
        }
        Command::Run(args) => {
            let report = match args.output {
                Some(ref out) => run_pipeline_to_file(&args.input, out, config).await,
                None => run_pipeline(&args.input, config).await,
            }
            .context("Pipeline failed")?;

            if !cli.quiet {
                print_stage("extract", &report.extract);
                print_stage("titles", &report.titles);
                print_stage("summaries", &report.summaries);
                print_stage("render", &report.render);
                eprintln!(
                    "   {} tokens in  /  {} tokens out",
                    dim(&(report.titles.prompt_tokens + report.summaries.prompt_tokens).to_string()),
                    dim(&(report.titles.completion_tokens + report.summaries.completion_tokens)
                        .to_string()),
                );
            }
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .config_path(cli.config.clone())
        .title_model(cli.title_model.clone())
        .summary_model(cli.summary_model.clone())
        .title_chunk_size(cli.title_chunk_size as usize)
        .lenient_summaries(cli.lenient_summaries);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// One summary line per stage: success count, timing and output path.
fn print_stage(stage: &str, report: &StageReport) {
    let path = report
        .output_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    eprintln!(
        "{}  {:<9} {}/{} tables  {}ms  ({:.2}s/table)  →  {}",
        if report.failed == 0 { green("✔") } else { cyan("⚠") },
        stage,
        report.succeeded,
        report.tables,
        report.duration_ms,
        report.secs_per_table(),
        bold(&path),
    );
}

fn print_tokens(report: &StageReport) {
    eprintln!(
        "   {} tokens in  /  {} tokens out  ({} requests)",
        dim(&report.prompt_tokens.to_string()),
        dim(&report.completion_tokens.to_string()),
        report.requests,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_subcommand_uses_yaml_config_by_default() {
        let cli = Cli::try_parse_from(["tablesnap", "run", "r_content_list.json"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert!(cli.command.uses_llm());
    }

    #[test]
    fn finish_clears_spinner_without_stage_events() {
        let cb = CliProgressCallback::new();
        assert!(!cb.bar.is_finished());
        cb.finish();
        assert!(cb.bar.is_finished());
        cb.finish();
    }
}
