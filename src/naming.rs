//! Stage file naming.
//!
//! Every intermediate file keeps the document's base name and swaps a fixed
//! suffix, so each stage can find its input from the previous stage's path
//! alone:
//!
//! ```text
//! report_content_list.json → report_origin_tables.json → report_table_titles.json
//!   → report_table_summaries.json → report_表格.md
//! ```

use std::path::{Path, PathBuf};

/// A file in the stage chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Layout analyser output (root array of content elements).
    ContentList,
    /// Table elements only.
    OriginTables,
    /// Tables with titles.
    TableTitles,
    /// Tables with titles and summaries.
    TableSummaries,
    /// Final Markdown document.
    Markdown,
}

impl Stage {
    /// Suffix appended to the document base name.
    pub fn suffix(self) -> &'static str {
        match self {
            Stage::ContentList => "_content_list",
            Stage::OriginTables => "_origin_tables",
            Stage::TableTitles => "_table_titles",
            Stage::TableSummaries => "_table_summaries",
            Stage::Markdown => "_表格",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Stage::Markdown => "md",
            _ => "json",
        }
    }

    /// The stage whose file this stage's output feeds.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::ContentList => Some(Stage::OriginTables),
            Stage::OriginTables => Some(Stage::TableTitles),
            Stage::TableTitles => Some(Stage::TableSummaries),
            Stage::TableSummaries => Some(Stage::Markdown),
            Stage::Markdown => None,
        }
    }
}

/// Document base name of `path`: the file stem with the `from` suffix removed
/// when it ends with it exactly.
pub fn base_name(path: &Path, from: Stage) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.strip_suffix(from.suffix()) {
        Some(base) => base.to_string(),
        None => stem,
    }
}

/// Path of the `to` stage file next to `input`, which belongs to `from`.
pub fn derive_path(input: &Path, from: Stage, to: Stage) -> PathBuf {
    let file_name = format!("{}{}.{}", base_name(input, from), to.suffix(), to.extension());
    match input.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Path of the file the stage after `from` writes for `input`.
///
/// `Stage::Markdown` has no successor; its own path is returned unchanged.
pub fn next_path(input: &Path, from: Stage) -> PathBuf {
    match from.next() {
        Some(to) => derive_path(input, from, to),
        None => input.to_path_buf(),
    }
}
