//! Data model shared by every pipeline stage.
//!
//! A [`ContentElement`] is one item of the layout analyser's content list.
//! Table elements travel through the whole pipeline as the same struct,
//! picking up a `title` and then a `summary` on the way; the stage files are
//! just serialisations of `Vec<ContentElement>`.
//!
//! Every source field (`table_body`, `page_idx`, `text`, bounding boxes, …)
//! is kept in [`ContentElement::extra`] and written back unchanged.

use crate::error::RecordError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Element type consumed by the pipeline.
pub const TABLE_TYPE: &str = "table";

/// Written as the title when the model returned nothing for a table.
pub const TITLE_FAILURE_MARKER: &str = "标题生成失败";

/// Written as the summary when a table's request or decoding failed.
pub const SUMMARY_FAILURE_MARKER: &str = "分析生成失败";

/// Source keys the renderer reads.
pub const TABLE_BODY_KEY: &str = "table_body";
pub const TABLE_CAPTION_KEY: &str = "table_caption";
pub const TABLE_FOOTNOTE_KEY: &str = "table_footnote";
pub const IMG_PATH_KEY: &str = "img_path";
pub const PAGE_IDX_KEY: &str = "page_idx";

/// One typed element of a PDF's extracted structure; once it is a table it
/// doubles as the table record annotated by later stages.
///
/// Only the pipeline's own keys are typed. Source fields stay in
/// [`ContentElement::extra`] exactly as read, explicit `null`s included, and
/// are read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentElement {
    /// Element kind (`"text"`, `"image"`, `"table"`, …). Required.
    #[serde(rename = "type")]
    pub element_type: String,

    /// Every other key of the source object, preserved verbatim and in
    /// source order.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// `"{ordinal}.{text}"`, assigned by the title stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Assigned by the summary stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryOutcome>,
}

impl ContentElement {
    /// Create a bare table element on the given page.
    pub fn table(table_body: impl Into<String>, page_idx: u32) -> Self {
        let mut extra = Map::new();
        extra.insert(TABLE_BODY_KEY.to_string(), Value::String(table_body.into()));
        extra.insert(PAGE_IDX_KEY.to_string(), Value::from(page_idx));
        Self {
            element_type: TABLE_TYPE.to_string(),
            extra,
            title: None,
            summary: None,
        }
    }

    pub fn is_table(&self) -> bool {
        self.element_type == TABLE_TYPE
    }

    /// HTML fragment of the table.
    pub fn table_body(&self) -> Option<&str> {
        self.extra.get(TABLE_BODY_KEY).and_then(Value::as_str)
    }

    /// First caption line.
    pub fn caption(&self) -> Option<&str> {
        first_text(self.extra.get(TABLE_CAPTION_KEY))
    }

    /// First footnote line.
    pub fn footnote(&self) -> Option<&str> {
        first_text(self.extra.get(TABLE_FOOTNOTE_KEY))
    }

    /// Relative path of the rendered table image.
    pub fn img_path(&self) -> Option<&str> {
        self.extra.get(IMG_PATH_KEY).and_then(Value::as_str)
    }

    /// Zero-based page number, when the source carried one.
    pub fn page_idx(&self) -> Option<u64> {
        self.extra.get(PAGE_IDX_KEY).and_then(Value::as_u64)
    }

    /// A copy with the pipeline's own annotations removed, i.e. the element
    /// as the layout analyser produced it.
    pub fn without_annotations(&self) -> Self {
        Self {
            title: None,
            summary: None,
            ..self.clone()
        }
    }
}

/// First entry of a list of lines; a bare string counts as one line.
fn first_text(value: Option<&Value>) -> Option<&str> {
    match value? {
        Value::Array(items) => items.first().and_then(Value::as_str),
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// Result of summarising one table.
///
/// Serialises to a plain string: the generated text, or
/// [`SUMMARY_FAILURE_MARKER`] for a failure. Reading a file back maps the
/// marker to `Failed` again.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    Generated(String),
    Failed(Option<RecordError>),
}

impl SummaryOutcome {
    /// Text written to JSON and Markdown.
    pub fn as_text(&self) -> &str {
        match self {
            SummaryOutcome::Generated(text) => text,
            SummaryOutcome::Failed(_) => SUMMARY_FAILURE_MARKER,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SummaryOutcome::Failed(_))
    }
}

impl From<Result<String, RecordError>> for SummaryOutcome {
    fn from(result: Result<String, RecordError>) -> Self {
        match result {
            Ok(text) => SummaryOutcome::Generated(text),
            Err(e) => SummaryOutcome::Failed(Some(e)),
        }
    }
}

impl Serialize for SummaryOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_text())
    }
}

impl<'de> Deserialize<'de> for SummaryOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text == SUMMARY_FAILURE_MARKER {
            Ok(SummaryOutcome::Failed(None))
        } else {
            Ok(SummaryOutcome::Generated(text))
        }
    }
}

/// On-disk shape of the titles and summaries files: `{"tables": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TablesDocument {
    #[serde(default)]
    pub tables: Vec<ContentElement>,
}

impl From<Vec<ContentElement>> for TablesDocument {
    fn from(tables: Vec<ContentElement>) -> Self {
        Self { tables }
    }
}
