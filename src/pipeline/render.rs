//! Markdown rendering of enriched table records.
//!
//! Each record becomes one section:
//!
//! ```text
//! # {title}
//! ## 表格总结            (only with a summary)
//! {summary}
//! ## 表格内容
//! **表格标题：{caption}** (only with a caption)
//! {table body without <html>/<body> wrappers}
//! **表格脚注：{footnote}** (only with a footnote)
//! ![表格截图]({img_path}) (only with an image)
//! ### *页码: {page_idx + 1}*  (page_idx 0 when absent)
//! ---
//! ```
//!
//! Rendering is a pure function of the records, so identical input always
//! yields byte-identical output.

use crate::model::ContentElement;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_WRAPPER_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?html>|</?body>").unwrap());

/// Render every record, in order, into one Markdown document.
pub fn render_markdown(records: &[ContentElement]) -> String {
    let mut out = String::new();
    for record in records {
        render_section(record, &mut out);
    }
    out
}

/// Append one record's section to `out`.
pub fn render_section(record: &ContentElement, out: &mut String) {
    out.push_str(&format!("# {}\n", record.title.as_deref().unwrap_or("")));

    if let Some(summary) = record.summary.as_ref().map(|s| s.as_text()) {
        if !summary.is_empty() {
            out.push_str("## 表格总结\n");
            out.push_str(&format!("{summary}\n\n"));
        }
    }

    out.push_str("## 表格内容\n");

    if let Some(caption) = record.caption() {
        out.push_str(&format!("**表格标题：{}**\n\n", caption.trim()));
    }

    let body = clean_table_body(record.table_body().unwrap_or(""));
    out.push_str(&format!("{body}\n\n"));

    if let Some(footnote) = record.footnote() {
        out.push_str(&format!("**表格脚注：{}**\n\n", footnote.trim()));
    }

    if let Some(img) = record.img_path().filter(|p| !p.is_empty()) {
        out.push_str(&format!("![表格截图]({img})\n\n"));
    }

    out.push_str(&format!(
        "### *页码: {}*\n\n",
        record.page_idx().unwrap_or(0) + 1
    ));
    out.push_str("---\n\n");
}

/// Strip `<html>`, `</html>`, `<body>`, `</body>` (exact, case-sensitive)
/// and trim surrounding whitespace.
pub fn clean_table_body(body: &str) -> String {
    RE_WRAPPER_TAGS.replace_all(body, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        SummaryOutcome, IMG_PATH_KEY, SUMMARY_FAILURE_MARKER, TABLE_CAPTION_KEY,
        TABLE_FOOTNOTE_KEY,
    };
    use serde_json::json;

    fn full_record() -> ContentElement {
        let mut r = ContentElement::table("<html><body><table>X</table></body></html>", 0);
        r.title = Some("1.2024年度合并损益表".into());
        r.summary = Some(SummaryOutcome::Generated("该表展示了收入增长。".into()));
        r.extra
            .insert(TABLE_CAPTION_KEY.into(), json!(["  综合收益表 ", "ignored"]));
        r.extra.insert(TABLE_FOOTNOTE_KEY.into(), json!(["单位：千美元"]));
        r.extra.insert(IMG_PATH_KEY.into(), json!("images/t1.jpg"));
        r
    }

    #[test]
    fn full_section_layout() {
        let md = render_markdown(&[full_record()]);
        let expected = "# 1.2024年度合并损益表\n\
                        ## 表格总结\n\
                        该表展示了收入增长。\n\n\
                        ## 表格内容\n\
                        **表格标题：综合收益表**\n\n\
                        <table>X</table>\n\n\
                        **表格脚注：单位：千美元**\n\n\
                        ![表格截图](images/t1.jpg)\n\n\
                        ### *页码: 1*\n\n\
                        ---\n\n";
        assert_eq!(md, expected);
    }

    #[test]
    fn wrapper_tags_removed_only() {
        assert_eq!(
            clean_table_body("<html><body><table>X</table></body></html>"),
            "<table>X</table>"
        );
        assert_eq!(
            clean_table_body("  <HTML><table><tr><td>body</td></tr></table>\n"),
            "<HTML><table><tr><td>body</td></tr></table>"
        );
    }

    #[test]
    fn optional_parts_omitted() {
        let mut r = ContentElement::table("<table>Y</table>", 5);
        r.extra.insert(TABLE_CAPTION_KEY.into(), json!([]));
        r.extra.insert(IMG_PATH_KEY.into(), json!(""));
        let md = render_markdown(&[r]);
        assert_eq!(
            md,
            "# \n## 表格内容\n<table>Y</table>\n\n### *页码: 6*\n\n---\n\n"
        );
    }

    #[test]
    fn absent_page_renders_as_first_page() {
        let r: ContentElement =
            serde_json::from_value(json!({"type": "table", "table_body": "<table/>", "img_path": null}))
                .unwrap();
        let md = render_markdown(&[r]);
        assert!(md.contains("### *页码: 1*\n\n"));
        assert!(!md.contains("表格截图"));
    }

    #[test]
    fn failed_summary_shows_marker() {
        let mut r = full_record();
        r.summary = Some(SummaryOutcome::Failed(None));
        let md = render_markdown(&[r]);
        assert!(md.contains(&format!("## 表格总结\n{SUMMARY_FAILURE_MARKER}\n\n")));
    }

    #[test]
    fn empty_summary_text_is_skipped() {
        let mut r = full_record();
        r.summary = Some(SummaryOutcome::Generated(String::new()));
        assert!(!render_markdown(&[r]).contains("表格总结"));
    }

    #[test]
    fn sections_in_input_order_and_idempotent() {
        let mut a = ContentElement::table("<table>A</table>", 0);
        a.title = Some("1.甲".into());
        let mut b = ContentElement::table("<table>B</table>", 2);
        b.title = Some("2.乙".into());
        let records = vec![a, b];
        let first = render_markdown(&records);
        assert!(first.find("# 1.甲").unwrap() < first.find("# 2.乙").unwrap());
        assert!(first.contains("页码: 3"));
        assert_eq!(first, render_markdown(&records));
    }

    #[test]
    fn no_records_no_output() {
        assert_eq!(render_markdown(&[]), "");
    }
}
