//! Prompts for the title and summary stages.
//!
//! Every instruction sent to the model lives here so the stage modules only
//! deal with request flow and decoding, and tests can inspect the exact
//! wording without a model.

use crate::model::ContentElement;

/// System message for the batched title request.
pub const TITLE_SYSTEM_PROMPT: &str = "你是财务报告智能处理系统，生成紧凑无空格的中文标题";

/// System message for each summary request.
pub const SUMMARY_SYSTEM_PROMPT: &str = "你是财务分析师，擅长提炼表格核心信息";

/// Build the user message asking for one title per table.
///
/// The model is asked for `{"titles": {"0": "...", "1": "..."}}`, keyed by
/// the 0-based position of each table within `tables`.
pub fn title_batch_prompt(tables: &[ContentElement]) -> String {
    let listing = serde_json::to_string_pretty(tables).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"请为以下{count}个财务表格生成唯一标题，严格按照JSON格式返回：
{{
  "titles": {{
    "0": "表格1标题",
    "1": "表格2标题"
  }}
}}

标题要求：
1. 10-20个连续中文字符（不要使用空格或符号分隔）
2. 包含关键财务指标（如合并损益表/资产负债表等）
3. 体现时间范围（2024年度/2023-2024等）
4. 业务板块信息（如有：方便面/饮料/其他业务）

表格数据列表：
{listing}"#,
        count = tables.len(),
    )
}

/// Build the user message asking for a 100–200 character summary of one table.
pub fn summary_prompt(table: &ContentElement) -> String {
    let table_data = serde_json::to_string(table).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"请分析以下财务表格，生成包含以下要素的100-200字摘要：
1. 表格主要内容（损益/资产负债/现金流等）
2. 关键数据指标（收入/利润/增长率等）
3. 时间范围对比（如有）
4. 业务板块表现（如有）
5. 重要财务比率（如有）

要求：
- 使用专业财务术语但保持简洁
- 突出关键数据变化
- 避免重复表格标题内容

表格数据：
{table_data}

请返回JSON格式：
{{
    "summary": "该表展示......"
}}"#
    )
}
