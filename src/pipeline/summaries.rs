//! Summary generation: one request per table, strictly in order.
//!
//! Every table record leaves this stage with a `summary`: either generated
//! text or [`SummaryOutcome::Failed`], which is written as the failure
//! marker. A failed request or an unusable response affects only that
//! record.

use crate::config::PipelineConfig;
use crate::error::RecordError;
use crate::model::{ContentElement, SummaryOutcome};
use crate::output::StageReport;
use crate::pipeline::decode::decode_response;
use crate::progress::StageKind;
use crate::prompts::{summary_prompt, SUMMARY_SYSTEM_PROMPT};
use crate::provider::{chat_messages, completion_options};
use edgequake_llm::LLMProvider;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Summarise every table record in `records`, in place.
///
/// Never fails as a whole; per-record failures are counted in the report.
pub async fn generate_summaries(
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
    let total = table_indices.len();

    let mut report = StageReport {
        tables: total,
        ..Default::default()
    };

    if total == 0 {
        warn!("No table records to summarise");
        return report;
    }

    info!("Summarising {} tables with {}", total, provider.model());
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(StageKind::Summaries, total);
    }

    let options = completion_options(config.summary_temperature, config.json_mode);
    for (position, &idx) in table_indices.iter().enumerate() {
        let ordinal = position + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_table_start(ordinal, total);
        }
        debug!("Summarising table {}/{}", ordinal, total);

        let messages = chat_messages(SUMMARY_SYSTEM_PROMPT, summary_prompt(&records[idx]));

        report.requests += 1;
        let outcome = match provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                report.prompt_tokens += response.prompt_tokens as u64;
                report.completion_tokens += response.completion_tokens as u64;
                decode_summary(&response.content, ordinal, config.lenient_summaries)
            }
            Err(e) => Err(RecordError::Request {
                ordinal,
                detail: e.to_string(),
            }),
        };

        match &outcome {
            Ok(_) => {
                report.succeeded += 1;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_table_complete(ordinal, total);
                }
            }
            Err(e) => {
                report.failed += 1;
                error!("{}", e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_table_error(ordinal, total, &e.to_string());
                }
            }
        }

        records[idx].summary = Some(SummaryOutcome::from(outcome));
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(StageKind::Summaries, total, report.succeeded);
    }
    info!(
        "Summarised {}/{} tables in {}ms ({:.2}s per table)",
        report.succeeded,
        total,
        report.duration_ms,
        report.secs_per_table()
    );
    report
}

/// Pull the summary text out of a response.
///
/// Strict mode parses the whole response as JSON; lenient mode goes through
/// the multi-strategy decoder. Either way the text must be a non-blank string.
pub fn decode_summary(response: &str, ordinal: usize, lenient: bool) -> Result<String, RecordError> {
    let value = if lenient {
        decode_response(response, Some("summary")).map_err(|e| RecordError::Decode {
            ordinal,
            detail: e.to_string(),
        })?
    } else {
        let parsed: Value = serde_json::from_str(response).map_err(|e| RecordError::Decode {
            ordinal,
            detail: e.to_string(),
        })?;
        parsed
            .get("summary")
            .cloned()
            .ok_or(RecordError::MissingSummary { ordinal })?
    };

    match value {
        Value::String(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(RecordError::MissingSummary { ordinal }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SUMMARY_FAILURE_MARKER;
    use crate::progress::TableProgressCallback;
    use async_trait::async_trait;
    use edgequake_llm::{ChatMessage, CompletionOptions, LLMResponse, LlmError};
    use std::sync::Mutex;

    type Reply = Result<String, LlmError>;

    struct Scripted {
        replies: Mutex<Vec<Reply>>,
        seen: Mutex<Vec<(Vec<ChatMessage>, CompletionOptions)>>,
    }

    impl Scripted {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "qwen-plus"
        }

        fn max_context_length(&self) -> usize {
            32_000
        }

        async fn complete(&self, prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            self.complete_with_options(prompt, &CompletionOptions::default())
                .await
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], Some(options)).await
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.seen
                .lock()
                .unwrap()
                .push((messages.to_vec(), options.cloned().unwrap_or_default()));
            let reply = self.replies.lock().unwrap().pop().expect("no reply scripted");
            reply.map(|content| LLMResponse::new(content, "qwen-plus").with_usage(100, 20))
        }
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl TableProgressCallback for Events {
        fn on_table_start(&self, ordinal: usize, total: usize) {
            self.0.lock().unwrap().push(format!("start {ordinal}/{total}"));
        }
        fn on_table_complete(&self, ordinal: usize, total: usize) {
            self.0.lock().unwrap().push(format!("ok {ordinal}/{total}"));
        }
        fn on_table_error(&self, ordinal: usize, total: usize, _error: &str) {
            self.0.lock().unwrap().push(format!("err {ordinal}/{total}"));
        }
    }

    fn titled_tables(n: usize) -> Vec<ContentElement> {
        (0..n)
            .map(|i| {
                let mut t = ContentElement::table(format!("<table>{i}</table>"), i as u32);
                t.title = Some(format!("{}.表{}", i + 1, i));
                t
            })
            .collect()
    }

    #[test]
    fn strict_decoding() {
        assert_eq!(
            decode_summary(r#"{"summary": "该表展示了营业收入增长"}"#, 1, false).unwrap(),
            "该表展示了营业收入增长"
        );
        assert!(matches!(
            decode_summary(r#"{"other": 1}"#, 1, false),
            Err(RecordError::MissingSummary { ordinal: 1 })
        ));
        assert!(matches!(
            decode_summary(r#"{"summary": "   "}"#, 2, false),
            Err(RecordError::MissingSummary { ordinal: 2 })
        ));
        assert!(matches!(
            decode_summary("```json\n{\"summary\": \"x\"}\n```", 3, false),
            Err(RecordError::Decode { ordinal: 3, .. })
        ));
    }

    #[test]
    fn lenient_decoding_accepts_fences() {
        assert_eq!(
            decode_summary("```json\n{\"summary\": \"x\"}\n```", 1, true).unwrap(),
            "x"
        );
        assert!(decode_summary("nothing", 1, true).is_err());
    }

    #[test]
    fn non_string_summary_is_missing() {
        assert!(matches!(
            decode_summary(r#"{"summary": 12}"#, 1, false),
            Err(RecordError::MissingSummary { .. })
        ));
    }

    #[tokio::test]
    async fn failures_are_isolated_per_record() {
        let provider = Scripted::new(vec![
            Ok(r#"{"summary": "该表展示了2024年度营业收入"}"#.into()),
            Err(LlmError::ApiError("HTTP 500: overloaded".into())),
            Ok("not json".into()),
            Ok(r#"{"summary": "该表展示了现金流量"}"#.into()),
        ]);
        let dyn_provider: Arc<dyn LLMProvider> = provider.clone();
        let events = Arc::new(Events::default());
        let config = PipelineConfig::builder()
            .progress_callback(events.clone())
            .build()
            .unwrap();
        let mut records = titled_tables(4);

        let report = generate_summaries(&dyn_provider, &mut records, &config).await;

        let texts: Vec<&str> = records
            .iter()
            .map(|r| r.summary.as_ref().unwrap().as_text())
            .collect();
        assert_eq!(
            texts,
            vec![
                "该表展示了2024年度营业收入",
                SUMMARY_FAILURE_MARKER,
                SUMMARY_FAILURE_MARKER,
                "该表展示了现金流量"
            ]
        );
        assert!(records.iter().all(|r| r.title.is_some()));
        assert_eq!(report.tables, 4);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.requests, 4);
        assert_eq!(report.prompt_tokens, 300);

        assert_eq!(
            *events.0.lock().unwrap(),
            vec![
                "start 1/4", "ok 1/4", "start 2/4", "err 2/4", "start 3/4", "err 3/4",
                "start 4/4", "ok 4/4"
            ]
        );

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].0[0].content, SUMMARY_SYSTEM_PROMPT);
        assert_eq!(seen[0].1.temperature, Some(0.2));
        assert_eq!(seen[0].1.response_format.as_deref(), Some("json_object"));
        assert!(seen[1].0[1].content.contains("<table>1</table>"));
    }

    #[test]
    fn runs_on_a_blocking_executor() {
        let provider: Arc<dyn LLMProvider> =
            Scripted::new(vec![Ok(r#"{"summary": "单表"}"#.into())]);
        let mut records = titled_tables(1);
        let report = tokio_test::block_on(generate_summaries(
            &provider,
            &mut records,
            &PipelineConfig::default(),
        ));
        assert_eq!(report.succeeded, 1);
        assert_eq!(
            records[0].summary,
            Some(SummaryOutcome::Generated("单表".into()))
        );
    }

    #[tokio::test]
    async fn empty_input_sends_nothing() {
        let provider = Scripted::new(Vec::new());
        let dyn_provider: Arc<dyn LLMProvider> = provider.clone();
        let mut records: Vec<ContentElement> = Vec::new();
        let report =
            generate_summaries(&dyn_provider, &mut records, &PipelineConfig::default()).await;
        assert_eq!(report, StageReport::default());
        assert!(provider.seen.lock().unwrap().is_empty());
    }
}
