//! Chat-model plumbing on top of `edgequake-llm`.
//!
//! Stages talk to the model through `Arc<dyn LLMProvider>`, so tests and
//! library users can plug in their own implementation. The shipped
//! implementation is edgequake-llm's [`OpenAICompatibleProvider`], which
//! speaks the OpenAI `/chat/completions` protocol that most hosted model
//! gateways (DashScope, DeepSeek, vLLM, LiteLLM) accept with only a base URL
//! and key. One provider is built per model.

use crate::config::ApiConfig;
use crate::error::TableSnapError;
use edgequake_llm::model_config::{ProviderConfig, ProviderType};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, OpenAICompatibleProvider};
use std::collections::HashMap;
use std::sync::Arc;

/// Name reported by providers built from the API configuration.
pub const PROVIDER_NAME: &str = "tablesnap";

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// `response_format` value asking for a strict JSON object.
const JSON_OBJECT_FORMAT: &str = "json_object";

/// edgequake-llm settings for an OpenAI-compatible endpoint.
///
/// The key travels as an `Authorization` header because the provider only
/// reads keys from environment variables.
pub fn provider_config(api: &ApiConfig, model: &str, timeout_secs: Option<u64>) -> ProviderConfig {
    let headers = HashMap::from([(
        "Authorization".to_string(),
        format!("Bearer {}", api.key),
    )]);
    ProviderConfig {
        name: PROVIDER_NAME.to_string(),
        display_name: PROVIDER_NAME.to_string(),
        provider_type: ProviderType::OpenAICompatible,
        base_url: Some(api.base_url.clone()),
        default_llm_model: Some(model.to_string()),
        headers,
        timeout_seconds: timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        ..Default::default()
    }
}

/// Build a provider bound to `model`.
pub fn build_provider(
    api: &ApiConfig,
    model: &str,
    timeout_secs: Option<u64>,
) -> Result<Arc<dyn LLMProvider>, TableSnapError> {
    let provider = OpenAICompatibleProvider::from_config(provider_config(api, model, timeout_secs))
        .map_err(|e| TableSnapError::ProviderNotConfigured {
            model: model.to_string(),
            hint: e.to_string(),
        })?
        .with_model(model);
    Ok(Arc::new(provider))
}

/// A single system + user turn.
pub fn chat_messages(system: &str, user: impl Into<String>) -> Vec<ChatMessage> {
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Sampling options for one request.
pub fn completion_options(temperature: f32, json_mode: bool) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        response_format: json_mode.then(|| JSON_OBJECT_FORMAT.to_string()),
        ..Default::default()
    }
}
