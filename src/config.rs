//! Configuration types for the table pipeline.
//!
//! Two layers:
//!
//! * [`ApiConfig`]: the endpoint credentials, read from a YAML file with an
//!   `api` section holding `key` and `base_url`, and optionally overridden
//!   from the command line or environment. JSON files load too, since YAML
//!   is a superset of JSON.
//! * [`PipelineConfig`]: every behavioural knob (models, temperatures,
//!   chunking, decoding mode), built via [`PipelineConfigBuilder`].

use crate::error::TableSnapError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Default location of the API configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Endpoint credentials for the chat-completion API.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub key: String,
    pub base_url: String,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    api: Option<ApiSection>,
}

#[derive(Debug, Deserialize)]
struct ApiSection {
    key: Option<String>,
    base_url: Option<String>,
}

impl ApiConfig {
    /// Load `api.key` and `api.base_url` from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableSnapError> {
        Self::resolve(path, None, None)
    }

    /// Load from `path`, letting explicit overrides win over file values.
    ///
    /// When both overrides are given the file is not read at all.
    pub fn resolve(
        path: impl AsRef<Path>,
        key_override: Option<String>,
        base_url_override: Option<String>,
    ) -> Result<Self, TableSnapError> {
        let path = path.as_ref();
        let key_override = key_override.filter(|k| !k.trim().is_empty());
        let base_url_override = base_url_override.filter(|u| !u.trim().is_empty());

        if let (Some(key), Some(base_url)) = (&key_override, &base_url_override) {
            debug!("API configuration taken from overrides");
            return Ok(Self {
                key: key.clone(),
                base_url: base_url.clone(),
            });
        }

        let section = read_api_section(path)?;
        let invalid = |detail: &str| TableSnapError::ConfigInvalid {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        };

        let key = key_override
            .or(section.key)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| invalid("missing 'api.key'"))?;
        let base_url = base_url_override
            .or(section.base_url)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| invalid("missing 'api.base_url'"))?;

        debug!("API configuration loaded from {}", path.display());
        Ok(Self { key, base_url })
    }
}

fn read_api_section(path: &Path) -> Result<ApiSection, TableSnapError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TableSnapError::ConfigNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(TableSnapError::ConfigInvalid {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })
        }
    };

    let file: ConfigFile =
        serde_yaml::from_str(&raw).map_err(|e| TableSnapError::ConfigInvalid {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    file.api.ok_or_else(|| TableSnapError::ConfigInvalid {
        path: path.to_path_buf(),
        detail: "missing 'api' section".into(),
    })
}

// ── Pipeline configuration ───────────────────────────────────────────────

/// Behaviour of the LLM-backed stages.
///
/// # Example
/// ```rust
/// use tablesnap::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .title_model("deepseek-v3")
///     .title_chunk_size(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.title_chunk_size, 30);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Path of the API configuration file. Default: `config.yaml`.
    pub config_path: PathBuf,

    /// Overrides for the file's `api.key` / `api.base_url`.
    pub api_key: Option<String>,
    pub base_url: Option<String>,

    /// Model used for the batched title request. Default: `deepseek-v3`.
    pub title_model: String,

    /// Model used for per-table summaries. Default: `qwen-plus`.
    pub summary_model: String,

    /// Default: 0.1.
    pub title_temperature: f32,

    /// Default: 0.2.
    pub summary_temperature: f32,

    /// Request `response_format: json_object`. Default: true.
    pub json_mode: bool,

    /// Maximum tables per title request. Default: 50.
    ///
    /// Documents with at most this many tables are titled in one request.
    pub title_chunk_size: usize,

    /// Decode summary responses with the multi-strategy decoder instead of a
    /// direct JSON parse. Default: false.
    pub lenient_summaries: bool,

    /// Per-request HTTP timeout. `None` uses 120 seconds. Default: None.
    pub api_timeout_secs: Option<u64>,

    /// Pre-constructed provider used for both stages. Takes precedence over
    /// the API configuration and the model names.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Receives per-table progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            api_key: None,
            base_url: None,
            title_model: "deepseek-v3".to_string(),
            summary_model: "qwen-plus".to_string(),
            title_temperature: 0.1,
            summary_temperature: 0.2,
            json_mode: true,
            title_chunk_size: 50,
            lenient_summaries: false,
            api_timeout_secs: None,
            provider: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("config_path", &self.config_path)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("title_model", &self.title_model)
            .field("summary_model", &self.summary_model)
            .field("title_temperature", &self.title_temperature)
            .field("summary_temperature", &self.summary_temperature)
            .field("json_mode", &self.json_mode)
            .field("title_chunk_size", &self.title_chunk_size)
            .field("lenient_summaries", &self.lenient_summaries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "provider",
                &self
                    .provider
                    .as_ref()
                    .map(|p| format!("{}/{}", p.name(), p.model())),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn TableProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve the API credentials this configuration points at.
    pub fn api(&self) -> Result<ApiConfig, TableSnapError> {
        ApiConfig::resolve(
            &self.config_path,
            self.api_key.clone(),
            self.base_url.clone(),
        )
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = path.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn title_model(mut self, model: impl Into<String>) -> Self {
        self.config.title_model = model.into();
        self
    }

    pub fn summary_model(mut self, model: impl Into<String>) -> Self {
        self.config.summary_model = model.into();
        self
    }

    pub fn title_temperature(mut self, t: f32) -> Self {
        self.config.title_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn summary_temperature(mut self, t: f32) -> Self {
        self.config.summary_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn json_mode(mut self, v: bool) -> Self {
        self.config.json_mode = v;
        self
    }

    pub fn title_chunk_size(mut self, n: usize) -> Self {
        self.config.title_chunk_size = n;
        self
    }

    pub fn lenient_summaries(mut self, v: bool) -> Self {
        self.config.lenient_summaries = v;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, TableSnapError> {
        let c = &self.config;
        if c.title_chunk_size == 0 {
            return Err(TableSnapError::InvalidConfig(
                "title chunk size must be ≥ 1".into(),
            ));
        }
        if c.title_model.trim().is_empty() || c.summary_model.trim().is_empty() {
            return Err(TableSnapError::InvalidConfig(
                "model names must not be empty".into(),
            ));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(TableSnapError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
