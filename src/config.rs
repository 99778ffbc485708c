//! Configuration types for the assistant.
//!
//! All behaviour is controlled through [`AssistantConfig`], built via its
//! [`AssistantConfigBuilder`]. Credentials for the two external services are
//! read from the environment by [`AssistantConfig::from_env`]; their absence
//! is not checked here and surfaces later as a collaborator error.

use crate::error::WebRagError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default Firecrawl API root.
pub const DEFAULT_FIRECRAWL_BASE_URL: &str = "https://api.firecrawl.dev";

/// Default ColiVara API root.
pub const DEFAULT_COLIVARA_BASE_URL: &str = "https://api.colivara.com";

/// Prefix of the per-session retrieval collection name.
pub const DEFAULT_COLLECTION_PREFIX: &str = "webpage_collection";

/// Configuration for an [`crate::assistant::Assistant`].
///
/// # Example
/// ```rust
/// use edgequake_webrag::{AssistantConfig, Language};
///
/// let config = AssistantConfig::builder()
///     .work_dir("/tmp/webrag")
///     .language(Language::French)
///     .top_k(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.top_k, 5);
/// ```
#[derive(Clone)]
pub struct AssistantConfig {
    /// Directory receiving the screenshot PDF and uploaded files. Default: `.`.
    pub work_dir: PathBuf,

    /// Firecrawl API key (`FIRECRAWL_API_KEY`).
    pub firecrawl_api_key: Option<String>,

    /// ColiVara API key (`COLIVARA_API_KEY`).
    pub colivara_api_key: Option<String>,

    /// Firecrawl API root. Default: [`DEFAULT_FIRECRAWL_BASE_URL`].
    pub firecrawl_base_url: String,

    /// ColiVara API root. Default: [`DEFAULT_COLIVARA_BASE_URL`].
    pub colivara_base_url: String,

    /// How long the scraper waits for the page to settle before the
    /// full-page screenshot is taken. Default: 10 000 ms.
    pub scrape_wait_ms: u64,

    /// Timeout for the screenshot image download, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for scraping, indexing and search calls, in seconds. Default: 300.
    ///
    /// Indexing waits for the backend to embed every page, which takes far
    /// longer than a plain search.
    pub api_timeout_secs: u64,

    /// Prefix of the per-session collection name. Default: `webpage_collection`.
    pub collection_prefix: String,

    /// Number of page images retrieved per question. Default: 3.
    pub top_k: usize,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for answers. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per answer. Default: 2048.
    pub max_tokens: usize,

    /// Custom answer system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Language answers are requested in. Default: English.
    pub language: Language,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            firecrawl_api_key: None,
            colivara_api_key: None,
            firecrawl_base_url: DEFAULT_FIRECRAWL_BASE_URL.to_string(),
            colivara_base_url: DEFAULT_COLIVARA_BASE_URL.to_string(),
            scrape_wait_ms: 10_000,
            download_timeout_secs: 120,
            api_timeout_secs: 300,
            collection_prefix: DEFAULT_COLLECTION_PREFIX.to_string(),
            top_k: 3,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 2048,
            system_prompt: None,
            language: Language::default(),
        }
    }
}

impl fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("AssistantConfig")
            .field("work_dir", &self.work_dir)
            .field("firecrawl_api_key", &redact(&self.firecrawl_api_key))
            .field("colivara_api_key", &redact(&self.colivara_api_key))
            .field("firecrawl_base_url", &self.firecrawl_base_url)
            .field("colivara_base_url", &self.colivara_base_url)
            .field("scrape_wait_ms", &self.scrape_wait_ms)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("collection_prefix", &self.collection_prefix)
            .field("top_k", &self.top_k)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("language", &self.language)
            .finish()
    }
}

impl AssistantConfig {
    /// Create a new builder for `AssistantConfig`.
    pub fn builder() -> AssistantConfigBuilder {
        AssistantConfigBuilder {
            config: Self::default(),
        }
    }

    /// Default configuration with credentials and API roots taken from the
    /// process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.firecrawl_api_key = env_var("FIRECRAWL_API_KEY");
        config.colivara_api_key = env_var("COLIVARA_API_KEY");
        if let Some(url) = env_var("FIRECRAWL_BASE_URL") {
            config.firecrawl_base_url = url;
        }
        if let Some(url) = env_var("COLIVARA_BASE_URL") {
            config.colivara_base_url = url;
        }
        config
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Builder for [`AssistantConfig`].
#[derive(Debug)]
pub struct AssistantConfigBuilder {
    config: AssistantConfig,
}

impl AssistantConfigBuilder {
    /// Start from an existing configuration (e.g. [`AssistantConfig::from_env`]).
    pub fn from_config(config: AssistantConfig) -> Self {
        Self { config }
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn firecrawl_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.firecrawl_api_key = Some(key.into());
        self
    }

    pub fn colivara_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.colivara_api_key = Some(key.into());
        self
    }

    pub fn firecrawl_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.firecrawl_base_url = url.into();
        self
    }

    pub fn colivara_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.colivara_base_url = url.into();
        self
    }

    pub fn scrape_wait_ms(mut self, ms: u64) -> Self {
        self.config.scrape_wait_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn collection_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.collection_prefix = prefix.into();
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssistantConfig, WebRagError> {
        let c = &self.config;
        if c.top_k == 0 {
            return Err(WebRagError::InvalidConfig("top_k must be ≥ 1".into()));
        }
        if c.download_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(WebRagError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(WebRagError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        for (name, url) in [
            ("firecrawl_base_url", &c.firecrawl_base_url),
            ("colivara_base_url", &c.colivara_base_url),
        ] {
            if !crate::pipeline::url::is_valid_url(url) {
                return Err(WebRagError::InvalidConfig(format!(
                    "{name} is not an absolute URL: '{url}'"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Language the assistant is asked to answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Spanish,
    French,
    German,
    Chinese,
}

impl Language {
    /// Every selectable language, in menu order.
    pub const ALL: [Language; 5] = [
        Language::English,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Chinese,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::Chinese => "Chinese",
        }
    }

    /// Instruction prepended to every prompt sent downstream.
    ///
    /// Empty for English, which is the model's default answer language.
    pub fn instruction_prefix(self) -> String {
        match self {
            Language::English => String::new(),
            other => format!("Please respond in {}. ", other.name()),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Language {
    type Err = WebRagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| WebRagError::InvalidConfig(format!("Unsupported language '{s}'")))
    }
}
