//! Configuration system for intentgate.
//!
//! All timings are stored in milliseconds so that tests can shrink them to
//! a few ticks; accessors return [`Duration`]s.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::blocklist::PathRule;
use crate::error::{GateError, GateResult};
use crate::traits::LlmConfig;

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Anthropic,
}

/// Provider configuration with type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Provider type.
    pub provider: LlmProvider,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: LlmConfig,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            config: LlmConfig {
                model: "gpt-4.1-nano-2025-04-14".to_string(),
                ..Default::default()
            },
        }
    }
}

/// Intention store timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Lifetime of a per-domain intention record (default: 8 hours).
    pub record_ttl_ms: u64,
    /// Lifetime of the active intention between heartbeats (default: 90 seconds).
    pub active_ttl_ms: u64,
    /// Window in which a fresh submission suppresses a re-prompt (default: 10 seconds).
    pub just_set_window_ms: u64,
    /// Interval between expired-record sweeps in minutes (default: 60).
    pub cleanup_interval_minutes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            record_ttl_ms: 8 * 60 * 60 * 1000,
            active_ttl_ms: 90 * 1000,
            just_set_window_ms: 10 * 1000,
            cleanup_interval_minutes: 60,
        }
    }
}

impl StoreConfig {
    pub fn record_ttl(&self) -> Duration {
        Duration::from_millis(self.record_ttl_ms)
    }

    pub fn active_ttl(&self) -> Duration {
        Duration::from_millis(self.active_ttl_ms)
    }

    pub fn just_set_window(&self) -> Duration {
        Duration::from_millis(self.just_set_window_ms)
    }
}

/// Drift monitor timings and revocation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Delay before the first poll (default: 60 seconds).
    pub grace_period_ms: u64,
    /// Interval between polls (default: 30 seconds).
    pub poll_interval_ms: u64,
    /// Minimum monitored time before a revocation is possible (default: 5 minutes).
    pub revoke_after_ms: u64,
    /// Confidence below which a poll counts as drift (default: 0.1).
    pub revoke_confidence_floor: f32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 60 * 1000,
            poll_interval_ms: 30 * 1000,
            revoke_after_ms: 5 * 60 * 1000,
            revoke_confidence_floor: 0.1,
        }
    }
}

impl MonitorConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn revoke_after(&self) -> Duration {
        Duration::from_millis(self.revoke_after_ms)
    }
}

/// Intention validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Shorter submissions are rejected locally (default: 10 characters).
    pub min_length: usize,
    /// Token budget of the classifier answer.
    pub max_tokens: u32,
    /// Sampling temperature of the classifier.
    pub temperature: f32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_length: 10,
            max_tokens: 60,
            temperature: 0.0,
        }
    }
}

/// Content matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Confidence at or above which content matches the intention (default: 0.7).
    pub match_threshold: f32,
    /// Cap on extracted content sent to the classifier.
    pub max_content_chars: usize,
    /// Token budget of the classifier answer.
    pub max_tokens: u32,
    /// Sampling temperature of the classifier.
    pub temperature: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.7,
            max_content_chars: 2000,
            max_tokens: 150,
            temperature: 0.1,
        }
    }
}

/// Classifier transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Per-request timeout (default: 10 seconds).
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// What the interceptor does when evaluating a page fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Allow the page.
    #[default]
    Open,
    /// Show the intention prompt.
    Closed,
}

/// Interceptor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Pause between acceptance and the redirect (default: 2 seconds).
    pub confirmation_delay_ms: u64,
    /// Paths on blocked platforms that never prompt.
    pub path_allow_list: Vec<PathRule>,
    /// Behaviour when interception fails (default: open).
    pub on_error: FailurePolicy,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            confirmation_delay_ms: 2000,
            path_allow_list: PathRule::default_allow_list(),
            on_error: FailurePolicy::Open,
        }
    }
}

impl InterceptorConfig {
    pub fn confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.confirmation_delay_ms)
    }
}

/// Content extraction limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Maximum length of the extracted text.
    pub max_length: usize,
    /// Text blocks shorter than this are ignored by the generic extractor.
    pub min_block_length: usize,
    /// Number of ranked blocks the generic extractor keeps.
    pub top_blocks: usize,
    /// Timeout for fetching a page.
    pub fetch_timeout_ms: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_length: 1500,
            min_block_length: 20,
            top_blocks: 5,
            fetch_timeout_ms: 10_000,
        }
    }
}

/// Main intentgate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub store: StoreConfig,
    pub monitor: MonitorConfig,
    pub validator: ValidatorConfig,
    pub matcher: MatcherConfig,
    pub classifier: ClassifierConfig,
    pub interceptor: InterceptorConfig,
    pub extractor: ExtractorConfig,
    /// LLM configuration.
    pub llm: LlmProviderConfig,
    /// Directory holding the SQLite store.
    pub data_dir: PathBuf,
}

impl Default for GateConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".intentgate"))
            .unwrap_or_else(|| PathBuf::from(".intentgate"));

        Self {
            store: StoreConfig::default(),
            monitor: MonitorConfig::default(),
            validator: ValidatorConfig::default(),
            matcher: MatcherConfig::default(),
            classifier: ClassifierConfig::default(),
            interceptor: InterceptorConfig::default(),
            extractor: ExtractorConfig::default(),
            llm: LlmProviderConfig::default(),
            data_dir,
        }
    }
}

impl GateConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> GateResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| GateError::Configuration(e.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| GateError::Configuration(e.to_string()))
            }
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).map_err(|e| GateError::Configuration(e.to_string()))
            }
            _ => Err(GateError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads:
    /// - `INTENTGATE_DATA_DIR`
    /// - `INTENTGATE_RECORD_TTL_SECS`, `INTENTGATE_ACTIVE_TTL_SECS`
    /// - `INTENTGATE_GRACE_PERIOD_SECS`, `INTENTGATE_POLL_INTERVAL_SECS`
    /// - `INTENTGATE_MATCH_THRESHOLD`, `INTENTGATE_CLASSIFIER_TIMEOUT_MS`
    /// - `INTENTGATE_ON_ERROR` (`open` | `closed`)
    /// - `INTENTGATE_LLM_PROVIDER` (`openai` | `anthropic`), `INTENTGATE_LLM_MODEL`
    /// - `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` for the selected provider
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("INTENTGATE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = env_parse::<u64>("INTENTGATE_RECORD_TTL_SECS") {
            config.store.record_ttl_ms = secs * 1000;
        }
        if let Some(secs) = env_parse::<u64>("INTENTGATE_ACTIVE_TTL_SECS") {
            config.store.active_ttl_ms = secs * 1000;
        }
        if let Some(secs) = env_parse::<u64>("INTENTGATE_GRACE_PERIOD_SECS") {
            config.monitor.grace_period_ms = secs * 1000;
        }
        if let Some(secs) = env_parse::<u64>("INTENTGATE_POLL_INTERVAL_SECS") {
            config.monitor.poll_interval_ms = secs * 1000;
        }
        if let Some(threshold) = env_parse::<f32>("INTENTGATE_MATCH_THRESHOLD") {
            config.matcher.match_threshold = threshold.clamp(0.0, 1.0);
        }
        if let Some(ms) = env_parse::<u64>("INTENTGATE_CLASSIFIER_TIMEOUT_MS") {
            config.classifier.timeout_ms = ms;
        }
        if let Ok(policy) = std::env::var("INTENTGATE_ON_ERROR") {
            config.interceptor.on_error = match policy.to_lowercase().as_str() {
                "closed" => FailurePolicy::Closed,
                _ => FailurePolicy::Open,
            };
        }

        if let Ok(provider) = std::env::var("INTENTGATE_LLM_PROVIDER") {
            config.llm.provider = match provider.to_lowercase().as_str() {
                "anthropic" => LlmProvider::Anthropic,
                _ => LlmProvider::OpenAI,
            };
            if config.llm.provider == LlmProvider::Anthropic {
                config.llm.config.model = "claude-3-5-haiku-20241022".to_string();
            }
        }
        if let Ok(model) = std::env::var("INTENTGATE_LLM_MODEL") {
            config.llm.config.model = model;
        }
        let key_var = match config.llm.provider {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        };
        if let Ok(api_key) = std::env::var(key_var) {
            config.llm.config.api_key = Some(api_key);
        }

        config
    }

    /// Path of the SQLite store inside the data directory.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("intentions.db")
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::default()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Builder for GateConfig.
#[derive(Default)]
pub struct GateConfigBuilder {
    config: GateConfig,
}

impl GateConfigBuilder {
    /// Set store timings.
    pub fn store(mut self, config: StoreConfig) -> Self {
        self.config.store = config;
        self
    }

    /// Set monitor timings.
    pub fn monitor(mut self, config: MonitorConfig) -> Self {
        self.config.monitor = config;
        self
    }

    /// Set validator settings.
    pub fn validator(mut self, config: ValidatorConfig) -> Self {
        self.config.validator = config;
        self
    }

    /// Set matcher settings.
    pub fn matcher(mut self, config: MatcherConfig) -> Self {
        self.config.matcher = config;
        self
    }

    /// Set classifier settings.
    pub fn classifier(mut self, config: ClassifierConfig) -> Self {
        self.config.classifier = config;
        self
    }

    /// Set interceptor settings.
    pub fn interceptor(mut self, config: InterceptorConfig) -> Self {
        self.config.interceptor = config;
        self
    }

    /// Set extractor limits.
    pub fn extractor(mut self, config: ExtractorConfig) -> Self {
        self.config.extractor = config;
        self
    }

    /// Set LLM configuration.
    pub fn llm(mut self, config: LlmProviderConfig) -> Self {
        self.config.llm = config;
        self
    }

    /// Set the data directory.
    pub fn data_dir(mut self, path: PathBuf) -> Self {
        self.config.data_dir = path;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GateConfig {
        self.config
    }
}
