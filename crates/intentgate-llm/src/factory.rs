//! Factory for creating LLM providers.

use std::sync::Arc;

use intentgate_core::config::{LlmProvider, LlmProviderConfig};
use intentgate_core::error::{GateError, GateResult};
use intentgate_core::traits::{Llm, LlmConfig};
use secrecy::SecretString;

use crate::anthropic::AnthropicLlm;
use crate::openai::OpenAIProvider;

/// API key from the config, falling back to `env_var`.
pub(crate) fn resolve_api_key(config: &LlmConfig, env_var: &str) -> GateResult<SecretString> {
    config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.trim().is_empty()))
        .map(SecretString::new)
        .ok_or_else(|| {
            GateError::MissingCredentials(format!(
                "Set {} or provide api_key in the llm config",
                env_var
            ))
        })
}

/// Factory for creating LLM providers.
pub struct LlmFactory;

impl LlmFactory {
    /// Create an LLM provider from the given configuration.
    ///
    /// Fails with `GateError::MissingCredentials` when no API key is
    /// configured or present in the environment.
    pub fn create(provider: LlmProvider, config: LlmConfig) -> GateResult<Arc<dyn Llm>> {
        match provider {
            LlmProvider::OpenAI => Ok(Arc::new(OpenAIProvider::new(config)?)),
            LlmProvider::Anthropic => Ok(Arc::new(AnthropicLlm::new(config)?)),
        }
    }

    /// Create a provider from the `llm` section of the gate configuration.
    pub fn from_config(config: &LlmProviderConfig) -> GateResult<Arc<dyn Llm>> {
        Self::create(config.provider, config.config.clone())
    }

    /// Create an OpenAI LLM provider with default configuration.
    pub fn openai() -> GateResult<Arc<dyn Llm>> {
        Self::create(LlmProvider::OpenAI, LlmConfig::default())
    }

    /// Create an OpenAI LLM provider with a specific model.
    pub fn openai_with_model(model: impl Into<String>) -> GateResult<Arc<dyn Llm>> {
        let config = LlmConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(LlmProvider::OpenAI, config)
    }

    /// Create an Anthropic LLM provider with default configuration.
    pub fn anthropic() -> GateResult<Arc<dyn Llm>> {
        Self::create(LlmProvider::Anthropic, LlmConfig::default())
    }

    /// Create an Anthropic LLM provider with a specific model.
    pub fn anthropic_with_model(model: impl Into<String>) -> GateResult<Arc<dyn Llm>> {
        let config = LlmConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(LlmProvider::Anthropic, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_is_missing() {
        let config = LlmConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        let err = resolve_api_key(&config, "INTENTGATE_TEST_UNSET_KEY").unwrap_err();
        assert!(matches!(err, GateError::MissingCredentials(_)));
    }

    #[test]
    fn test_explicit_key_builds_provider() {
        let config = LlmConfig {
            model: "claude-3-5-haiku-20241022".to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let llm = LlmFactory::create(LlmProvider::Anthropic, config).unwrap();
        assert_eq!(llm.model_name(), "claude-3-5-haiku-20241022");
        assert!(!llm.supports_json_mode());
    }

    #[test]
    fn test_default_openai_model() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let llm = LlmFactory::create(LlmProvider::OpenAI, config).unwrap();
        assert_eq!(llm.model_name(), "gpt-4.1-nano-2025-04-14");
        assert!(llm.supports_json_mode());
    }
}
