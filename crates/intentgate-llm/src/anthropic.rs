//! Anthropic (Claude) LLM provider implementation.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use intentgate_core::error::{GateError, GateResult};
use intentgate_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, TokenUsage};
use intentgate_core::types::{Message, MessageRole};

use crate::factory::resolve_api_key;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Anthropic LLM provider.
pub struct AnthropicLlm {
    client: Client,
    config: LlmConfig,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

impl AnthropicLlm {
    /// Create a new Anthropic LLM provider.
    pub fn new(config: LlmConfig) -> GateResult<Self> {
        let api_key = resolve_api_key(&config, "ANTHROPIC_API_KEY")?;

        let mut key_header = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|_| GateError::Configuration("Invalid API key format".to_string()))?;
        key_header.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", key_header);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GateError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| ANTHROPIC_API_URL.to_string());

        let mut config = config;
        if config.model.is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn build_request(&self, messages: &[Message], options: &GenerationOptions) -> AnthropicRequest {
        // Anthropic takes the system prompt as a separate field.
        let system = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let messages = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| AnthropicMessage {
                role: match m.role {
                    MessageRole::Assistant => "assistant",
                    _ => "user",
                },
                content: m.content.clone(),
            })
            .collect();

        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: Some(options.temperature.unwrap_or(self.config.temperature)),
            system: (!system.is_empty()).then_some(system),
            messages,
        }
    }
}

#[async_trait]
impl Llm for AnthropicLlm {
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> GateResult<LlmResponse> {
        let request = self.build_request(messages, &options.unwrap_or_default());

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| GateError::classifier(format!("Anthropic API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GateError::classifier(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GateError::classifier(format!(
                "Anthropic API error ({}): {}",
                status, message
            )));
        }

        let response: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| GateError::malformed_response(format!("Failed to parse response: {}", e)))?;

        let content = response
            .content
            .iter()
            .find(|c| c.content_type == "text")
            .and_then(|c| c.text.clone());

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });
        debug!(model = %self.config.model, ?usage, "Anthropic response");

        Ok(LlmResponse { content, usage })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn supports_json_mode(&self) -> bool {
        false // Anthropic doesn't have a native JSON mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicLlm {
        AnthropicLlm::new(LlmConfig {
            api_key: Some("sk-ant-test".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_default_model() {
        assert_eq!(provider().model_name(), DEFAULT_MODEL);
    }

    #[test]
    fn test_system_prompt_moves_to_field() {
        let llm = provider();
        let request = llm.build_request(
            &[Message::system("be brief"), Message::user("Statement: \"x\"")],
            &GenerationOptions {
                max_tokens: Some(60),
                temperature: Some(0.0),
                ..Default::default()
            },
        );
        assert_eq!(request.system.as_deref(), Some("be brief"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.max_tokens, 60);
        assert_eq!(request.temperature, Some(0.0));
    }

    #[test]
    fn test_defaults_fill_missing_options() {
        let llm = provider();
        let request = llm.build_request(&[Message::user("hi")], &GenerationOptions::default());
        assert!(request.system.is_none());
        assert_eq!(request.max_tokens, 200);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_parse_text_block() {
        let body = r#"{"content":[{"type":"text","text":"Valid"}],"usage":{"input_tokens":12,"output_tokens":1}}"#;
        let parsed: AnthropicResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.content[0].text.as_deref(), Some("Valid"));
        assert_eq!(parsed.usage.unwrap().input_tokens, 12);
    }
}
