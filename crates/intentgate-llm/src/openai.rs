//! OpenAI LLM provider implementation.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::debug;

use intentgate_core::error::{GateError, GateResult};
use intentgate_core::traits::{
    GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat, TokenUsage,
};
use intentgate_core::types::{Message, MessageRole};

use crate::factory::resolve_api_key;

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
        ResponseFormat as OpenAIResponseFormat,
    },
    Client,
};

const DEFAULT_MODEL: &str = "gpt-4.1-nano-2025-04-14";

/// OpenAI LLM provider.
pub struct OpenAIProvider {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: LlmConfig,
}

impl OpenAIProvider {
    /// Create a new OpenAI LLM provider.
    pub fn new(config: LlmConfig) -> GateResult<Self> {
        let api_key = resolve_api_key(&config, "OPENAI_API_KEY")?;

        #[cfg(feature = "openai")]
        let client = {
            let openai_config = OpenAIConfig::new().with_api_key(api_key.expose_secret());
            let openai_config = match config.base_url {
                Some(ref base_url) => openai_config.with_api_base(base_url),
                None => openai_config,
            };
            Client::with_config(openai_config)
        };
        #[cfg(not(feature = "openai"))]
        let _ = api_key;

        let mut config = config;
        if config.model.is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    /// Reasoning models reject sampling parameters.
    fn is_reasoning_model(&self) -> bool {
        let model_lower = self.config.model.to_lowercase();
        ["o1", "o3", "o4", "gpt-5"]
            .iter()
            .any(|m| model_lower.starts_with(m))
    }

    #[cfg(feature = "openai")]
    fn message_to_openai(msg: &Message) -> ChatCompletionRequestMessage {
        match msg.role {
            MessageRole::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            MessageRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            MessageRole::Assistant => {
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    ..Default::default()
                })
            }
        }
    }

    #[cfg(feature = "openai")]
    fn build_request(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> CreateChatCompletionRequest {
        let mut request = CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(Self::message_to_openai).collect(),
            ..Default::default()
        };

        if !self.is_reasoning_model() {
            request.temperature = Some(options.temperature.unwrap_or(self.config.temperature));
            request.max_tokens = Some(options.max_tokens.unwrap_or(self.config.max_tokens));
        }
        request.response_format = match options.response_format {
            Some(ResponseFormat::Json) => Some(OpenAIResponseFormat::JsonObject),
            Some(ResponseFormat::Text) => Some(OpenAIResponseFormat::Text),
            None => None,
        };
        request
    }
}

#[async_trait]
impl Llm for OpenAIProvider {
    #[cfg(feature = "openai")]
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> GateResult<LlmResponse> {
        let request = self.build_request(messages, &options.unwrap_or_default());

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| GateError::classifier(format!("OpenAI API error: {}", e)))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| GateError::malformed_response("No response choices returned"))?;

        let content = choice.message.content.clone();

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        debug!(model = %self.config.model, ?usage, "OpenAI response");

        Ok(LlmResponse { content, usage })
    }

    #[cfg(not(feature = "openai"))]
    async fn generate(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> GateResult<LlmResponse> {
        Err(GateError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn supports_json_mode(&self) -> bool {
        true
    }
}
