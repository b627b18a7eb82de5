//! AI text classifier glue.
//!
//! Wraps an optional [`Llm`] provider with the single call shape the
//! validator and matcher need, and enforces the request timeout. A missing
//! provider means no credentials are configured.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::ClassifierConfig;
use crate::error::{GateError, GateResult};
use crate::traits::{GenerationOptions, Llm, ResponseFormat};
use crate::types::Message;

/// One classifier call.
#[derive(Debug, Clone)]
pub struct ClassifierRequest<'a> {
    pub prompt: &'a str,
    pub system_instructions: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask for a JSON object when the provider supports it.
    pub expect_json: bool,
}

/// Untrusted, occasionally unavailable text classifier.
#[derive(Clone)]
pub struct Classifier {
    llm: Option<Arc<dyn Llm>>,
    timeout: Duration,
}

impl Classifier {
    /// Classifier backed by an LLM provider.
    pub fn new(llm: Arc<dyn Llm>, config: &ClassifierConfig) -> Self {
        Self {
            llm: Some(llm),
            timeout: config.timeout(),
        }
    }

    /// Classifier without credentials; every request fails with
    /// [`GateError::MissingCredentials`].
    pub fn unconfigured(config: &ClassifierConfig) -> Self {
        Self {
            llm: None,
            timeout: config.timeout(),
        }
    }

    /// Whether a provider is configured.
    pub fn has_credentials(&self) -> bool {
        self.llm.is_some()
    }

    /// Send a request and return the raw response text.
    pub async fn request(&self, request: ClassifierRequest<'_>) -> GateResult<String> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| GateError::MissingCredentials("no LLM provider configured".into()))?;

        let messages = [
            Message::system(request.system_instructions),
            Message::user(request.prompt),
        ];
        let options = GenerationOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            response_format: (request.expect_json && llm.supports_json_mode())
                .then_some(ResponseFormat::Json),
        };

        let timeout_ms = self.timeout.as_millis() as u64;
        let response = tokio::time::timeout(self.timeout, llm.generate(&messages, Some(options)))
            .await
            .map_err(|_| GateError::classifier_timeout(timeout_ms))??;

        let text = response.content_or_empty().trim().to_string();
        if text.is_empty() {
            return Err(GateError::malformed_response("classifier returned no text"));
        }
        debug!(model = llm.model_name(), chars = text.len(), "Classifier responded");
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted LLM used by unit tests across the crate.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::{GateError, GateResult};
    use crate::traits::{GenerationOptions, Llm, LlmResponse};
    use crate::types::Message;

    /// Replies with queued answers; repeats the last one when the queue runs dry.
    pub struct ScriptedLlm {
        replies: Mutex<Vec<Result<String, String>>>,
        last: Mutex<Option<Result<String, String>>>,
        delay: Duration,
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub fn replying(replies: &[&str]) -> Self {
            Self::with(replies.iter().map(|r| Ok(r.to_string())).collect())
        }

        pub fn failing(message: &str) -> Self {
            Self::with(vec![Err(message.to_string())])
        }

        pub fn with(replies: Vec<Result<String, String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                last: Mutex::new(None),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Llm for ScriptedLlm {
        async fn generate(
            &self,
            messages: &[Message],
            _options: Option<GenerationOptions>,
        ) -> GateResult<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(user) = messages.last() {
                self.prompts.lock().unwrap().push(user.content.clone());
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.replies.lock().unwrap().pop();
            let reply = match next {
                Some(reply) => {
                    *self.last.lock().unwrap() = Some(reply.clone());
                    reply
                }
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_else(|| Err("no scripted reply".to_string())),
            };
            reply
                .map(LlmResponse::text)
                .map_err(GateError::classifier)
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }
}
