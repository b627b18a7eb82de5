//! Intention validation.
//!
//! A submission shorter than the configured minimum is rejected locally.
//! Everything else goes to the classifier; any classifier failure, an
//! unreadable answer, or missing credentials accepts the submission.

use tracing::{debug, warn};

use crate::classifier::{Classifier, ClassifierRequest};
use crate::config::ValidatorConfig;
use crate::parse::{parse_validation_response, ValidationParse};
use crate::prompts::{validation_prompt, VALIDATION_SYSTEM_PROMPT};

/// Reason shown for submissions rejected by the local length rule.
pub const TOO_SHORT_REASON: &str =
    "Please describe what you want to do on this site in a few more words.";

/// Reason shown when the classifier rejects without giving one.
pub const GENERIC_INVALID_REASON: &str =
    "That doesn't sound like a specific purpose. What exactly do you want to do here?";

/// What produced a validation verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationSource {
    /// The local minimum-length rule.
    LengthRule,
    /// A readable classifier answer.
    Classifier,
    /// The classifier was unavailable or unreadable; accepted by default.
    FailedOpen { cause: String },
}

/// Result of validating an intention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    /// Reason shown to the user on rejection.
    pub reason: Option<String>,
    pub source: ValidationSource,
}

impl ValidationOutcome {
    fn accepted(source: ValidationSource) -> Self {
        Self {
            is_valid: true,
            reason: None,
            source,
        }
    }

    fn rejected(reason: impl Into<String>, source: ValidationSource) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
            source,
        }
    }
}

/// Classifies freeform text as an acceptable intention.
#[derive(Clone)]
pub struct IntentionValidator {
    classifier: Classifier,
    config: ValidatorConfig,
}

impl IntentionValidator {
    pub fn new(classifier: Classifier, config: ValidatorConfig) -> Self {
        Self { classifier, config }
    }

    /// Validate a submission. Never fails.
    pub async fn validate(&self, text: &str) -> ValidationOutcome {
        let text = text.trim();
        if text.chars().count() < self.config.min_length {
            debug!(len = text.chars().count(), "Intention rejected by length rule");
            return ValidationOutcome::rejected(TOO_SHORT_REASON, ValidationSource::LengthRule);
        }

        let prompt = validation_prompt(text);
        let response = match self
            .classifier
            .request(ClassifierRequest {
                prompt: &prompt,
                system_instructions: VALIDATION_SYSTEM_PROMPT,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                expect_json: false,
            })
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Validation unavailable, accepting intention");
                return ValidationOutcome::accepted(ValidationSource::FailedOpen {
                    cause: e.to_string(),
                });
            }
        };

        match parse_validation_response(&response) {
            ValidationParse::Valid => ValidationOutcome::accepted(ValidationSource::Classifier),
            ValidationParse::Invalid { reason } => {
                debug!(reason = ?reason, "Intention rejected by classifier");
                ValidationOutcome::rejected(
                    reason.unwrap_or_else(|| GENERIC_INVALID_REASON.to_string()),
                    ValidationSource::Classifier,
                )
            }
            ValidationParse::Unparsable { raw } => {
                warn!(response = %raw, "Unreadable validation answer, accepting intention");
                ValidationOutcome::accepted(ValidationSource::FailedOpen {
                    cause: "unparsable classifier response".to_string(),
                })
            }
        }
    }
}
