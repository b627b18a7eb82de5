//! Host capabilities the interceptor drives: rendering the blocking prompt,
//! navigation, and the entitlement check.

use async_trait::async_trait;
use serde::Serialize;

use crate::conflict::ConflictPrompt;
use crate::error::GateResult;

/// Content of the full-page intention capture form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockingPrompt {
    /// Normalized domain being gated.
    pub domain: String,
    /// URL the user tried to open; restored after acceptance.
    pub original_url: String,
    /// Rejection reason from the last submission, shown inline.
    pub error: Option<String>,
    /// Submission in flight; the form must not accept another one.
    pub submitting: bool,
    /// Confirmation shown between acceptance and the redirect.
    pub confirmation: Option<String>,
    /// The domain accepts a bare number as a timed pass.
    pub accepts_minutes: bool,
}

impl BlockingPrompt {
    /// Create an empty prompt for a domain.
    pub fn new(domain: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            original_url: original_url.into(),
            error: None,
            submitting: false,
            confirmation: None,
            accepts_minutes: false,
        }
    }
}

/// Rendering and navigation surface of one page context.
///
/// `show_blocking_prompt` replaces the whole document; it is not a
/// dismissible layer.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Replace the page with the intention capture form.
    async fn show_blocking_prompt(&self, prompt: &BlockingPrompt) -> GateResult<()>;

    /// Present the three explicit conflict choices.
    async fn show_conflict(&self, conflict: &ConflictPrompt) -> GateResult<()>;

    /// Remove any prompt the gate rendered.
    async fn clear_prompt(&self) -> GateResult<()>;

    /// Navigate the page context to a URL.
    async fn navigate(&self, url: &str) -> GateResult<()>;

    /// Go back one entry in the page context's history.
    async fn history_back(&self) -> GateResult<()>;
}

/// Subscription entitlement check.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntitlementChecker: Send + Sync {
    /// Whether the user is entitled to the blocking feature.
    async fn has_access(&self) -> GateResult<bool>;
}

/// Entitlement checker with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticEntitlement(pub bool);

#[async_trait]
impl EntitlementChecker for StaticEntitlement {
    async fn has_access(&self) -> GateResult<bool> {
        Ok(self.0)
    }
}
