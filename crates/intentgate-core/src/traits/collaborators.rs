//! Small collaborator traits consumed by the resolver, matcher and monitor.

use async_trait::async_trait;

use crate::error::GateResult;

/// Source of the user's blocked-site overrides.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OverrideSource: Send + Sync {
    /// Domains present in the override set.
    async fn overrides(&self) -> GateResult<Vec<String>>;
}

/// Site-aware text extraction for the page currently shown at `url`.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extract the text used for intention matching.
    async fn extract(&self, url: &str) -> GateResult<String>;
}

/// Something that can re-run interception for a page.
#[async_trait]
pub trait Regate: Send + Sync {
    /// Re-evaluate `url` from the top of the interception state machine.
    async fn regate(&self, url: &str);
}
