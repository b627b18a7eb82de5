//! Cross-domain intention conflicts.
//!
//! When an intention is active for one domain and the user opens another
//! gated domain, nothing is decided automatically. The user picks one of
//! three [`ConflictChoice`]s.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::domain::{domain_matches, normalize_domain};
use crate::error::GateResult;
use crate::store::IntentionStore;
use crate::traits::Navigator;
use crate::types::ActiveIntention;

/// What the user sees when a navigation collides with the active intention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictPrompt {
    pub active_domain: String,
    pub active_intention: String,
    pub target_domain: String,
    pub target_url: String,
}

impl ConflictPrompt {
    /// Conflict between `active` and a navigation to `target_url`, if the
    /// target is not the active domain or one of its subdomains (or parent).
    pub fn detect(active: &ActiveIntention, target_url: &str) -> Option<Self> {
        let target_domain = normalize_domain(target_url);
        if domain_matches(&target_domain, &active.domain)
            || domain_matches(&active.domain, &target_domain)
        {
            return None;
        }
        Some(Self {
            active_domain: active.domain.clone(),
            active_intention: active.intention_text.clone(),
            target_domain,
            target_url: target_url.to_string(),
        })
    }

    /// URL used to return to the active domain.
    pub fn active_url(&self) -> String {
        format!("https://{}/", self.active_domain)
    }
}

/// The three explicit ways out of a conflict. There is no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Go back to the active domain; nothing changes.
    ContinueWithActive,
    /// Drop the active intention and declare one for the target domain.
    SetNewIntention,
    /// Step back in history; nothing changes.
    GoBack,
}

/// What the caller must do after a conflict is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Navigated to the active domain.
    ReturnedToActive { url: String },
    /// Active intention cleared; prompt for the target domain.
    AwaitIntention { domain: String, url: String },
    /// Went back in history.
    WentBack,
}

/// Applies a user's conflict choice.
#[derive(Clone)]
pub struct ConflictResolver {
    store: Arc<IntentionStore>,
    navigator: Arc<dyn Navigator>,
}

impl ConflictResolver {
    pub fn new(store: Arc<IntentionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self { store, navigator }
    }

    pub async fn resolve(
        &self,
        prompt: &ConflictPrompt,
        choice: ConflictChoice,
    ) -> GateResult<ConflictResolution> {
        info!(
            active = %prompt.active_domain,
            target = %prompt.target_domain,
            choice = ?choice,
            "Resolving intention conflict"
        );
        match choice {
            ConflictChoice::ContinueWithActive => {
                let url = prompt.active_url();
                self.navigator.navigate(&url).await?;
                Ok(ConflictResolution::ReturnedToActive { url })
            }
            ConflictChoice::SetNewIntention => {
                self.store.clear_active_for(&prompt.active_domain).await?;
                Ok(ConflictResolution::AwaitIntention {
                    domain: prompt.target_domain.clone(),
                    url: prompt.target_url.clone(),
                })
            }
            ConflictChoice::GoBack => {
                self.navigator.history_back().await?;
                Ok(ConflictResolution::WentBack)
            }
        }
    }
}
