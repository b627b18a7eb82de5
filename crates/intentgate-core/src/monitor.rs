//! Drift monitor.
//!
//! One monitor runs per page context while an intention is committed. The
//! first check happens only after the grace period; after that the page is
//! re-extracted and matched on a fixed interval. Access is revoked only when
//! confidence stays under the floor after the revoke window has passed.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::domain::normalize_domain;
use crate::matcher::IntentionMatcher;
use crate::store::IntentionStore;
use crate::traits::Regate;

/// Whether a reading warrants revocation.
///
/// Both conditions must hold: confidence under the floor, and more than the
/// revoke window elapsed since monitoring started.
pub fn should_revoke(confidence: f32, elapsed: Duration, config: &MonitorConfig) -> bool {
    confidence < config.revoke_confidence_floor && elapsed > config.revoke_after()
}

/// Why a monitor stopped on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// No active intention any more.
    IntentionCleared,
    /// The active intention belongs to another domain.
    DomainChanged { active_domain: String },
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Stop(StopReason),
    /// Still inside the grace period.
    Skipped,
    /// The store, extractor or classifier failed; nothing changes.
    Inconclusive,
    /// Keep monitoring; the active intention was refreshed.
    Continue { confidence: f32, matches: bool },
    /// Access was revoked.
    Revoke { confidence: f32 },
}

/// Runs drift checks for committed intentions.
#[derive(Clone)]
pub struct IntentionMonitor {
    store: Arc<IntentionStore>,
    matcher: IntentionMatcher,
    config: MonitorConfig,
    regate: Weak<dyn Regate>,
}

impl IntentionMonitor {
    pub fn new(
        store: Arc<IntentionStore>,
        matcher: IntentionMatcher,
        config: MonitorConfig,
        regate: Weak<dyn Regate>,
    ) -> Self {
        Self {
            store,
            matcher,
            config,
            regate,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Start monitoring `url`. The returned handle owns the background task.
    pub fn start(&self, url: &str) -> MonitorHandle {
        let domain = normalize_domain(url);
        let token = CancellationToken::new();
        let (url_tx, url_rx) = watch::channel(url.to_string());
        let monitor = self.clone();
        let task_token = token.clone();
        let task_domain = domain.clone();

        let task = tokio::spawn(async move {
            monitor.run(task_domain, url_rx, task_token).await;
        });

        info!(domain = %domain, "Monitor started");
        MonitorHandle {
            domain,
            kind: MonitorKind::Drift,
            token,
            url_tx,
            task,
        }
    }

    async fn run(&self, domain: String, url_rx: watch::Receiver<String>, token: CancellationToken) {
        let started = Instant::now();
        let mut ticker =
            tokio::time::interval_at(started + self.config.grace_period(), self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(domain = %domain, "Monitor cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let url = url_rx.borrow().clone();
            match self.tick(&domain, &url, started.elapsed()).await {
                TickOutcome::Stop(reason) => {
                    debug!(domain = %domain, reason = ?reason, "Monitor stopped itself");
                    token.cancel();
                    return;
                }
                TickOutcome::Revoke { .. } => {
                    let superseded = token.is_cancelled();
                    token.cancel();
                    if superseded {
                        debug!(domain = %domain, "Monitor stopped during check, not re-gating");
                    } else if let Some(regate) = self.regate.upgrade() {
                        regate.regate(&url).await;
                    }
                    return;
                }
                _ => {}
            }
        }
    }

    /// Run one poll for `domain`, showing `url`, `elapsed` after start.
    pub async fn tick(&self, domain: &str, url: &str, elapsed: Duration) -> TickOutcome {
        let active = match self.store.get_active().await {
            Ok(Some(active)) => active,
            Ok(None) => return TickOutcome::Stop(StopReason::IntentionCleared),
            Err(e) => {
                warn!(domain = %domain, error = %e, "Monitor could not read active intention");
                return TickOutcome::Inconclusive;
            }
        };
        if active.domain != domain {
            return TickOutcome::Stop(StopReason::DomainChanged {
                active_domain: active.domain,
            });
        }

        if elapsed < self.config.grace_period() {
            return TickOutcome::Skipped;
        }

        let result = match self.matcher.match_url(url).await {
            Ok(result) => result,
            Err(e) => {
                warn!(domain = %domain, error = %e, "Drift check inconclusive");
                // A classifier outage must not let the active intention lapse.
                self.heartbeat(domain).await;
                return TickOutcome::Inconclusive;
            }
        };
        let elapsed_secs = elapsed.as_secs();

        if should_revoke(result.confidence, elapsed, &self.config) {
            return self.revoke(domain, result.confidence, elapsed_secs).await;
        }

        debug!(
            domain = %domain,
            confidence = result.confidence,
            matches = result.matches,
            elapsed_secs,
            "Drift check passed"
        );
        self.heartbeat(domain).await;
        TickOutcome::Continue {
            confidence: result.confidence,
            matches: result.matches,
        }
    }

    async fn heartbeat(&self, domain: &str) {
        if let Err(e) = self.store.touch_active(domain).await {
            warn!(domain = %domain, error = %e, "Failed to refresh active intention");
        }
    }

    async fn revoke(&self, domain: &str, confidence: f32, elapsed_secs: u64) -> TickOutcome {
        match self.store.clear_active_for(domain).await {
            Ok(true) => {}
            Ok(false) => {
                return TickOutcome::Stop(StopReason::IntentionCleared);
            }
            Err(e) => {
                warn!(domain = %domain, error = %e, "Revocation could not clear active intention");
                return TickOutcome::Inconclusive;
            }
        }
        if let Err(e) = self.store.remove(domain).await {
            warn!(domain = %domain, error = %e, "Revocation could not remove intention record");
        }
        info!(domain = %domain, confidence, elapsed_secs, "Intention revoked for drift");
        TickOutcome::Revoke { confidence }
    }

    /// Re-gate `url` when a timed pass expiring at `expires_at` lapses.
    pub fn watch_timed_pass(&self, url: &str, expires_at: DateTime<Utc>) -> MonitorHandle {
        let domain = normalize_domain(url);
        let token = CancellationToken::new();
        let (url_tx, url_rx) = watch::channel(url.to_string());
        let regate = self.regate.clone();
        let task_token = token.clone();
        let wait = (expires_at - Utc::now()).to_std().unwrap_or_default() + Duration::from_millis(1);

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => return,
                _ = tokio::time::sleep(wait) => {}
            }
            task_token.cancel();
            let url = url_rx.borrow().clone();
            debug!(url = %url, "Timed pass lapsed");
            if let Some(regate) = regate.upgrade() {
                regate.regate(&url).await;
            }
        });

        MonitorHandle {
            domain,
            kind: MonitorKind::TimedPass,
            token,
            url_tx,
            task,
        }
    }
}

/// What a handle's task watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorKind {
    Drift,
    TimedPass,
}

/// Owner of one running monitor task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct MonitorHandle {
    domain: String,
    kind: MonitorKind,
    token: CancellationToken,
    url_tx: watch::Sender<String>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn kind(&self) -> MonitorKind {
        self.kind
    }

    /// Point the monitor at another URL on the same domain without
    /// resetting its clock.
    pub fn retarget(&self, url: &str) {
        self.url_tx.send_replace(url.to_string());
    }

    /// Stop the task. Idempotent. A check already in flight runs to
    /// completion but does not re-gate.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            debug!(domain = %self.domain, kind = ?self.kind, "Stopping monitor");
            self.token.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled() || self.task.is_finished()
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
