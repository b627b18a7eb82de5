//! Route interceptor.
//!
//! Decides, for every page (re)load in one page context, whether the page is
//! allowed, needs an intention first, or is allowed under drift monitoring.
//! Internal failures never leave the user on a blank page: an error while
//! intercepting either allows the page or shows the intention prompt, as the
//! configured [`FailurePolicy`](crate::config::FailurePolicy) says.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::blocklist::{BlockVerdict, BlocklistResolver, Category};
use crate::classifier::Classifier;
use crate::config::{GateConfig, InterceptorConfig};
use crate::conflict::{ConflictChoice, ConflictPrompt, ConflictResolution, ConflictResolver};
use crate::domain::{is_internal_url, normalize_domain, url_path};
use crate::error::{GateError, GateResult};
use crate::matcher::IntentionMatcher;
use crate::monitor::{IntentionMonitor, MonitorHandle, MonitorKind};
use crate::store::IntentionStore;
use crate::traits::{
    BlockingPrompt, ContentExtractor, EntitlementChecker, Navigator, OverrideSource, Regate,
};
use crate::validator::IntentionValidator;

/// Interception state of one page context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Allowed,
    AwaitingInput,
    Validating,
    Committed,
    Monitoring,
}

/// Why a page was let through without monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    InternalUrl,
    NotEntitled,
    NotBlocked,
    AllowListedPath,
    TimedPass,
    JustSet,
    FailedOpen,
}

/// Outcome of a page load.
#[derive(Debug, Clone, PartialEq)]
pub enum InterceptDecision {
    Allowed(AllowReason),
    /// A stored intention covers the page; drift monitoring runs.
    Monitoring { domain: String },
    /// The page was replaced with the intention form.
    Prompted { domain: String },
    /// An intention for another domain is active; the user must choose.
    Conflict(ConflictPrompt),
}

impl InterceptDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_) | Self::Monitoring { .. })
    }
}

/// Outcome of submitting the intention form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A submission is already being validated.
    Busy,
    /// No form is showing.
    NotAwaitingInput,
    /// Rejected; the form shows the reason.
    Rejected { reason: String },
    /// Accepted; the page was sent back to the original URL.
    Accepted { redirect_to: String },
    /// A bare number granted a timed pass.
    TimedPass { minutes: u32, redirect_to: String },
}

/// Collaborators of a [`RouteInterceptor`].
#[derive(Clone)]
pub struct InterceptorDeps {
    pub store: Arc<IntentionStore>,
    pub overrides: Arc<dyn OverrideSource>,
    pub classifier: Classifier,
    pub extractor: Arc<dyn ContentExtractor>,
    pub navigator: Arc<dyn Navigator>,
    pub entitlement: Arc<dyn EntitlementChecker>,
}

#[derive(Debug, Default)]
struct PageState {
    gate: GateState,
    prompt: Option<BlockingPrompt>,
    conflict: Option<ConflictPrompt>,
}

/// Per-page-context interception state machine.
pub struct RouteInterceptor {
    store: Arc<IntentionStore>,
    resolver: BlocklistResolver,
    validator: IntentionValidator,
    monitor: IntentionMonitor,
    conflicts: ConflictResolver,
    navigator: Arc<dyn Navigator>,
    entitlement: Arc<dyn EntitlementChecker>,
    config: InterceptorConfig,
    state: Mutex<PageState>,
    active_monitor: Mutex<Option<MonitorHandle>>,
}

impl RouteInterceptor {
    /// Wire an interceptor. The monitor re-gates through a weak reference
    /// back to the interceptor.
    pub fn new(deps: InterceptorDeps, config: &GateConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<RouteInterceptor>| {
            let regate: Weak<dyn Regate> = weak.clone();
            let matcher = IntentionMatcher::new(
                deps.store.clone(),
                deps.extractor.clone(),
                deps.classifier.clone(),
                config.matcher.clone(),
            );
            Self {
                store: deps.store.clone(),
                resolver: BlocklistResolver::new(deps.overrides.clone()),
                validator: IntentionValidator::new(deps.classifier.clone(), config.validator.clone()),
                monitor: IntentionMonitor::new(
                    deps.store.clone(),
                    matcher,
                    config.monitor.clone(),
                    regate,
                ),
                conflicts: ConflictResolver::new(deps.store.clone(), deps.navigator.clone()),
                navigator: deps.navigator,
                entitlement: deps.entitlement,
                config: config.interceptor.clone(),
                state: Mutex::new(PageState::default()),
                active_monitor: Mutex::new(None),
            }
        })
    }

    /// Current state.
    pub fn state(&self) -> GateState {
        self.page().gate
    }

    /// The intention form currently showing, if any.
    pub fn current_prompt(&self) -> Option<BlockingPrompt> {
        self.page().prompt.clone()
    }

    /// The conflict awaiting a choice, if any.
    pub fn pending_conflict(&self) -> Option<ConflictPrompt> {
        self.page().conflict.clone()
    }

    /// Domain and kind of the running monitor, if any.
    pub fn monitored(&self) -> Option<(String, MonitorKind)> {
        self.monitor_slot()
            .as_ref()
            .filter(|h| !h.is_stopped())
            .map(|h| (h.domain().to_string(), h.kind()))
    }

    fn page(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn monitor_slot(&self) -> MutexGuard<'_, Option<MonitorHandle>> {
        self.active_monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, gate: GateState) {
        let mut page = self.page();
        debug!(from = ?page.gate, to = ?gate, "Gate transition");
        page.gate = gate;
        if gate != GateState::AwaitingInput && gate != GateState::Validating {
            page.prompt = None;
            page.conflict = None;
        }
    }

    /// Evaluate a page load. Never fails.
    pub async fn on_page_load(&self, url: &str) -> InterceptDecision {
        let decision = match self.evaluate(url).await {
            Ok(decision) => decision,
            Err(e) if e.is_fail_open(self.config.on_error) => {
                warn!(url = %url, error = %e, "Interception failed, allowing page");
                self.allow(AllowReason::FailedOpen)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Interception failed, prompting");
                self.fail_closed(url).await
            }
        };
        if !matches!(
            decision,
            InterceptDecision::Monitoring { .. } | InterceptDecision::Allowed(AllowReason::TimedPass)
        ) {
            self.stop_monitor();
        }
        decision
    }

    async fn evaluate(&self, url: &str) -> GateResult<InterceptDecision> {
        if is_internal_url(url) {
            self.set_state(GateState::Allowed);
            return Ok(InterceptDecision::Allowed(AllowReason::InternalUrl));
        }

        let domain = normalize_domain(url);
        if self.monitored().is_some_and(|(d, _)| d != domain) {
            self.stop_monitor();
        }

        match self.entitlement.has_access().await {
            Ok(true) => {}
            Ok(false) => return Ok(self.allow(AllowReason::NotEntitled)),
            Err(e) => {
                warn!(error = %e, "Entitlement check failed, allowing page");
                return Ok(self.allow(AllowReason::NotEntitled));
            }
        }

        let verdict = self.resolver.resolve(url).await?;
        if !verdict.is_blocked() {
            return Ok(self.allow(AllowReason::NotBlocked));
        }

        let path = url_path(url);
        if verdict != BlockVerdict::HardBlocked
            && self
                .config
                .path_allow_list
                .iter()
                .any(|rule| rule.matches(&domain, &path))
        {
            return Ok(self.allow(AllowReason::AllowListedPath));
        }

        let active = self.store.get_active().await?;
        if let Some(conflict) = active.as_ref().and_then(|a| ConflictPrompt::detect(a, url)) {
            info!(active = %conflict.active_domain, target = %domain, "Intention conflict");
            self.navigator.show_conflict(&conflict).await?;
            let mut page = self.page();
            page.gate = GateState::AwaitingInput;
            page.prompt = None;
            page.conflict = Some(conflict.clone());
            return Ok(InterceptDecision::Conflict(conflict));
        }

        if let Some(record) = self.store.get(&domain).await? {
            if let Some(minutes) = record.timed_pass_minutes() {
                debug!(domain = %domain, minutes, "Timed pass in effect");
                self.ensure_monitor(url, &domain, MonitorKind::TimedPass, || {
                    self.monitor.watch_timed_pass(url, record.expires_at)
                });
                return Ok(self.allow(AllowReason::TimedPass));
            }

            self.set_state(GateState::Committed);
            if active.is_none() {
                self.store.set_active(&domain, &record.intention_text).await?;
            }
            self.ensure_monitor(url, &domain, MonitorKind::Drift, || self.monitor.start(url));
            self.set_state(GateState::Monitoring);
            return Ok(InterceptDecision::Monitoring { domain });
        }

        if self.store.is_just_set(&domain).await? {
            return Ok(self.allow(AllowReason::JustSet));
        }

        self.prompt(&domain, url).await?;
        Ok(InterceptDecision::Prompted { domain })
    }

    async fn fail_closed(&self, url: &str) -> InterceptDecision {
        let domain = normalize_domain(url);
        match self.prompt(&domain, url).await {
            Ok(()) => InterceptDecision::Prompted { domain },
            Err(e) => {
                warn!(url = %url, error = %e, "Could not show prompt, allowing page");
                self.allow(AllowReason::FailedOpen)
            }
        }
    }

    fn allow(&self, reason: AllowReason) -> InterceptDecision {
        self.set_state(GateState::Allowed);
        InterceptDecision::Allowed(reason)
    }

    async fn prompt(&self, domain: &str, url: &str) -> GateResult<()> {
        let mut prompt = BlockingPrompt::new(domain, url);
        prompt.accepts_minutes = Category::of(domain).is_some_and(|c| c.time_blockable());
        self.navigator.show_blocking_prompt(&prompt).await?;
        let mut page = self.page();
        page.gate = GateState::AwaitingInput;
        page.prompt = Some(prompt);
        page.conflict = None;
        debug!(domain = %domain, "Awaiting intention");
        Ok(())
    }

    /// Keep a running monitor of the same kind and domain, pointed at `url`;
    /// otherwise replace it.
    fn ensure_monitor(
        &self,
        url: &str,
        domain: &str,
        kind: MonitorKind,
        start: impl FnOnce() -> MonitorHandle,
    ) {
        let mut slot = self.monitor_slot();
        if let Some(handle) = slot.as_ref() {
            if !handle.is_stopped() && handle.kind() == kind && handle.domain() == domain {
                handle.retarget(url);
                return;
            }
        }
        if let Some(previous) = slot.take() {
            previous.stop();
        }
        *slot = Some(start());
    }

    /// Stop the running monitor, if any.
    pub fn stop_monitor(&self) {
        if let Some(handle) = self.monitor_slot().take() {
            handle.stop();
        }
    }

    /// Submit the intention form.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let mut prompt = {
            let mut page = self.page();
            match (page.gate, page.prompt.clone()) {
                (GateState::Validating, _) => return SubmitOutcome::Busy,
                (GateState::AwaitingInput, Some(prompt)) => {
                    page.gate = GateState::Validating;
                    prompt
                }
                _ => return SubmitOutcome::NotAwaitingInput,
            }
        };
        debug!(domain = %prompt.domain, "Validating intention");

        prompt.submitting = true;
        prompt.error = None;
        self.render(&prompt).await;

        let text = text.trim();
        if prompt.accepts_minutes {
            if let Some(minutes) = parse_minutes(text) {
                if let Err(e) = self.store.save_timed_pass(&prompt.domain, minutes).await {
                    warn!(domain = %prompt.domain, error = %e, "Could not save timed pass, allowing page");
                }
                let redirect_to = self
                    .confirm(prompt, format!("Access granted for {} minutes.", minutes))
                    .await;
                return SubmitOutcome::TimedPass {
                    minutes,
                    redirect_to,
                };
            }
        }

        let outcome = self.validator.validate(text).await;
        if !outcome.is_valid {
            let reason = outcome.reason.unwrap_or_default();
            prompt.submitting = false;
            prompt.error = Some(reason.clone());
            self.render(&prompt).await;
            let mut page = self.page();
            page.gate = GateState::AwaitingInput;
            page.prompt = Some(prompt);
            return SubmitOutcome::Rejected { reason };
        }

        if let Err(e) = self.commit(&prompt.domain, text).await {
            warn!(domain = %prompt.domain, error = %e, "Could not save intention, allowing page");
        }
        let redirect_to = self
            .confirm(prompt, "Intention set. Taking you there.".to_string())
            .await;
        SubmitOutcome::Accepted { redirect_to }
    }

    async fn commit(&self, domain: &str, text: &str) -> GateResult<()> {
        self.store.save(domain, text).await?;
        self.store.set_active(domain, text).await?;
        info!(domain = %domain, "Intention committed");
        Ok(())
    }

    /// Show the confirmation, wait, then send the page back to its URL.
    async fn confirm(&self, mut prompt: BlockingPrompt, message: String) -> String {
        prompt.submitting = false;
        prompt.confirmation = Some(message);
        self.render(&prompt).await;
        self.set_state(GateState::Committed);

        tokio::time::sleep(self.config.confirmation_delay()).await;

        if let Err(e) = self.navigator.clear_prompt().await {
            warn!(error = %e, "Could not clear prompt");
        }
        if let Err(e) = self.navigator.navigate(&prompt.original_url).await {
            warn!(url = %prompt.original_url, error = %e, "Redirect failed");
        }
        prompt.original_url
    }

    async fn render(&self, prompt: &BlockingPrompt) {
        if let Err(e) = self.navigator.show_blocking_prompt(prompt).await {
            warn!(domain = %prompt.domain, error = %e, "Could not render prompt");
        }
    }

    /// Apply the user's choice for the pending conflict.
    pub async fn resolve_conflict(&self, choice: ConflictChoice) -> GateResult<ConflictResolution> {
        let conflict = self
            .page()
            .conflict
            .clone()
            .ok_or_else(|| GateError::invalid_state("no conflict is pending"))?;

        let result = match self.conflicts.resolve(&conflict, choice).await {
            Ok(ConflictResolution::AwaitIntention { domain, url }) => self
                .prompt(&domain, &url)
                .await
                .map(|_| ConflictResolution::AwaitIntention { domain, url }),
            Ok(resolution) => {
                self.set_state(GateState::Allowed);
                Ok(resolution)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!(error = %e, "Conflict resolution failed, allowing page");
            if let Err(e) = self.navigator.clear_prompt().await {
                warn!(error = %e, "Could not clear prompt");
            }
            self.set_state(GateState::Allowed);
        }
        result
    }

    /// Stop background work for this page context.
    pub fn shutdown(&self) {
        self.stop_monitor();
        self.set_state(GateState::Allowed);
    }
}

#[async_trait]
impl Regate for RouteInterceptor {
    async fn regate(&self, url: &str) {
        let decision = self.on_page_load(url).await;
        info!(url = %url, decision = ?decision, "Page re-gated");
    }
}

/// A purely numeric submission, as minutes. Zero is not a pass.
fn parse_minutes(text: &str) -> Option<u32> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok().filter(|m| *m > 0)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::classifier::testing::ScriptedLlm;
    use crate::config::{ClassifierConfig, FailurePolicy};
    use crate::conflict::testing::{NavEvent, RecordingNavigator};
    use crate::store::MemoryKvStore;
    use crate::traits::{MockEntitlementChecker, MockOverrideSource, StaticEntitlement};

    struct NoContent;

    #[async_trait]
    impl ContentExtractor for NoContent {
        async fn extract(&self, _url: &str) -> GateResult<String> {
            Ok(String::new())
        }
    }

    struct Harness {
        interceptor: Arc<RouteInterceptor>,
        store: Arc<IntentionStore>,
        navigator: Arc<RecordingNavigator>,
        llm: Arc<ScriptedLlm>,
    }

    fn harness_with(
        replies: &[&str],
        overrides: Arc<dyn OverrideSource>,
        entitlement: Arc<dyn EntitlementChecker>,
    ) -> Harness {
        harness_configured(replies, overrides, entitlement, GateConfig::default())
    }

    fn harness_configured(
        replies: &[&str],
        overrides: Arc<dyn OverrideSource>,
        entitlement: Arc<dyn EntitlementChecker>,
        config: GateConfig,
    ) -> Harness {
        let store = Arc::new(IntentionStore::new(
            Arc::new(MemoryKvStore::new()),
            config.store.clone(),
        ));
        let navigator = Arc::new(RecordingNavigator::default());
        let llm = Arc::new(ScriptedLlm::replying(replies));
        let interceptor = RouteInterceptor::new(
            InterceptorDeps {
                store: store.clone(),
                overrides,
                classifier: Classifier::new(llm.clone(), &ClassifierConfig::default()),
                extractor: Arc::new(NoContent),
                navigator: navigator.clone(),
                entitlement,
            },
            &config,
        );
        Harness {
            interceptor,
            store,
            navigator,
            llm,
        }
    }

    fn no_overrides() -> Arc<dyn OverrideSource> {
        let mut overrides = MockOverrideSource::new();
        overrides.expect_overrides().returning(|| Ok(vec![]));
        Arc::new(overrides)
    }

    fn harness(replies: &[&str]) -> Harness {
        harness_with(replies, no_overrides(), Arc::new(StaticEntitlement(true)))
    }

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_minutes("5"), Some(5));
        assert_eq!(parse_minutes("45"), Some(45));
        assert_eq!(parse_minutes("0"), None);
        assert_eq!(parse_minutes("5 min"), None);
        assert_eq!(parse_minutes("-5"), None);
        assert_eq!(parse_minutes(""), None);
    }

    #[tokio::test]
    async fn test_internal_url_allowed() {
        let h = harness(&[]);
        let decision = h.interceptor.on_page_load("chrome://settings").await;
        assert_eq!(decision, InterceptDecision::Allowed(AllowReason::InternalUrl));
    }

    #[tokio::test]
    async fn test_entitlement_failure_fails_open() {
        let mut entitlement = MockEntitlementChecker::new();
        entitlement
            .expect_has_access()
            .returning(|| Err(GateError::Entitlement("billing down".into())));
        let h = harness_with(&[], no_overrides(), Arc::new(entitlement));
        let decision = h.interceptor.on_page_load("https://youtube.com/watch?v=1").await;
        assert_eq!(decision, InterceptDecision::Allowed(AllowReason::NotEntitled));
        assert!(h.navigator.events().is_empty());
    }

    #[tokio::test]
    async fn test_unblocked_site_allowed() {
        let h = harness(&[]);
        let decision = h.interceptor.on_page_load("https://docs.rs/tokio").await;
        assert_eq!(decision, InterceptDecision::Allowed(AllowReason::NotBlocked));
    }

    #[tokio::test]
    async fn test_allow_listed_path() {
        let h = harness(&[]);
        let decision = h.interceptor.on_page_load("https://www.youtube.com/").await;
        assert_eq!(decision, InterceptDecision::Allowed(AllowReason::AllowListedPath));
    }

    #[tokio::test]
    async fn test_override_source_failure_fails_open() {
        let mut overrides = MockOverrideSource::new();
        overrides
            .expect_overrides()
            .returning(|| Err(GateError::storage("kv offline")));
        let h = harness_with(&[], Arc::new(overrides), Arc::new(StaticEntitlement(true)));
        let decision = h.interceptor.on_page_load("https://youtube.com/watch?v=1").await;
        assert_eq!(decision, InterceptDecision::Allowed(AllowReason::FailedOpen));
        assert_eq!(h.interceptor.state(), GateState::Allowed);
    }

    #[tokio::test]
    async fn test_fail_closed_policy_prompts_on_error() {
        let mut overrides = MockOverrideSource::new();
        overrides
            .expect_overrides()
            .returning(|| Err(GateError::storage("kv offline")));
        let mut config = GateConfig::default();
        config.interceptor.on_error = FailurePolicy::Closed;
        let h = harness_configured(
            &[],
            Arc::new(overrides),
            Arc::new(StaticEntitlement(true)),
            config,
        );

        let decision = h.interceptor.on_page_load("https://youtube.com/watch?v=1").await;
        assert_eq!(
            decision,
            InterceptDecision::Prompted {
                domain: "youtube.com".to_string()
            }
        );
        assert_eq!(h.interceptor.state(), GateState::AwaitingInput);
        assert!(matches!(h.navigator.events().as_slice(), [NavEvent::Prompt(_)]));
    }

    #[tokio::test]
    async fn test_blocked_without_intention_prompts() {
        let h = harness(&[]);
        let decision = h.interceptor.on_page_load("https://youtube.com/watch?v=1").await;
        assert_eq!(
            decision,
            InterceptDecision::Prompted {
                domain: "youtube.com".to_string()
            }
        );
        assert_eq!(h.interceptor.state(), GateState::AwaitingInput);
        let prompt = h.interceptor.current_prompt().unwrap();
        assert!(prompt.accepts_minutes);
        assert_eq!(h.navigator.events(), vec![NavEvent::Prompt(prompt)]);
    }

    #[tokio::test]
    async fn test_submit_outside_prompt() {
        let h = harness(&[]);
        assert_eq!(h.interceptor.submit("anything").await, SubmitOutcome::NotAwaitingInput);
    }

    #[tokio::test]
    async fn test_rejected_submission_redisplays_reason() {
        let h = harness(&["Invalid: say which video"]);
        h.interceptor.on_page_load("https://youtube.com/watch?v=1").await;
        let outcome = h.interceptor.submit("watch something fun").await;
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected {
                reason: "say which video".to_string()
            }
        );
        assert_eq!(h.interceptor.state(), GateState::AwaitingInput);
        let prompt = h.interceptor.current_prompt().unwrap();
        assert_eq!(prompt.error.as_deref(), Some("say which video"));
        assert!(!prompt.submitting);
        assert!(h.store.get("youtube.com").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_submission_commits_and_redirects() {
        let h = harness(&["Valid"]);
        h.interceptor.on_page_load("https://youtube.com/watch?v=1").await;
        let outcome = h.interceptor.submit("watch the tokio tutorial").await;
        assert_eq!(
            outcome,
            SubmitOutcome::Accepted {
                redirect_to: "https://youtube.com/watch?v=1".to_string()
            }
        );

        let record = h.store.get("youtube.com").await.unwrap().unwrap();
        assert_eq!(record.intention_text, "watch the tokio tutorial");
        assert_eq!(h.store.get_active().await.unwrap().unwrap().domain, "youtube.com");
        let events = h.navigator.events();
        assert_eq!(
            &events[events.len() - 2..],
            &[
                NavEvent::Clear,
                NavEvent::Navigate("https://youtube.com/watch?v=1".to_string())
            ]
        );

        let decision = h.interceptor.on_page_load("https://youtube.com/watch?v=1").await;
        assert_eq!(
            decision,
            InterceptDecision::Monitoring {
                domain: "youtube.com".to_string()
            }
        );
        assert_eq!(h.interceptor.state(), GateState::Monitoring);
        assert_eq!(
            h.interceptor.monitored(),
            Some(("youtube.com".to_string(), MonitorKind::Drift))
        );
        h.interceptor.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_delay_before_redirect() {
        let h = Arc::new(harness(&["Valid"]));
        h.interceptor.on_page_load("https://youtube.com/watch?v=1").await;
        let interceptor = h.interceptor.clone();
        let submit = tokio::spawn(async move { interceptor.submit("watch the tokio tutorial").await });

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(!h
            .navigator
            .events()
            .iter()
            .any(|e| matches!(e, NavEvent::Navigate(_))));
        assert_eq!(h.interceptor.state(), GateState::Committed);

        submit.await.unwrap();
        assert!(h
            .navigator
            .events()
            .iter()
            .any(|e| matches!(e, NavEvent::Navigate(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_submit_while_validating_is_busy() {
        let store = Arc::new(IntentionStore::new(
            Arc::new(MemoryKvStore::new()),
            crate::config::StoreConfig::default(),
        ));
        let llm = Arc::new(ScriptedLlm::replying(&["Valid"]).delayed(Duration::from_secs(3)));
        let interceptor = RouteInterceptor::new(
            InterceptorDeps {
                store,
                overrides: no_overrides(),
                classifier: Classifier::new(llm.clone(), &ClassifierConfig::default()),
                extractor: Arc::new(NoContent),
                navigator: Arc::new(RecordingNavigator::default()),
                entitlement: Arc::new(StaticEntitlement(true)),
            },
            &GateConfig::default(),
        );
        interceptor.on_page_load("https://reddit.com/r/rust").await;

        let first = {
            let interceptor = interceptor.clone();
            tokio::spawn(async move { interceptor.submit("read the async book thread").await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(interceptor.state(), GateState::Validating);
        assert_eq!(interceptor.submit("read something else").await, SubmitOutcome::Busy);

        assert!(matches!(first.await.unwrap(), SubmitOutcome::Accepted { .. }));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_numeric_submission_grants_timed_pass_without_classifier() {
        let h = harness(&["Valid"]);
        h.interceptor.on_page_load("https://youtube.com/watch?v=1").await;
        let outcome = h.interceptor.submit("5").await;
        assert_eq!(
            outcome,
            SubmitOutcome::TimedPass {
                minutes: 5,
                redirect_to: "https://youtube.com/watch?v=1".to_string()
            }
        );
        assert_eq!(h.llm.call_count(), 0);
        let record = h.store.get("youtube.com").await.unwrap().unwrap();
        assert_eq!(record.intention_text, "block:5");

        let decision = h.interceptor.on_page_load("https://youtube.com/watch?v=1").await;
        assert_eq!(decision, InterceptDecision::Allowed(AllowReason::TimedPass));
        assert_eq!(
            h.interceptor.monitored(),
            Some(("youtube.com".to_string(), MonitorKind::TimedPass))
        );
        assert!(h.store.get_active().await.unwrap().is_none());
        h.interceptor.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_drift_revokes_and_prompts_again() {
        let mut config = GateConfig::default();
        // The marker runs on the wall clock, which paused time never moves.
        config.store.just_set_window_ms = 0;
        let h = harness_configured(
            &[r#"{"confidence": 0.02, "reasoning": "unrelated"}"#],
            no_overrides(),
            Arc::new(StaticEntitlement(true)),
            config,
        );
        h.store.save("youtube.com", "watch the tokio tutorial").await.unwrap();

        let url = "https://youtube.com/watch?v=cats";
        assert_eq!(
            h.interceptor.on_page_load(url).await,
            InterceptDecision::Monitoring {
                domain: "youtube.com".to_string()
            }
        );
        assert!(h.store.get_active().await.unwrap().is_some());

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;

        assert_eq!(h.interceptor.state(), GateState::AwaitingInput);
        assert!(h.store.get("youtube.com").await.unwrap().is_none());
        assert!(h.store.get_active().await.unwrap().is_none());
        assert_eq!(h.interceptor.monitored(), None);
        let prompt = h.interceptor.current_prompt().unwrap();
        assert_eq!(prompt.domain, "youtube.com");
        assert_eq!(prompt.original_url, url);
        assert!(prompt.accepts_minutes);
        assert_eq!(h.navigator.events().last(), Some(&NavEvent::Prompt(prompt)));
        // Polls at 60s, then every 30s until the one past five minutes revokes.
        assert_eq!(h.llm.call_count(), 10);
    }

    #[tokio::test]
    async fn test_numeric_on_non_time_blockable_goes_to_validator() {
        let mut overrides = MockOverrideSource::new();
        overrides
            .expect_overrides()
            .returning(|| Ok(vec!["example.org".to_string()]));
        let h = harness_with(&["Valid"], Arc::new(overrides), Arc::new(StaticEntitlement(true)));
        h.interceptor.on_page_load("https://example.org/").await;
        assert!(!h.interceptor.current_prompt().unwrap().accepts_minutes);
        let outcome = h.interceptor.submit("5").await;
        assert!(matches!(outcome, SubmitOutcome::Rejected { .. }));
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_conflict_on_other_domain() {
        let h = harness(&[]);
        h.store.set_active("siteA.com", "check the release notes").await.unwrap();
        let mut overrides = MockOverrideSource::new();
        overrides
            .expect_overrides()
            .returning(|| Ok(vec!["siteB.com".to_string()]));
        let h = Harness {
            interceptor: RouteInterceptor::new(
                InterceptorDeps {
                    store: h.store.clone(),
                    overrides: Arc::new(overrides),
                    classifier: Classifier::unconfigured(&ClassifierConfig::default()),
                    extractor: Arc::new(NoContent),
                    navigator: h.navigator.clone(),
                    entitlement: Arc::new(StaticEntitlement(true)),
                },
                &GateConfig::default(),
            ),
            ..h
        };

        let decision = h.interceptor.on_page_load("https://siteB.com/home").await;
        let InterceptDecision::Conflict(conflict) = decision else {
            panic!("expected a conflict, got {decision:?}");
        };
        assert_eq!(conflict.active_domain, "sitea.com");
        assert_eq!(conflict.target_domain, "siteb.com");
        assert!(!InterceptDecision::Conflict(conflict.clone()).is_allowed());
        assert_eq!(h.navigator.events(), vec![NavEvent::Conflict(conflict)]);

        let resolution = h
            .interceptor
            .resolve_conflict(ConflictChoice::SetNewIntention)
            .await
            .unwrap();
        assert!(matches!(resolution, ConflictResolution::AwaitIntention { .. }));
        assert_eq!(h.interceptor.state(), GateState::AwaitingInput);
        assert_eq!(h.interceptor.current_prompt().unwrap().domain, "siteb.com");
        assert!(h.store.get_active().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_without_conflict_is_invalid_state() {
        let h = harness(&[]);
        let err = h
            .interceptor
            .resolve_conflict(ConflictChoice::GoBack)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_just_set_marker_allows() {
        let h = harness(&[]);
        h.store.save("reddit.com", "read the async thread").await.unwrap();
        h.store.remove("reddit.com").await.unwrap();
        let decision = h.interceptor.on_page_load("https://reddit.com/r/rust").await;
        assert_eq!(decision, InterceptDecision::Allowed(AllowReason::JustSet));
    }

    #[tokio::test]
    async fn test_hard_blocked_path_ignores_allow_list() {
        let h = harness(&[]);
        let decision = h.interceptor.on_page_load("https://youtube.com/shorts/abc").await;
        assert!(matches!(decision, InterceptDecision::Prompted { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_domain_change_stops_monitor() {
        let h = harness(&[]);
        h.store.save("youtube.com", "watch the tokio tutorial").await.unwrap();
        h.interceptor.on_page_load("https://youtube.com/watch?v=1").await;
        assert!(h.interceptor.monitored().is_some());

        h.interceptor.on_page_load("https://docs.rs/tokio").await;
        assert!(h.interceptor.monitored().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_domain_reload_keeps_monitor() {
        let h = harness(&[]);
        h.store.save("youtube.com", "watch the tokio tutorial").await.unwrap();
        h.interceptor.on_page_load("https://youtube.com/watch?v=1").await;
        h.interceptor.on_page_load("https://youtube.com/watch?v=2").await;
        assert_eq!(
            h.interceptor.monitored(),
            Some(("youtube.com".to_string(), MonitorKind::Drift))
        );
        h.interceptor.shutdown();
        assert!(h.interceptor.monitored().is_none());
    }
}
