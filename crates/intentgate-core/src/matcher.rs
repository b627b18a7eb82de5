//! Intention matching: does the page on screen serve the declared intention?

use std::sync::Arc;

use tracing::debug;

use crate::classifier::{Classifier, ClassifierRequest};
use crate::config::MatcherConfig;
use crate::domain::normalize_domain;
use crate::error::GateResult;
use crate::parse::{parse_match_response, MatchParse};
use crate::prompts::{matching_prompt, MATCHING_SYSTEM_PROMPT};
use crate::store::IntentionStore;
use crate::traits::ContentExtractor;

/// Where a match confidence came from.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchBasis {
    /// No stored intention for the domain; nothing was classified.
    NoIntention,
    /// The domain holds a timed pass; content is not judged.
    TimedPass,
    /// The classifier answered; holds the parse outcome.
    Classified(MatchParse),
}

/// Outcome of matching content against the stored intention.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub matches: bool,
    pub reasoning: String,
    pub basis: MatchBasis,
}

impl MatchResult {
    fn no_intention() -> Self {
        Self {
            confidence: 0.0,
            matches: false,
            reasoning: "no intention set for this site".to_string(),
            basis: MatchBasis::NoIntention,
        }
    }

    fn timed_pass(minutes: u32) -> Self {
        Self {
            confidence: 1.0,
            matches: true,
            reasoning: format!("timed pass of {} minutes", minutes),
            basis: MatchBasis::TimedPass,
        }
    }
}

/// Classifies extracted page content against a domain's stored intention.
#[derive(Clone)]
pub struct IntentionMatcher {
    store: Arc<IntentionStore>,
    extractor: Arc<dyn ContentExtractor>,
    classifier: Classifier,
    config: MatcherConfig,
}

impl IntentionMatcher {
    pub fn new(
        store: Arc<IntentionStore>,
        extractor: Arc<dyn ContentExtractor>,
        classifier: Classifier,
        config: MatcherConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            classifier,
            config,
        }
    }

    /// Match the content at `url` against its domain's intention.
    ///
    /// Store, extraction and classifier failures are returned; the caller
    /// decides what an inconclusive check means.
    pub async fn match_url(&self, url: &str) -> GateResult<MatchResult> {
        let domain = normalize_domain(url);
        let Some(record) = self.store.get(&domain).await? else {
            return Ok(MatchResult::no_intention());
        };
        if let Some(minutes) = record.timed_pass_minutes() {
            return Ok(MatchResult::timed_pass(minutes));
        }

        let content = self.extractor.extract(url).await?;
        let content = truncate_chars(content.trim(), self.config.max_content_chars);
        let content = if content.is_empty() {
            "(no readable content)"
        } else {
            content
        };

        let prompt = matching_prompt(&record.intention_text, url, content);
        let response = self
            .classifier
            .request(ClassifierRequest {
                prompt: &prompt,
                system_instructions: MATCHING_SYSTEM_PROMPT,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                expect_json: true,
            })
            .await?;

        Ok(self.score(parse_match_response(&response)))
    }

    fn score(&self, parsed: MatchParse) -> MatchResult {
        let confidence = parsed.confidence();
        let matches = confidence >= self.config.match_threshold;
        let reasoning = match &parsed {
            MatchParse::Json {
                reasoning: Some(r), ..
            } => r.clone(),
            MatchParse::Json { .. } | MatchParse::RegexConfidence { .. } => {
                "no reasoning given".to_string()
            }
            MatchParse::Unparsable { .. } => "classifier answer was unreadable".to_string(),
        };
        debug!(confidence, matches, unparsable = parsed.is_unparsable(), "Matched content");
        MatchResult {
            confidence,
            matches,
            reasoning,
            basis: MatchBasis::Classified(parsed),
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::classifier::testing::ScriptedLlm;
    use crate::config::{ClassifierConfig, StoreConfig};
    use crate::error::GateError;
    use crate::store::MemoryKvStore;

    struct FixedExtractor(String);

    #[async_trait]
    impl ContentExtractor for FixedExtractor {
        async fn extract(&self, _url: &str) -> GateResult<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl ContentExtractor for FailingExtractor {
        async fn extract(&self, _url: &str) -> GateResult<String> {
            Err(GateError::Extraction("page gone".to_string()))
        }
    }

    fn store() -> Arc<IntentionStore> {
        Arc::new(IntentionStore::new(
            Arc::new(MemoryKvStore::new()),
            StoreConfig::default(),
        ))
    }

    fn matcher(
        store: Arc<IntentionStore>,
        extractor: Arc<dyn ContentExtractor>,
        llm: Arc<ScriptedLlm>,
    ) -> IntentionMatcher {
        IntentionMatcher::new(
            store,
            extractor,
            Classifier::new(llm, &ClassifierConfig::default()),
            MatcherConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_no_intention_skips_classifier() {
        let llm = Arc::new(ScriptedLlm::replying(&[r#"{"confidence": 1.0}"#]));
        let m = matcher(store(), Arc::new(FixedExtractor("x".into())), llm.clone());
        let result = m.match_url("https://youtube.com/watch?v=1").await.unwrap();
        assert!(!result.matches);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.basis, MatchBasis::NoIntention);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_timed_pass_skips_classifier() {
        let store = store();
        store.save_timed_pass("youtube.com", 15).await.unwrap();
        let llm = Arc::new(ScriptedLlm::replying(&[r#"{"confidence": 0.0}"#]));
        let m = matcher(store, Arc::new(FixedExtractor("x".into())), llm.clone());
        let result = m.match_url("https://youtube.com/watch?v=1").await.unwrap();
        assert!(result.matches);
        assert_eq!(result.basis, MatchBasis::TimedPass);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_threshold_applies() {
        let store = store();
        store.save("youtube.com", "watch a rust tutorial").await.unwrap();
        let llm = Arc::new(ScriptedLlm::replying(&[
            r#"{"confidence": 0.7, "reasoning": "rust video"}"#,
            r#"{"confidence": 0.69, "reasoning": "adjacent"}"#,
        ]));
        let m = matcher(store, Arc::new(FixedExtractor("Rust in 100 seconds".into())), llm.clone());

        let high = m.match_url("https://youtube.com/watch?v=1").await.unwrap();
        assert!(high.matches);
        assert_eq!(high.reasoning, "rust video");

        let low = m.match_url("https://youtube.com/watch?v=2").await.unwrap();
        assert!(!low.matches);

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("watch a rust tutorial"));
        assert!(prompts[0].contains("Rust in 100 seconds"));
    }

    #[tokio::test]
    async fn test_unparsable_answer_is_neutral_and_observable() {
        let store = store();
        store.save("reddit.com", "read the rust subreddit").await.unwrap();
        let llm = Arc::new(ScriptedLlm::replying(&["no idea"]));
        let m = matcher(store, Arc::new(FixedExtractor("posts".into())), llm);
        let result = m.match_url("https://reddit.com/r/rust").await.unwrap();
        assert_eq!(result.confidence, 0.5);
        assert!(!result.matches);
        assert!(matches!(
            result.basis,
            MatchBasis::Classified(MatchParse::Unparsable { .. })
        ));
    }

    #[tokio::test]
    async fn test_content_is_capped() {
        let store = store();
        store.save("reddit.com", "read the rust subreddit").await.unwrap();
        let llm = Arc::new(ScriptedLlm::replying(&[r#"{"confidence": 0.9}"#]));
        let long = "é".repeat(5000);
        let m = matcher(store, Arc::new(FixedExtractor(long)), llm.clone());
        m.match_url("https://reddit.com/r/rust").await.unwrap();
        let prompt = llm.prompts.lock().unwrap()[0].clone();
        assert_eq!(prompt.matches('é').count(), MatcherConfig::default().max_content_chars);
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let store = store();
        store.save("reddit.com", "read the rust subreddit").await.unwrap();
        let llm = Arc::new(ScriptedLlm::replying(&[r#"{"confidence": 0.9}"#]));
        let m = matcher(store.clone(), Arc::new(FailingExtractor), llm);
        assert!(m.match_url("https://reddit.com/r/rust").await.is_err());

        let failing = Arc::new(ScriptedLlm::failing("503"));
        let m = matcher(store, Arc::new(FixedExtractor("posts".into())), failing);
        let err = m.match_url("https://reddit.com/r/rust").await.unwrap_err();
        assert!(err.is_classifier());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
