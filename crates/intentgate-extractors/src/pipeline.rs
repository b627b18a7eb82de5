//! Extraction pipeline: fetch, dispatch to a site extractor, cap the length.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use intentgate_core::config::ExtractorConfig;
use intentgate_core::domain::normalize_domain;
use intentgate_core::error::GateResult;
use intentgate_core::traits::ContentExtractor;

use crate::document::PageDocument;
use crate::error::{ExtractError, ExtractResult};
use crate::sites::{default_extractors, GenericExtractor, SiteExtractor};
use crate::source::{HttpPageSource, PageSource};
use crate::types::{ExtractedContent, SiteKind};

/// Site-aware content extraction for intention matching.
///
/// Picks the first site extractor that handles the page's domain. When that
/// extractor finds nothing, the generic ranked-block extractor runs instead.
pub struct ExtractionPipeline {
    source: Arc<dyn PageSource>,
    extractors: Vec<Box<dyn SiteExtractor>>,
    config: ExtractorConfig,
}

impl ExtractionPipeline {
    pub fn new(source: Arc<dyn PageSource>, config: ExtractorConfig) -> Self {
        Self {
            source,
            extractors: default_extractors(),
            config,
        }
    }

    /// Pipeline fetching pages over HTTP.
    pub fn http(config: ExtractorConfig) -> ExtractResult<Self> {
        let source = HttpPageSource::new(config.fetch_timeout_ms)?;
        Ok(Self::new(Arc::new(source), config))
    }

    /// Fetch `url` and extract its content.
    #[instrument(skip(self))]
    pub async fn extract_url(&self, url: &str) -> ExtractResult<ExtractedContent> {
        let html = self.source.fetch(url).await?;
        self.extract_html(url, &html)
    }

    /// Extract content from already-fetched HTML.
    pub fn extract_html(&self, url: &str, html: &str) -> ExtractResult<ExtractedContent> {
        let parsed = Url::parse(url).map_err(|e| ExtractError::InvalidUrl(format!("{}: {}", url, e)))?;
        let domain = normalize_domain(url);
        let doc = PageDocument::parse(html);

        let (site, text) = match self.extractors.iter().find(|e| e.handles(&domain)) {
            Some(extractor) => {
                let text = extractor.extract(&doc, &parsed, &self.config);
                if text.trim().is_empty() && extractor.kind() != SiteKind::Generic {
                    debug!(%domain, site = ?extractor.kind(), "site extractor found nothing, using generic");
                    (SiteKind::Generic, GenericExtractor.extract(&doc, &parsed, &self.config))
                } else {
                    (extractor.kind(), text)
                }
            }
            None => (SiteKind::Generic, GenericExtractor.extract(&doc, &parsed, &self.config)),
        };

        if text.trim().is_empty() {
            return Err(ExtractError::EmptyContent);
        }

        let (text, truncated) = truncate(text, self.config.max_length);
        Ok(ExtractedContent {
            site,
            text,
            truncated,
        })
    }
}

fn truncate(text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (text[..idx].to_string(), true),
        None => (text, false),
    }
}

#[async_trait]
impl ContentExtractor for ExtractionPipeline {
    async fn extract(&self, url: &str) -> GateResult<String> {
        Ok(self.extract_url(url).await?.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticPageSource;

    const WATCH_URL: &str = "https://www.youtube.com/watch?v=abc";
    const ARTICLE_URL: &str = "https://blog.example.org/posts/ownership";

    fn pipeline(config: ExtractorConfig) -> ExtractionPipeline {
        let source = StaticPageSource::new()
            .with_page(
                WATCH_URL,
                r#"<html><head><title>Ownership explained - YouTube</title></head></html>"#,
            )
            .with_page(
                ARTICLE_URL,
                r#"<html><head><title>Loading...</title></head><body>
                <h2>Understanding ownership</h2>
                <p>Every value in Rust has a single owner at any point in time.</p>
                </body></html>"#,
            );
        ExtractionPipeline::new(Arc::new(source), config)
    }

    #[tokio::test]
    async fn test_site_extractor_used() {
        let content = pipeline(ExtractorConfig::default())
            .extract_url(WATCH_URL)
            .await
            .unwrap();
        assert_eq!(content.site, SiteKind::Video);
        assert_eq!(content.text, "Video: Ownership explained - YouTube");
        assert!(!content.truncated);
    }

    #[tokio::test]
    async fn test_generic_extraction_through_trait() {
        let pipeline = pipeline(ExtractorConfig::default());
        let text = ContentExtractor::extract(&pipeline, ARTICLE_URL).await.unwrap();
        assert_eq!(
            text,
            "Every value in Rust has a single owner at any point in time.\nUnderstanding ownership"
        );
    }

    #[test]
    fn test_empty_site_result_falls_back_to_generic() {
        let pipeline = pipeline(ExtractorConfig::default());
        let content = pipeline
            .extract_html(
                "https://www.reddit.com/",
                "<html><body><p>A paragraph long enough to be kept by ranking.</p></body></html>",
            )
            .unwrap();
        assert_eq!(content.site, SiteKind::Generic);
        assert_eq!(content.text, "A paragraph long enough to be kept by ranking.");
    }

    #[test]
    fn test_truncates_to_max_length() {
        let pipeline = pipeline(ExtractorConfig {
            max_length: 12,
            ..ExtractorConfig::default()
        });
        let content = pipeline
            .extract_html("https://www.youtube.com/watch?v=x", "<title>Ownership explained</title>")
            .unwrap();
        assert_eq!(content.text, "Video: Owner");
        assert!(content.truncated);
    }

    #[test]
    fn test_empty_page_is_error() {
        let pipeline = pipeline(ExtractorConfig::default());
        assert!(matches!(
            pipeline.extract_html("https://example.org/", "<html><title>Loading</title></html>"),
            Err(ExtractError::EmptyContent)
        ));
    }

    #[tokio::test]
    async fn test_missing_page_maps_to_gate_error() {
        let pipeline = pipeline(ExtractorConfig::default());
        let err = ContentExtractor::extract(&pipeline, "https://unknown.example/")
            .await
            .unwrap_err();
        assert!(matches!(err, intentgate_core::error::GateError::Extraction(_)));
    }
}
