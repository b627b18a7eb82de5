//! Site-specific extractors.
//!
//! Each extractor claims a set of domains and pulls the fields that say what
//! the page is about. [`GenericExtractor`] covers everything else.

use once_cell::sync::Lazy;
use scraper::Selector;
use url::Url;

use intentgate_core::config::ExtractorConfig;
use intentgate_core::domain::domain_matches;

use crate::document::PageDocument;
use crate::noise::clean_metadata;
use crate::types::{Sections, SiteKind};

/// Extractor for one family of sites.
pub trait SiteExtractor: Send + Sync {
    /// Kind reported for results of this extractor.
    fn kind(&self) -> SiteKind;

    /// Whether this extractor handles `domain` (normalized).
    fn handles(&self, domain: &str) -> bool;

    /// Extract labelled text. An empty result hands over to the fallback.
    fn extract(&self, doc: &PageDocument, url: &Url, config: &ExtractorConfig) -> String;
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

fn query_param(url: &Url, names: &[&str]) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| names.contains(&k.as_ref()))
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

static YT_TITLE: Lazy<Selector> =
    Lazy::new(|| selector("h1.ytd-watch-metadata, h1.title, #title h1"));
static YT_CHANNEL: Lazy<Selector> =
    Lazy::new(|| selector("#channel-name a, ytd-channel-name a, .ytd-channel-name a"));
static YT_CHANNEL_META: Lazy<Selector> =
    Lazy::new(|| selector(r#"span[itemprop="author"] link[itemprop="name"]"#));
static YT_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| selector("#description-inline-expander, #description yt-formatted-string"));

/// Video platform: title, channel and description of the video.
pub struct VideoExtractor;

impl SiteExtractor for VideoExtractor {
    fn kind(&self) -> SiteKind {
        SiteKind::Video
    }

    fn handles(&self, domain: &str) -> bool {
        ["youtube.com", "youtu.be", "vimeo.com"]
            .iter()
            .any(|d| domain_matches(domain, d))
    }

    fn extract(&self, doc: &PageDocument, url: &Url, _config: &ExtractorConfig) -> String {
        let title = doc
            .first_text(&YT_TITLE)
            .and_then(|t| clean_metadata(&t))
            .or_else(|| doc.title());
        let channel = doc
            .first_text(&YT_CHANNEL)
            .or_else(|| doc.attr(&YT_CHANNEL_META, "content"));
        let description = doc
            .first_text(&YT_DESCRIPTION)
            .and_then(|t| clean_metadata(&t))
            .or_else(|| doc.description());

        let mut sections = Sections::default();
        sections
            .push("Video", title)
            .push("Channel", channel)
            .push("Search", query_param(url, &["search_query"]))
            .push("Description", description);
        sections.finish()
    }
}

static POST_TITLE: Lazy<Selector> =
    Lazy::new(|| selector(r#"h1, [slot="title"], a[data-testid="post-title"]"#));
static SHREDDIT_POST: Lazy<Selector> = Lazy::new(|| selector("shreddit-post"));
static POST_BODY: Lazy<Selector> = Lazy::new(|| {
    selector(r#"[slot="text-body"], div[data-click-id="text"], .usertext-body, .md"#)
});

/// Forum: community, post title and post body.
pub struct ForumExtractor;

impl ForumExtractor {
    fn community(url: &Url) -> Option<String> {
        let mut segments = url.path_segments()?;
        match (segments.next(), segments.next()) {
            (Some("r"), Some(name)) if !name.is_empty() => Some(format!("r/{}", name)),
            _ => None,
        }
    }
}

impl SiteExtractor for ForumExtractor {
    fn kind(&self) -> SiteKind {
        SiteKind::Forum
    }

    fn handles(&self, domain: &str) -> bool {
        domain_matches(domain, "reddit.com")
    }

    fn extract(&self, doc: &PageDocument, url: &Url, config: &ExtractorConfig) -> String {
        let title = doc
            .attr(&SHREDDIT_POST, "post-title")
            .or_else(|| doc.first_text(&POST_TITLE))
            .and_then(|t| clean_metadata(&t))
            .or_else(|| doc.title());
        let body = doc
            .first_text(&POST_BODY)
            .filter(|b| b.chars().count() >= config.min_block_length);

        let mut sections = Sections::default();
        sections
            .push("Community", Self::community(url))
            .push("Post", title)
            .push("Search", query_param(url, &["q"]))
            .push("Body", body);
        sections.finish()
    }
}

/// Image boards and image search: the search query is the best signal.
pub struct ImageSearchExtractor;

impl SiteExtractor for ImageSearchExtractor {
    fn kind(&self) -> SiteKind {
        SiteKind::ImageSearch
    }

    fn handles(&self, domain: &str) -> bool {
        ["pinterest.com", "images.google.com", "unsplash.com"]
            .iter()
            .any(|d| domain_matches(domain, d))
    }

    fn extract(&self, doc: &PageDocument, url: &Url, _config: &ExtractorConfig) -> String {
        let query = query_param(url, &["q", "query", "rs"]).or_else(|| {
            // unsplash.com/s/photos/<query>
            let segments: Vec<&str> = url.path_segments()?.collect();
            match segments.as_slice() {
                ["s", _, query, ..] if !query.is_empty() => Some(query.replace('-', " ")),
                _ => None,
            }
        });

        let mut sections = Sections::default();
        sections
            .push("Image search", query)
            .push("Title", doc.title())
            .push("Description", doc.description());
        sections.finish()
    }
}

/// Fallback: metadata plus the top-ranked visible text blocks.
pub struct GenericExtractor;

impl SiteExtractor for GenericExtractor {
    fn kind(&self) -> SiteKind {
        SiteKind::Generic
    }

    fn handles(&self, _domain: &str) -> bool {
        true
    }

    fn extract(&self, doc: &PageDocument, _url: &Url, config: &ExtractorConfig) -> String {
        let mut sections = Sections::default();
        sections
            .push("Title", doc.title())
            .push("Description", doc.description());
        for block in doc
            .ranked_blocks(config.min_block_length)
            .into_iter()
            .take(config.top_blocks)
        {
            sections.push_raw(&block.text);
        }
        sections.finish()
    }
}

/// Site extractors in dispatch order, fallback last.
pub fn default_extractors() -> Vec<Box<dyn SiteExtractor>> {
    vec![
        Box::new(VideoExtractor),
        Box::new(ForumExtractor),
        Box::new(ImageSearchExtractor),
        Box::new(GenericExtractor),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_video_fields() {
        let doc = PageDocument::parse(
            r#"<html><head><title>(1) Tokio tutorial - YouTube</title>
            <meta name="description" content="Build an async chat server"></head>
            <body><span itemprop="author"><link itemprop="name" content="Rust Channel"></span></body></html>"#,
        );
        let text = VideoExtractor.extract(
            &doc,
            &url("https://www.youtube.com/watch?v=abc"),
            &ExtractorConfig::default(),
        );
        assert_eq!(
            text,
            "Video: Tokio tutorial - YouTube\nChannel: Rust Channel\nDescription: Build an async chat server"
        );
    }

    #[test]
    fn test_video_search_results() {
        let doc = PageDocument::parse("<html><head><title>YouTube</title></head></html>");
        let text = VideoExtractor.extract(
            &doc,
            &url("https://www.youtube.com/results?search_query=rust+lifetimes"),
            &ExtractorConfig::default(),
        );
        assert_eq!(text, "Search: rust lifetimes");
    }

    #[test]
    fn test_forum_fields() {
        let doc = PageDocument::parse(
            r#"<html><body>
            <shreddit-post post-title="How do I share state between tasks?"></shreddit-post>
            <div slot="text-body"><p>I have an Arc of a Mutex and the borrow checker complains.</p></div>
            </body></html>"#,
        );
        let text = ForumExtractor.extract(
            &doc,
            &url("https://www.reddit.com/r/rust/comments/1/how_do_i"),
            &ExtractorConfig::default(),
        );
        assert_eq!(
            text,
            "Community: r/rust\nPost: How do I share state between tasks?\nBody: I have an Arc of a Mutex and the borrow checker complains."
        );
    }

    #[test]
    fn test_image_search_query() {
        let doc = PageDocument::parse("<html></html>");
        let config = ExtractorConfig::default();
        assert_eq!(
            ImageSearchExtractor.extract(
                &doc,
                &url("https://www.pinterest.com/search/pins/?q=kitchen%20shelves"),
                &config
            ),
            "Image search: kitchen shelves"
        );
        assert_eq!(
            ImageSearchExtractor.extract(&doc, &url("https://unsplash.com/s/photos/mountain-lake"), &config),
            "Image search: mountain lake"
        );
    }

    #[test]
    fn test_generic_takes_top_blocks() {
        let doc = PageDocument::parse(
            r#"<html><head><title>Release notes</title></head><body>
            <p>First paragraph with enough characters to count.</p>
            <p>Second paragraph with enough characters to count, and longer.</p>
            <p>tiny</p></body></html>"#,
        );
        let config = ExtractorConfig {
            top_blocks: 1,
            ..ExtractorConfig::default()
        };
        let text = GenericExtractor.extract(&doc, &url("https://example.org/notes"), &config);
        assert_eq!(
            text,
            "Title: Release notes\nSecond paragraph with enough characters to count, and longer."
        );
    }

    #[test]
    fn test_dispatch_order() {
        let extractors = default_extractors();
        let pick = |domain: &str| {
            extractors
                .iter()
                .find(|e| e.handles(domain))
                .map(|e| e.kind())
        };
        assert_eq!(pick("m.youtube.com"), Some(SiteKind::Video));
        assert_eq!(pick("old.reddit.com"), Some(SiteKind::Forum));
        assert_eq!(pick("pinterest.com"), Some(SiteKind::ImageSearch));
        assert_eq!(pick("docs.rs"), Some(SiteKind::Generic));
    }
}
