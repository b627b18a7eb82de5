//! Parsed page document over `scraper`.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::noise::clean_metadata;
use crate::types::TextBlock;

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:description"]"#).unwrap());
static BLOCKS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1, h2, h3, p, li, blockquote, article, figcaption, td, pre").unwrap()
});

/// Tags whose text never counts as page content.
const SKIPPED_ANCESTORS: &[&str] = &["nav", "footer", "aside", "script", "style", "noscript", "form"];

/// Ranking weight of a block tag.
fn tag_weight(tag: &str) -> f32 {
    match tag {
        "h1" => 3.0,
        "h2" => 2.5,
        "h3" => 2.0,
        "article" | "blockquote" => 1.5,
        "p" | "figcaption" | "pre" => 1.0,
        "li" => 0.8,
        _ => 0.5,
    }
}

/// A parsed HTML page.
pub struct PageDocument {
    html: Html,
}

impl PageDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// Page title: `<title>`, then `og:title`, then the first `<h1>`, skipping
    /// noise.
    pub fn title(&self) -> Option<String> {
        self.first_text(&TITLE)
            .and_then(|t| clean_metadata(&t))
            .or_else(|| self.meta_content(&OG_TITLE))
            .or_else(|| self.first_text(&H1).and_then(|t| clean_metadata(&t)))
    }

    /// Meta description, then `og:description`, skipping noise.
    pub fn description(&self) -> Option<String> {
        self.meta_content(&DESCRIPTION)
            .or_else(|| self.meta_content(&OG_DESCRIPTION))
    }

    /// Cleaned `content` of the first element matching `selector`.
    pub fn meta_content(&self, selector: &Selector) -> Option<String> {
        self.html
            .select(selector)
            .filter_map(|el| el.value().attr("content"))
            .find_map(clean_metadata)
    }

    /// Value of `attr` on the first element matching `selector`.
    pub fn attr(&self, selector: &Selector, attr: &str) -> Option<String> {
        self.html
            .select(selector)
            .filter_map(|el| el.value().attr(attr))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }

    /// Whitespace-collapsed text of the first non-empty match.
    pub fn first_text(&self, selector: &Selector) -> Option<String> {
        self.html
            .select(selector)
            .map(element_text)
            .find(|t| !t.is_empty())
    }

    /// Visible text blocks of at least `min_len` characters, best first.
    ///
    /// Score is tag weight times length. Text inside navigation, footers and
    /// forms is skipped, as is a block whose text repeats an earlier one.
    pub fn ranked_blocks(&self, min_len: usize) -> Vec<TextBlock> {
        let mut seen = std::collections::HashSet::new();
        let mut blocks: Vec<TextBlock> = self
            .html
            .select(&BLOCKS)
            .filter(|el| !has_skipped_ancestor(el))
            .filter_map(|el| {
                let text = element_text(el);
                let len = text.chars().count();
                if len < min_len || !seen.insert(text.clone()) {
                    return None;
                }
                let tag = el.value().name().to_string();
                let score = tag_weight(&tag) * len as f32;
                Some(TextBlock { tag, text, score })
            })
            .collect();
        blocks.sort_by(|a, b| b.score.total_cmp(&a.score));
        blocks
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_skipped_ancestor(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| SKIPPED_ANCESTORS.contains(&a.value().name()))
}
