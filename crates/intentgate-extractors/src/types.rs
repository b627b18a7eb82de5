//! Core types for content extraction.

use serde::Serialize;

/// Which extractor produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    Video,
    Forum,
    ImageSearch,
    Generic,
}

/// A block of visible text with its ranking score.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// Tag name of the element the text came from.
    pub tag: String,
    pub text: String,
    /// Tag weight times text length.
    pub score: f32,
}

/// Text extracted from a page for intention matching.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedContent {
    pub site: SiteKind,
    /// Labelled lines, e.g. `Title: ...`.
    pub text: String,
    /// Whether `text` was cut to the length cap.
    pub truncated: bool,
}

impl ExtractedContent {
    /// Whether nothing usable was found.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Builder for labelled extraction output.
#[derive(Debug, Default)]
pub(crate) struct Sections {
    lines: Vec<String>,
}

impl Sections {
    pub fn push(&mut self, label: &str, value: Option<String>) -> &mut Self {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.lines.push(format!("{}: {}", label, value.trim()));
        }
        self
    }

    pub fn push_raw(&mut self, text: &str) -> &mut Self {
        if !text.trim().is_empty() {
            self.lines.push(text.trim().to_string());
        }
        self
    }

    pub fn finish(&self) -> String {
        self.lines.join("\n")
    }
}
