//! Noise filters for page metadata.
//!
//! Titles and descriptions scraped from single-page apps are often
//! placeholders ("Loading...") or carry a notification counter ("(3) Home").
//! These functions are pure so they can be tested against fixture strings.

use once_cell::sync::Lazy;
use regex::Regex;

static NOTIFICATION_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[(\[]\s*\d+\+?\s*[)\]]\s*").unwrap());

static NOISE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // loading placeholders
        r"(?i)^\s*loading\W*$",
        r"(?i)^\s*(please\s+)?wait\W*$",
        r"(?i)^\s*just a moment\W*$",
        // bare counters
        r"^\s*[(\[]?\s*\d+\+?\s*[)\]]?\s*$",
        // unread-notification titles
        r"(?i)^\s*\d+\+?\s+(new\s+)?(notifications?|messages?|unread)\b",
        // bare platform names with nothing about the page
        r"(?i)^\s*(youtube|reddit|facebook|instagram|x|twitter|tiktok|pinterest|linkedin)\s*$",
        // client-side error shells
        r"(?i)^\s*(something went wrong|an error occurred)\W*$",
        r"(?i)enable javascript",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Whether the text is a known placeholder with nothing about the page.
pub fn is_noise(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || NOISE_PATTERNS.iter().any(|re| re.is_match(text))
}

/// Drop a leading notification counter such as `(3) `.
pub fn strip_notification_count(text: &str) -> &str {
    match NOTIFICATION_COUNT_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Clean one metadata value: trims, strips counters, collapses whitespace,
/// and rejects noise.
pub fn clean_metadata(text: &str) -> Option<String> {
    let stripped = strip_notification_count(text.trim());
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if is_noise(&collapsed) {
        None
    } else {
        Some(collapsed)
    }
}
