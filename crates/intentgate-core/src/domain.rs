//! Domain normalization.
//!
//! Every key the store writes and every comparison the resolver makes goes
//! through [`normalize_domain`], so `https://www.YouTube.com/watch?v=1` and
//! `youtube.com` address the same record.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:[a-z][a-z0-9+.-]*://)?(?:www\.)?((?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,})")
        .unwrap()
});

const INTERNAL_SCHEMES: &[&str] = &[
    "about",
    "chrome",
    "chrome-extension",
    "chrome-search",
    "devtools",
    "edge",
    "moz-extension",
    "safari-extension",
    "view-source",
    "data",
    "blob",
    "file",
];

/// Canonical domain key for a URL or bare domain.
///
/// Never fails: parses the input as a URL and takes the host without a
/// leading `www.`; failing that, extracts the first domain-like substring;
/// failing that, returns the input unchanged.
pub fn normalize_domain(input: &str) -> String {
    let trimmed = input.trim();

    if let Ok(parsed) = Url::parse(trimmed) {
        if let Some(host) = parsed.host_str() {
            if !host.is_empty() {
                return strip_www(&host.to_ascii_lowercase()).to_string();
            }
        }
    }

    if let Some(found) = DOMAIN_RE.captures(trimmed).and_then(|c| c.get(1)) {
        return strip_www(&found.as_str().to_ascii_lowercase()).to_string();
    }

    input.to_string()
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Whether `domain` equals `pattern` or is a subdomain of it.
///
/// Both sides are expected to be normalized.
pub fn domain_matches(domain: &str, pattern: &str) -> bool {
    if domain == pattern {
        return true;
    }
    domain.len() > pattern.len()
        && domain.ends_with(pattern)
        && domain.as_bytes()[domain.len() - pattern.len() - 1] == b'.'
}

/// Whether the URL belongs to the browser or an extension rather than a site.
pub fn is_internal_url(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => INTERNAL_SCHEMES.contains(&parsed.scheme()),
        Err(_) => false,
    }
}

/// Path of a URL, or `/` when it has none or does not parse.
pub fn url_path(url: &str) -> String {
    let trimmed = url.trim();
    let parsed = if trimmed.contains("://") {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("https://{}", trimmed))
    };
    match parsed {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => "/".to_string(),
    }
}
