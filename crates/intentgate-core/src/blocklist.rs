//! Blocklist resolution.
//!
//! Built-in category ("preset") domains are blocked unless the user has an
//! override for them. User-added ("custom") domains are blocked only while an
//! override exists. The same override set therefore means "unblocked" for a
//! preset domain and "blocked" for a custom one, and [`BlocklistResolver`]
//! keeps that as an explicit branch.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::{debug, warn};

use crate::domain::{domain_matches, normalize_domain, url_path};
use crate::error::{GateError, GateResult};
use crate::traits::{KeyValueStore, OverrideSource};

/// Key holding the user's override set.
pub const BLOCKED_SITES_KEY: &str = "blocked_sites";

/// Built-in site category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Social,
    Video,
    News,
    Shopping,
    Gaming,
}

impl Category {
    /// Domains in this category.
    pub fn domains(&self) -> &'static [&'static str] {
        match self {
            Category::Social => &[
                "facebook.com",
                "instagram.com",
                "twitter.com",
                "x.com",
                "tiktok.com",
                "reddit.com",
                "linkedin.com",
                "snapchat.com",
                "pinterest.com",
                "tumblr.com",
                "threads.net",
            ],
            Category::Video => &[
                "youtube.com",
                "netflix.com",
                "twitch.tv",
                "hulu.com",
                "disneyplus.com",
                "primevideo.com",
                "vimeo.com",
            ],
            Category::News => &[
                "cnn.com",
                "foxnews.com",
                "nytimes.com",
                "bbc.com",
                "theguardian.com",
                "news.ycombinator.com",
            ],
            Category::Shopping => &["amazon.com", "ebay.com", "etsy.com", "aliexpress.com"],
            Category::Gaming => &["steampowered.com", "roblox.com", "chess.com"],
        }
    }

    /// Whether a bare number submitted on this category grants a timed pass.
    pub fn time_blockable(&self) -> bool {
        matches!(self, Category::Social | Category::Video)
    }

    /// Category of a normalized domain, matching exactly or by suffix.
    pub fn of(domain: &str) -> Option<Category> {
        Category::iter().find(|c| c.domains().iter().any(|d| domain_matches(domain, d)))
    }
}

/// A domain + path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    /// Normalized domain, matched exactly or by suffix.
    pub domain: String,
    /// Path prefix, or the full path when `exact` is set.
    pub path: String,
    #[serde(default)]
    pub exact: bool,
}

impl PathRule {
    /// Rule matching every path under `path`.
    pub fn prefix(domain: &str, path: &str) -> Self {
        Self {
            domain: domain.to_string(),
            path: path.to_string(),
            exact: false,
        }
    }

    /// Rule matching exactly `path`.
    pub fn exact(domain: &str, path: &str) -> Self {
        Self {
            domain: domain.to_string(),
            path: path.to_string(),
            exact: true,
        }
    }

    /// Whether the rule covers `path` on `domain`.
    pub fn matches(&self, domain: &str, path: &str) -> bool {
        if !domain_matches(domain, &self.domain) {
            return false;
        }
        if self.exact {
            path == self.path
        } else {
            path.starts_with(&self.path)
        }
    }

    /// Home, search, feed and messaging pages that never prompt.
    pub fn default_allow_list() -> Vec<PathRule> {
        vec![
            PathRule::exact("youtube.com", "/"),
            PathRule::prefix("youtube.com", "/results"),
            PathRule::prefix("linkedin.com", "/feed"),
            PathRule::prefix("linkedin.com", "/messaging"),
            PathRule::prefix("x.com", "/messages"),
            PathRule::prefix("twitter.com", "/messages"),
            PathRule::prefix("facebook.com", "/messages"),
            PathRule::prefix("reddit.com", "/message"),
        ]
    }
}

/// Short-form video feeds: blocked regardless of overrides.
fn hard_blocked() -> &'static [(&'static str, &'static str)] {
    &[
        ("youtube.com", "/shorts"),
        ("instagram.com", "/reels"),
        ("instagram.com", "/reel/"),
        ("facebook.com", "/reel"),
    ]
}

/// Direct-message inboxes: allowed regardless of overrides.
fn hard_allowed() -> &'static [(&'static str, &'static str)] {
    &[
        ("instagram.com", "/direct"),
        ("facebook.com", "/messages"),
        ("messenger.com", "/"),
        ("x.com", "/messages"),
        ("twitter.com", "/messages"),
        ("linkedin.com", "/messaging"),
    ]
}

/// Which branch decided a blocklist lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockVerdict {
    /// A hard path rule blocks this URL.
    HardBlocked,
    /// A hard path rule allows this URL.
    HardAllowed,
    /// Built-in category domain.
    Preset { overridden: bool },
    /// Domain outside every category.
    Custom { overridden: bool },
}

impl BlockVerdict {
    /// Whether the URL is blocked.
    pub fn is_blocked(&self) -> bool {
        match *self {
            BlockVerdict::HardBlocked => true,
            BlockVerdict::HardAllowed => false,
            // Override on a preset domain means the user unblocked it.
            BlockVerdict::Preset { overridden } => !overridden,
            // Override on a custom domain means the user blocked it.
            BlockVerdict::Custom { overridden } => overridden,
        }
    }
}

/// Resolves whether a URL is blocked.
pub struct BlocklistResolver {
    overrides: Arc<dyn OverrideSource>,
}

impl BlocklistResolver {
    /// Create a resolver reading overrides from `overrides`.
    pub fn new(overrides: Arc<dyn OverrideSource>) -> Self {
        Self { overrides }
    }

    /// Decide which branch applies to `url`.
    pub async fn resolve(&self, url: &str) -> GateResult<BlockVerdict> {
        let domain = normalize_domain(url);
        let path = url_path(url);

        if hard_blocked()
            .iter()
            .any(|(d, p)| domain_matches(&domain, d) && path.starts_with(p))
        {
            return Ok(BlockVerdict::HardBlocked);
        }
        if hard_allowed()
            .iter()
            .any(|(d, p)| domain_matches(&domain, d) && path.starts_with(p))
        {
            return Ok(BlockVerdict::HardAllowed);
        }

        let is_preset = Category::of(&domain).is_some();
        let overrides = self.overrides.overrides().await?;
        let overridden = overrides
            .iter()
            .map(|o| normalize_domain(o))
            .any(|o| domain_matches(&domain, &o));

        let verdict = if is_preset {
            BlockVerdict::Preset { overridden }
        } else {
            BlockVerdict::Custom { overridden }
        };
        debug!(domain = %domain, ?verdict, "Resolved blocklist verdict");
        Ok(verdict)
    }

    /// Whether `url` is blocked; an unavailable override set fails open.
    pub async fn is_blocked(&self, url: &str) -> bool {
        match self.resolve(url).await {
            Ok(verdict) => verdict.is_blocked(),
            Err(e) => {
                warn!(url = %url, error = %e, "Override set unavailable, treating as not blocked");
                false
            }
        }
    }
}

/// Entry of the persisted override set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedSiteOverride {
    pub domain: String,
}

/// Override set stored under [`BLOCKED_SITES_KEY`] in a key-value store.
pub struct KvOverrideSource {
    kv: Arc<dyn KeyValueStore>,
}

impl KvOverrideSource {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    async fn load(&self) -> GateResult<Vec<BlockedSiteOverride>> {
        match self.kv.get(BLOCKED_SITES_KEY).await? {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| GateError::corrupted(BLOCKED_SITES_KEY, e)),
        }
    }

    /// Add a domain to the override set. Returns false if it was present.
    pub async fn add(&self, domain: &str) -> GateResult<bool> {
        let domain = normalize_domain(domain);
        let mut entries = self.load().await?;
        if entries.iter().any(|e| e.domain == domain) {
            return Ok(false);
        }
        entries.push(BlockedSiteOverride { domain });
        self.kv
            .set(BLOCKED_SITES_KEY, serde_json::to_value(&entries)?)
            .await?;
        Ok(true)
    }

    /// Remove a domain from the override set. Returns false if it was absent.
    pub async fn remove(&self, domain: &str) -> GateResult<bool> {
        let domain = normalize_domain(domain);
        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|e| e.domain != domain);
        if entries.len() == before {
            return Ok(false);
        }
        self.kv
            .set(BLOCKED_SITES_KEY, serde_json::to_value(&entries)?)
            .await?;
        Ok(true)
    }

    /// Make `domain` blocked: drops the override of a preset domain, adds
    /// one for a custom domain. Returns false if it was already blocked.
    pub async fn block(&self, domain: &str) -> GateResult<bool> {
        let domain = normalize_domain(domain);
        if Category::of(&domain).is_some() {
            self.remove(&domain).await
        } else {
            self.add(&domain).await
        }
    }

    /// Make `domain` allowed: adds an override for a preset domain, drops
    /// the one of a custom domain. Returns false if it was already allowed.
    pub async fn unblock(&self, domain: &str) -> GateResult<bool> {
        let domain = normalize_domain(domain);
        if Category::of(&domain).is_some() {
            self.add(&domain).await
        } else {
            self.remove(&domain).await
        }
    }
}

#[async_trait]
impl OverrideSource for KvOverrideSource {
    async fn overrides(&self) -> GateResult<Vec<String>> {
        Ok(self.load().await?.into_iter().map(|e| e.domain).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;
    use crate::traits::MockOverrideSource;

    fn resolver_with(overrides: &[&str]) -> BlocklistResolver {
        let list: Vec<String> = overrides.iter().map(|s| s.to_string()).collect();
        let mut source = MockOverrideSource::new();
        source
            .expect_overrides()
            .returning(move || Ok(list.clone()));
        BlocklistResolver::new(Arc::new(source))
    }

    #[tokio::test]
    async fn test_preset_not_overridden_is_blocked() {
        let resolver = resolver_with(&[]);
        let verdict = resolver.resolve("https://www.youtube.com/watch?v=1").await.unwrap();
        assert_eq!(verdict, BlockVerdict::Preset { overridden: false });
        assert!(resolver.is_blocked("https://www.youtube.com/watch?v=1").await);
    }

    #[tokio::test]
    async fn test_preset_overridden_is_not_blocked() {
        let resolver = resolver_with(&["youtube.com"]);
        let verdict = resolver.resolve("https://youtube.com/watch?v=1").await.unwrap();
        assert_eq!(verdict, BlockVerdict::Preset { overridden: true });
        assert!(!resolver.is_blocked("https://youtube.com/watch?v=1").await);
    }

    #[tokio::test]
    async fn test_custom_overridden_is_blocked() {
        let resolver = resolver_with(&["example.org"]);
        let verdict = resolver.resolve("https://example.org/page").await.unwrap();
        assert_eq!(verdict, BlockVerdict::Custom { overridden: true });
        assert!(resolver.is_blocked("https://example.org/page").await);
    }

    #[tokio::test]
    async fn test_custom_not_overridden_is_not_blocked() {
        let resolver = resolver_with(&[]);
        let verdict = resolver.resolve("https://example.org/page").await.unwrap();
        assert_eq!(verdict, BlockVerdict::Custom { overridden: false });
        assert!(!resolver.is_blocked("https://example.org/page").await);
    }

    #[tokio::test]
    async fn test_suffix_matching_for_subdomains() {
        let resolver = resolver_with(&["example.org"]);
        assert!(resolver.is_blocked("https://m.youtube.com/watch").await);
        assert!(resolver.is_blocked("https://blog.example.org/").await);
    }

    #[tokio::test]
    async fn test_hard_rules_ignore_overrides() {
        let resolver = resolver_with(&["youtube.com", "instagram.com"]);
        assert_eq!(
            resolver.resolve("https://youtube.com/shorts/xyz").await.unwrap(),
            BlockVerdict::HardBlocked
        );
        assert!(resolver.is_blocked("https://youtube.com/shorts/xyz").await);
        assert_eq!(
            resolver.resolve("youtube.com:443/shorts/xyz").await.unwrap(),
            BlockVerdict::HardBlocked
        );

        let resolver = resolver_with(&[]);
        assert_eq!(
            resolver.resolve("https://www.instagram.com/direct/inbox/").await.unwrap(),
            BlockVerdict::HardAllowed
        );
        assert!(!resolver.is_blocked("https://www.instagram.com/direct/inbox/").await);
    }

    #[tokio::test]
    async fn test_unavailable_overrides_fail_open() {
        let mut source = MockOverrideSource::new();
        source
            .expect_overrides()
            .returning(|| Err(GateError::storage("down")));
        let resolver = BlocklistResolver::new(Arc::new(source));
        assert!(!resolver.is_blocked("https://youtube.com/watch").await);
    }

    #[test]
    fn test_category_lookup() {
        assert_eq!(Category::of("youtube.com"), Some(Category::Video));
        assert_eq!(Category::of("old.reddit.com"), Some(Category::Social));
        assert_eq!(Category::of("example.org"), None);
        assert!(Category::Video.time_blockable());
        assert!(!Category::News.time_blockable());
        assert_eq!(Category::Social.to_string(), "social");
    }

    #[test]
    fn test_path_rules() {
        let home = PathRule::exact("youtube.com", "/");
        assert!(home.matches("youtube.com", "/"));
        assert!(!home.matches("youtube.com", "/watch"));
        let inbox = PathRule::prefix("linkedin.com", "/messaging");
        assert!(inbox.matches("linkedin.com", "/messaging/thread/1"));
        assert!(!inbox.matches("example.com", "/messaging"));
    }

    #[tokio::test]
    async fn test_kv_override_source_round_trip() {
        let kv = Arc::new(MemoryKvStore::new());
        let source = KvOverrideSource::new(kv.clone());
        assert!(source.add("https://www.example.org/x").await.unwrap());
        assert!(!source.add("example.org").await.unwrap());
        assert_eq!(source.overrides().await.unwrap(), vec!["example.org".to_string()]);

        let stored = kv.get(BLOCKED_SITES_KEY).await.unwrap().unwrap();
        assert_eq!(stored, serde_json::json!([{ "domain": "example.org" }]));

        assert!(source.remove("example.org").await.unwrap());
        assert!(source.overrides().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_block_and_unblock_follow_domain_polarity() {
        let kv = Arc::new(MemoryKvStore::new());
        let source = Arc::new(KvOverrideSource::new(kv));
        let resolver = BlocklistResolver::new(source.clone());

        // Preset: blocked until unblocked.
        assert!(!source.block("youtube.com").await.unwrap());
        assert!(source.unblock("youtube.com").await.unwrap());
        assert!(!resolver.is_blocked("https://youtube.com/watch?v=1").await);
        assert!(source.block("https://www.youtube.com/").await.unwrap());
        assert!(resolver.is_blocked("https://youtube.com/watch?v=1").await);

        // Custom: allowed until blocked.
        assert!(!source.unblock("example.org").await.unwrap());
        assert!(source.block("example.org").await.unwrap());
        assert!(resolver.is_blocked("https://example.org/").await);
        assert!(source.unblock("example.org").await.unwrap());
        assert!(!resolver.is_blocked("https://example.org/").await);

        assert!(source.overrides().await.unwrap().is_empty());
    }
}
