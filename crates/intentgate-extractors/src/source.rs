//! Where page HTML comes from.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ExtractError, ExtractResult};

const USER_AGENT: &str = concat!("intentgate/", env!("CARGO_PKG_VERSION"));

/// Supplies the HTML of the page at a URL.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> ExtractResult<String>;
}

/// Fetches pages over HTTP.
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new(timeout_ms: u64) -> ExtractResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> ExtractResult<String> {
        debug!(url, "fetching page");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Serves pages from memory, keyed by exact URL.
#[derive(Debug, Default, Clone)]
pub struct StaticPageSource {
    pages: HashMap<String, String>,
}

impl StaticPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }
}

#[async_trait]
impl PageSource for StaticPageSource {
    async fn fetch(&self, url: &str) -> ExtractResult<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ExtractError::NotFound(url.to_string()))
    }
}
