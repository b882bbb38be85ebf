use anyhow::{Context, Result};
use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use url::Url;

use crate::error::ApplyError;
use crate::robots;

pub const DEFAULT_BASE_URL: &str = "https://www.hellowork.com";
pub const DEFAULT_SEARCH_PATH: &str = "/fr-fr/recherche-emploi/";
pub const DEFAULT_SOURCE: &str = "hellowork";

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

// --- Source trait ---

/// Where search result pages come from.
pub trait SearchSource {
    /// Whether robots.txt lets us crawl the search path.
    fn search_allowed(&self) -> bool;
    /// Raw markup of result page `page` (1-based) for `query`.
    fn fetch_page(&self, query: &str, page: u32) -> Result<String, ApplyError>;
}

#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub base_url: Url,
    pub search_path: String,
    pub source: String,
}

impl SiteConfig {
    pub fn new(base: &str, search_path: &str) -> Result<Self> {
        let base_url = Url::parse(base).with_context(|| format!("Invalid base URL: {}", base))?;
        Ok(Self {
            base_url,
            search_path: search_path.to_string(),
            source: DEFAULT_SOURCE.to_string(),
        })
    }

    pub fn search_url(&self) -> Result<Url> {
        self.base_url
            .join(&self.search_path)
            .with_context(|| format!("Invalid search path: {}", self.search_path))
    }

    /// Search URL for one result page, `?q=<query>&page=<n>`.
    pub fn page_url(&self, query: &str, page: u32) -> Result<Url> {
        let mut url = self.search_url()?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("page", &page.to_string());
        Ok(url)
    }
}

// --- HTTP implementation ---

pub struct SearchClient {
    client: Client,
    site: SiteConfig,
    robots_agent: String,
}

impl SearchClient {
    /// `user_agent` is sent on every request; `robots_agent` is the product
    /// token looked up in robots.txt.
    pub fn new(site: SiteConfig, user_agent: &str, robots_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).context("Invalid user agent")?,
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("fr-FR,fr;q=0.9"));

        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            site,
            robots_agent: robots_agent.to_string(),
        })
    }
}

impl SearchSource for SearchClient {
    fn search_allowed(&self) -> bool {
        robots::check_allowed(
            &self.client,
            &self.site.base_url,
            &self.robots_agent,
            &self.site.search_path,
        )
    }

    fn fetch_page(&self, query: &str, page: u32) -> Result<String, ApplyError> {
        let fail = |reason: String| ApplyError::Fetch { page, reason };

        let url = self.site.page_url(query, page).map_err(|e| fail(format!("{:#}", e)))?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {}", status)));
        }

        response.text().map_err(|e| fail(e.to_string()))
    }
}
