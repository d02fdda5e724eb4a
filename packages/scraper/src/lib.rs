#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Scraping pipeline for the business registry.
//!
//! Provides the [`Fetcher`] trait with an HTTP implementation ([`fetch`]),
//! the listing and detail page parsers ([`listing`], [`detail`]) and the
//! pagination driver ([`pagination`]) that ties them together into a
//! [`pagination::CrawlReport`].
//!
//! This crate has no awareness of users or persistence. It turns registry
//! markup into [`bizwatch_business_models::BusinessRecord`] values that
//! callers can store however they like.

pub mod detail;
pub mod fetch;
pub mod link;
pub mod listing;
pub mod pagination;
pub mod progress;

use std::collections::BTreeMap;
use std::time::Duration;

/// Default registry host.
pub const DEFAULT_BASE_URL: &str = "https://masothue.com";

/// Default path of the newly-registered businesses listing.
pub const DEFAULT_LISTING_PATH: &str = "/tra-cuu-ma-so-thue-doanh-nghiep-moi-thanh-lap";

/// Browser user agent sent with every request; the registry rejects
/// obvious bot agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// Upper bound on the pages a single crawl visits.
pub const DEFAULT_MAX_PAGES: u32 = 200;

/// Errors that can occur while fetching or parsing registry pages.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The request did not complete within the configured timeout.
    #[error("Request to {url} timed out")]
    Timeout {
        /// The URL that was requested.
        url: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The response status code.
        status: u16,
    },

    /// The connection failed or the body could not be read.
    #[error("Connection to {url} failed: {source}")]
    Connection {
        /// The URL that was requested.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// A selector or header could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ScrapeError {
    /// Whether this is a network-level failure of a single request, as
    /// opposed to a configuration problem.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Status { .. } | Self::Connection { .. }
        )
    }
}

/// Where and how to reach the registry.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Scheme and host, e.g. `https://masothue.com`.
    pub base_url: String,
    /// Path of the listing page, relative to `base_url`.
    pub listing_path: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// HTTP headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Page count above which a crawl is cut short, whether the count was
    /// requested or read from the pagination control.
    pub max_pages: u32,
}

impl ScrapeConfig {
    /// Creates a config for `base_url` with the default listing path, a
    /// 10 second timeout, a browser user agent and the default page cap.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_owned(), DEFAULT_USER_AGENT.to_owned());
        Self {
            base_url: base_url.to_owned(),
            listing_path: DEFAULT_LISTING_PATH.to_owned(),
            timeout: Duration::from_secs(10),
            headers,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Sets the listing path.
    #[must_use]
    pub fn with_listing_path(mut self, path: &str) -> Self {
        path.clone_into(&mut self.listing_path);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the page cap.
    #[must_use]
    pub const fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Adds or replaces an HTTP header.
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_owned(), value.to_owned());
        self
    }

    /// Returns the URL of listing page `page` (1-based).
    #[must_use]
    pub fn page_url(&self, page: u32) -> String {
        link::page_url(&self.base_url, &self.listing_path, page)
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Retrieves the raw markup behind a URL.
///
/// [`fetch::HttpFetcher`] is the production implementation. The pipeline
/// only depends on this trait so that crawls can be driven from canned
/// pages.
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and returns the response body.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] on timeout, connection failure or a non-2xx
    /// status.
    fn fetch(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<String, ScrapeError>> + Send;
}

/// Parses a CSS selector string, returning a [`ScrapeError`] on failure.
pub(crate) fn parse_selector(selector: &str) -> Result<scraper::Selector, ScrapeError> {
    scraper::Selector::parse(selector)
        .map_err(|e| ScrapeError::Parse(format!("invalid CSS selector '{selector}': {e}")))
}

/// Concatenates the text nodes of an element and collapses whitespace.
pub(crate) fn element_text(element: &scraper::ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
