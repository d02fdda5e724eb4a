//! Application configuration.
//!
//! Defaults are embedded from `config/default.toml`. A user file is merged
//! over them key by key, so it only needs the settings it changes. The
//! `BIZWATCH_DATA_DIR` environment variable overrides `data_dir` last.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bizwatch_scraper::listing::ListingSelectors;
use bizwatch_scraper::ScrapeConfig;
use bizwatch_store::paths::DataPaths;
use serde::Deserialize;

/// Embedded default configuration.
const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Environment variable overriding [`AppConfig::data_dir`].
pub const DATA_DIR_ENV: &str = "BIZWATCH_DATA_DIR";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config is not valid TOML or has the wrong shape.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Directory holding accounts, watchlists and history.
    pub data_dir: PathBuf,
    /// Number of search history entries kept.
    pub history_limit: usize,
    /// Name of the protected admin account.
    pub admin_username: String,
    /// Password given to the admin account when it is first created.
    pub admin_initial_password: String,
    /// Registry access.
    pub scrape: ScrapeSettings,
    /// Listing selector overrides.
    #[serde(default)]
    pub selectors: SelectorSettings,
}

/// Registry access settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScrapeSettings {
    /// Scheme and host of the registry.
    pub base_url: String,
    /// Path of the new-businesses listing.
    pub listing_path: String,
    /// Selector of the attribute table on detail pages.
    pub detail_table_selector: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Pages crawled when a search does not say.
    pub default_pages: u32,
    /// Concurrent fetches when a search does not say.
    pub default_threads: usize,
    /// Most listing pages a single search visits.
    pub max_pages: u32,
}

/// Optional overrides of the listing selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SelectorSettings {
    /// Container selector.
    pub container: Option<String>,
    /// Name/link anchor selector.
    pub anchor: Option<String>,
    /// Address selector.
    pub address: Option<String>,
    /// Representative selector.
    pub representative: Option<String>,
    /// Tax-code element selector.
    pub tax_code: Option<String>,
    /// Pagination link selector.
    pub pagination: Option<String>,
}

impl AppConfig {
    /// Loads the defaults merged with the file at `path`, if given, and
    /// applies the environment override.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let user = match path {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|source| {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            })?),
            None => None,
        };

        let mut config = Self::from_toml(user.as_deref())?;

        if let Ok(dir) = std::env::var(DATA_DIR_ENV)
            && !dir.trim().is_empty()
        {
            config.data_dir = PathBuf::from(dir);
        }

        log::debug!("Using data directory {}", config.data_dir.display());
        Ok(config)
    }

    /// Parses the defaults merged with `overrides`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if either document is invalid.
    pub fn from_toml(overrides: Option<&str>) -> Result<Self, ConfigError> {
        let mut table: toml::Table = toml::from_str(DEFAULT_CONFIG_TOML)?;
        if let Some(text) = overrides {
            let user: toml::Table = toml::from_str(text)?;
            merge(&mut table, user);
        }
        Ok(toml::Value::Table(table).try_into()?)
    }

    /// Resolves the data directory layout.
    #[must_use]
    pub fn data_paths(&self) -> DataPaths {
        DataPaths::new(&self.data_dir)
    }

    /// Builds the scraper configuration.
    #[must_use]
    pub fn scrape_config(&self) -> ScrapeConfig {
        ScrapeConfig::new(&self.scrape.base_url)
            .with_listing_path(&self.scrape.listing_path)
            .with_timeout(Duration::from_secs(self.scrape.timeout_secs))
            .with_header("User-Agent", &self.scrape.user_agent)
            .with_max_pages(self.scrape.max_pages)
    }

    /// Builds the listing selectors, applying configured overrides.
    #[must_use]
    pub fn listing_selectors(&self) -> ListingSelectors {
        let s = &self.selectors;
        let mut selectors = ListingSelectors::default();
        if let Some(v) = &s.container {
            selectors = selectors.with_container(v);
        }
        if let Some(v) = &s.anchor {
            selectors = selectors.with_anchor(v);
        }
        if let Some(v) = &s.address {
            selectors = selectors.with_address(v);
        }
        if let Some(v) = &s.representative {
            selectors = selectors.with_representative(v);
        }
        if let Some(v) = &s.tax_code {
            selectors = selectors.with_tax_code(v);
        }
        if let Some(v) = &s.pagination {
            selectors = selectors.with_pagination(v);
        }
        selectors
    }
}

/// Recursively merges `overrides` into `base`; nested tables are merged,
/// everything else is replaced.
fn merge(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
