#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The per-invocation session.
//!
//! A [`Session`] ties the configuration, the scraper and the JSON stores
//! together and tracks who is logged in and what the last search returned.
//! Front ends (the CLI subcommands and the interactive menu) drive
//! everything through it, so authorization is checked in one place.
//!
//! The session moves through [`SessionState`]:
//! `Idle -> Fetching -> Ready`, and from `Ready` a detail lookup passes
//! through `DetailFetching` back to `Ready` with the table untouched.

pub mod config;

use std::collections::BTreeMap;
use std::sync::Arc;

use bizwatch_business_models::{BusinessRecord, NaturalKey, SearchHistoryEntry, SearchQuery, UserAccount};
use bizwatch_scraper::detail::{DetailParser, fetch_detail};
use bizwatch_scraper::fetch::HttpFetcher;
use bizwatch_scraper::listing::ListingParser;
use bizwatch_scraper::pagination::{CrawlReport, crawl};
use bizwatch_scraper::progress::ProgressCallback;
use bizwatch_scraper::{Fetcher, ScrapeConfig, ScrapeError};
use bizwatch_store::StoreError;
use bizwatch_store::history::HistoryStore;
use bizwatch_store::users::{BulkAddReport, UserStore};
use bizwatch_store::watchlist::{AddOutcome, EntryEdit, WatchlistStore};

pub use config::{AppConfig, ConfigError};

/// Errors that can occur during session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operation needs a logged-in user.
    #[error("Not logged in")]
    NotLoggedIn,

    /// Username or password did not match.
    #[error("Invalid username or password")]
    AuthFailure,

    /// The operation is reserved for the admin account.
    #[error("Only the admin may {action}")]
    Forbidden {
        /// What was attempted.
        action: String,
    },

    /// There is no result table to pick a row from.
    #[error("No search results; run a search first")]
    NoResults,

    /// A row number is outside the current result table.
    #[error("Row {row} is not in the result table ({len} row(s))")]
    RowOutOfRange {
        /// The requested 1-based row.
        row: usize,
        /// Number of rows in the table.
        len: usize,
    },

    /// Persistence error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Scraping error.
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Where the session is in its search/detail cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No result table.
    #[default]
    Idle,
    /// A search is crawling listing pages.
    Fetching,
    /// A result table is available.
    Ready(CrawlReport),
    /// A detail page is loading; the table is kept.
    DetailFetching(CrawlReport),
}

/// The session context object.
pub struct Session<F: Fetcher = HttpFetcher> {
    config: AppConfig,
    scrape: ScrapeConfig,
    fetcher: F,
    listing: ListingParser,
    detail: DetailParser,
    users: UserStore,
    watchlists: WatchlistStore,
    history: HistoryStore,
    user: Option<String>,
    state: SessionState,
}

impl Session<HttpFetcher> {
    /// Opens a session that fetches over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the HTTP client, the selectors or the
    /// admin account cannot be set up.
    pub fn open(config: AppConfig) -> Result<Self, SessionError> {
        let fetcher = HttpFetcher::new(&config.scrape_config())?;
        Self::with_fetcher(config, fetcher)
    }
}

impl<F: Fetcher> Session<F> {
    /// Opens a session using `fetcher` for all page loads.
    ///
    /// Creates the admin account with the configured initial password if
    /// it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if a configured selector is invalid or the
    /// account file cannot be read or written.
    pub fn with_fetcher(config: AppConfig, fetcher: F) -> Result<Self, SessionError> {
        let scrape = config.scrape_config();
        let listing = ListingParser::new(&scrape.base_url, &config.listing_selectors())?;
        let detail = DetailParser::new(&config.scrape.detail_table_selector)?;

        let paths = config.data_paths();
        let users = UserStore::new(&paths, &config.admin_username);
        if users.ensure_admin(&config.admin_initial_password)? {
            log::warn!(
                "Created admin account '{}' with the initial password; change it with `passwd`",
                config.admin_username
            );
        }

        Ok(Self {
            watchlists: WatchlistStore::new(&paths),
            history: HistoryStore::new(&paths, config.history_limit),
            config,
            scrape,
            fetcher,
            listing,
            detail,
            users,
            user: None,
            state: SessionState::Idle,
        })
    }

    /// The configuration the session was opened with.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    // -- Authentication ---------------------------------------------------

    /// Logs in as `username`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AuthFailure`] if the credentials do not
    /// match an account.
    pub fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        let username = username.trim();
        if !self.users.verify(username, password)? {
            log::warn!("Failed login for '{username}'");
            return Err(SessionError::AuthFailure);
        }
        log::info!("Logged in as '{username}'");
        self.user = Some(username.to_owned());
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Logs out and discards the result table.
    pub fn logout(&mut self) {
        if let Some(user) = self.user.take() {
            log::info!("Logged out '{user}'");
        }
        self.state = SessionState::Idle;
    }

    /// The logged-in username.
    #[must_use]
    pub fn current_user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Whether the logged-in user is the admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user
            .as_deref()
            .is_some_and(|u| self.users.is_admin(u))
    }

    /// Changes the logged-in user's own password.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AuthFailure`] if `current` is wrong.
    pub fn change_password(&self, current: &str, new: &str) -> Result<(), SessionError> {
        let user = self.require_user()?;
        if !self.users.verify(user, current)? {
            return Err(SessionError::AuthFailure);
        }
        self.users.reset_password(user, new)?;
        Ok(())
    }

    fn require_user(&self) -> Result<&str, SessionError> {
        self.user.as_deref().ok_or(SessionError::NotLoggedIn)
    }

    fn require_admin(&self, action: &str) -> Result<(), SessionError> {
        self.require_user()?;
        if self.is_admin() {
            Ok(())
        } else {
            Err(SessionError::Forbidden {
                action: action.to_owned(),
            })
        }
    }

    // -- Search -----------------------------------------------------------

    /// Runs a search and makes its records the current result table.
    ///
    /// Pages that fail to load are listed in the returned report and the
    /// history entry; they never fail the search.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoggedIn`] without a logged-in user.
    #[allow(clippy::future_not_send)]
    pub async fn search(
        &mut self,
        query: &SearchQuery,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<&CrawlReport, SessionError> {
        let username = self.require_user()?.to_owned();
        log::info!("Searching: {query}");

        self.state = SessionState::Fetching;
        let mut report = crawl(
            &self.fetcher,
            &self.scrape,
            &self.listing,
            query.pages,
            query.threads,
            progress,
        )
        .await;

        if let Some(province) = query.province() {
            let before = report.records.len();
            report.records.retain(|r| r.matches_province(province));
            log::info!(
                "Province filter \"{province}\" kept {} of {before} record(s)",
                report.records.len()
            );
        }

        let entry = SearchHistoryEntry {
            username,
            query: query.clone(),
            result_count: report.records.len(),
            failed_pages: report.failed_pages(),
            searched_at: chrono::Utc::now(),
        };
        if let Err(e) = self.history.record(entry) {
            log::warn!("Could not record search history: {e}");
        }

        self.state = SessionState::Ready(report);
        match &self.state {
            SessionState::Ready(report) => Ok(report),
            _ => Err(SessionError::NoResults),
        }
    }

    /// The current result table; empty before any search.
    #[must_use]
    pub fn results(&self) -> &[BusinessRecord] {
        match &self.state {
            SessionState::Ready(report) | SessionState::DetailFetching(report) => &report.records,
            SessionState::Idle | SessionState::Fetching => &[],
        }
    }

    /// Returns the record at 1-based `row` of the result table.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoResults`] before a search and
    /// [`SessionError::RowOutOfRange`] for a row outside the table.
    pub fn result_at(&self, row: usize) -> Result<&BusinessRecord, SessionError> {
        let SessionState::Ready(report) = &self.state else {
            return Err(SessionError::NoResults);
        };
        let len = report.records.len();
        row.checked_sub(1)
            .and_then(|i| report.records.get(i))
            .ok_or(SessionError::RowOutOfRange { row, len })
    }

    // -- Detail -----------------------------------------------------------

    /// Loads the detail attributes of result `row`.
    ///
    /// The result table is kept whether or not the page loads.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] for an invalid row or a failed fetch.
    #[allow(clippy::future_not_send)]
    pub async fn detail(&mut self, row: usize) -> Result<BTreeMap<String, String>, SessionError> {
        self.require_user()?;
        let link = self.result_at(row)?.detail_link.clone();

        let report = match std::mem::take(&mut self.state) {
            SessionState::Ready(report) => report,
            other => {
                self.state = other;
                return Err(SessionError::NoResults);
            }
        };
        self.state = SessionState::DetailFetching(report);

        let result = fetch_detail(&self.fetcher, &self.detail, &link).await;

        if let SessionState::DetailFetching(report) = std::mem::take(&mut self.state) {
            self.state = SessionState::Ready(report);
        }
        Ok(result?)
    }

    /// Loads the detail attributes of the page at `link`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the page cannot be fetched.
    #[allow(clippy::future_not_send)]
    pub async fn detail_for_link(
        &self,
        link: &str,
    ) -> Result<BTreeMap<String, String>, SessionError> {
        self.require_user()?;
        Ok(fetch_detail(&self.fetcher, &self.detail, link).await?)
    }

    // -- Watchlist --------------------------------------------------------

    /// Follows result `row`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] for an invalid row or a store failure.
    pub fn follow(&self, row: usize) -> Result<AddOutcome, SessionError> {
        let record = self.result_at(row)?;
        self.follow_record(record)
    }

    /// Follows `record`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if not logged in or the store fails.
    pub fn follow_record(&self, record: &BusinessRecord) -> Result<AddOutcome, SessionError> {
        let user = self.require_user()?;
        Ok(self.watchlists.add(user, record)?)
    }

    /// The logged-in user's watchlist in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if not logged in or the store fails.
    pub fn watchlist(&self) -> Result<Vec<BusinessRecord>, SessionError> {
        let user = self.require_user()?;
        Ok(self.watchlists.load(user)?)
    }

    /// Returns the watchlist entry at 1-based `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if not logged in or `index` is not a row of
    /// the current watchlist.
    pub fn entry_at(&self, index: usize) -> Result<BusinessRecord, SessionError> {
        let user = self.require_user()?;
        Ok(self.watchlists.entry_at(user, index)?)
    }

    /// Sets the note of the entry identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if not logged in or no entry matches.
    pub fn set_note(&self, key: &NaturalKey, note: &str) -> Result<(), SessionError> {
        let user = self.require_user()?;
        Ok(self.watchlists.set_note(user, key, note)?)
    }

    /// Applies `edit` to the entry identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if not logged in, no entry matches, or the
    /// edit collides with another entry.
    pub fn edit_entry(
        &self,
        key: &NaturalKey,
        edit: &EntryEdit,
    ) -> Result<BusinessRecord, SessionError> {
        let user = self.require_user()?;
        Ok(self.watchlists.update(user, key, edit)?)
    }

    /// Removes the entry identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if not logged in or no entry matches.
    pub fn remove_entry(&self, key: &NaturalKey) -> Result<BusinessRecord, SessionError> {
        let user = self.require_user()?;
        Ok(self.watchlists.remove(user, key)?)
    }

    /// Removes the entry at 1-based `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if not logged in or `index` is not a row of
    /// the current watchlist.
    pub fn remove_entry_at(&self, index: usize) -> Result<BusinessRecord, SessionError> {
        let user = self.require_user()?;
        Ok(self.watchlists.remove_at(user, index)?)
    }

    // -- History ----------------------------------------------------------

    /// Search history visible to the logged-in user: their own entries, or
    /// every entry for the admin.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if not logged in or the store fails.
    pub fn history(&self) -> Result<Vec<SearchHistoryEntry>, SessionError> {
        let user = self.require_user()?;
        if self.is_admin() {
            Ok(self.history.list()?)
        } else {
            Ok(self.history.for_user(user)?)
        }
    }

    // -- Administration ---------------------------------------------------

    /// Lists all accounts.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Forbidden`] unless logged in as admin.
    pub fn list_users(&self) -> Result<Vec<UserAccount>, SessionError> {
        self.require_admin("list users")?;
        Ok(self.users.list()?)
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Forbidden`] unless logged in as admin, or a
    /// store error for an invalid or existing username.
    pub fn add_user(&self, username: &str, password: &str) -> Result<(), SessionError> {
        self.require_admin("add users")?;
        Ok(self.users.add_user(username, password)?)
    }

    /// Creates accounts from `username,password` lines.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Forbidden`] unless logged in as admin.
    pub fn bulk_add_users(&self, input: &str) -> Result<BulkAddReport, SessionError> {
        self.require_admin("add users")?;
        Ok(self.users.bulk_add(input)?)
    }

    /// Sets another account's password.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Forbidden`] unless logged in as admin.
    pub fn reset_password(&self, username: &str, password: &str) -> Result<(), SessionError> {
        self.require_admin("reset passwords")?;
        Ok(self.users.reset_password(username, password)?)
    }

    /// Deletes an account and its watchlist. The admin account can never
    /// be deleted.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Forbidden`] unless logged in as admin, and
    /// [`StoreError::AdminProtected`] when targeting the admin.
    pub fn delete_user(&self, username: &str) -> Result<(), SessionError> {
        self.require_admin("delete users")?;
        self.users.delete_user(username)?;
        self.watchlists.delete_all(username.trim())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use bizwatch_business_models::PageSelection;
    use bizwatch_scraper::progress::null_progress;

    use super::*;

    /// Serves canned pages by URL; unknown URLs 404.
    struct ScriptedFetcher {
        pages: BTreeMap<String, String>,
    }

    impl ScriptedFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| ((*url).to_owned(), (*body).to_owned()))
                    .collect(),
            }
        }
    }

    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ScrapeError::Status {
                    url: url.to_owned(),
                    status: 404,
                })
        }
    }

    const LISTING: &str = r#"
        <div class="tax-listing">
          <div>
            <h3><a href="/0101234567-cong-ty-a">Cong ty A</a></h3>
            <address>Hanoi</address>
          </div>
          <div>
            <h3><a href="/0109876543-cong-ty-b">Cong ty B</a></h3>
            <address>HCM</address>
          </div>
          <div>
            <h3><a href="/0105555555-quang-cao">Quang cao</a></h3>
          </div>
        </div>
    "#;

    const DETAIL: &str = r#"
        <table class="table-taxinfo">
          <tr><td>Mã số thuế</td><td>0101234567</td></tr>
          <tr><td>Người đại diện</td><td>Nguyen Van A</td></tr>
        </table>
    "#;

    const PAGE_1: &str =
        "https://masothue.com/tra-cuu-ma-so-thue-doanh-nghiep-moi-thanh-lap?page=1";
    const DETAIL_A: &str = "https://masothue.com/0101234567-cong-ty-a";

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "bizwatch_session_{name}_{}",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn open(dir: &Path) -> Session<ScriptedFetcher> {
        let mut config = AppConfig::from_toml(None).unwrap();
        config.data_dir = dir.to_path_buf();
        let fetcher = ScriptedFetcher::new(&[(PAGE_1, LISTING), (DETAIL_A, DETAIL)]);
        Session::with_fetcher(config, fetcher).unwrap()
    }

    fn query(province: Option<&str>) -> SearchQuery {
        SearchQuery {
            province: province.map(str::to_owned),
            pages: PageSelection::Fixed(1),
            threads: 1,
        }
    }

    fn logged_in_user(dir: &Path) -> Session<ScriptedFetcher> {
        let mut session = open(dir);
        session.login("admin", "admin123").unwrap();
        session.add_user("lan", "secret").unwrap();
        session.logout();
        session.login("lan", "secret").unwrap();
        session
    }

    #[tokio::test]
    async fn search_then_follow_is_idempotent() {
        let dir = temp_dir("end_to_end");
        let mut session = logged_in_user(&dir);

        let report = session.search(&query(None), &null_progress()).await.unwrap();
        assert!(report.is_complete());
        let names: Vec<&str> = session.results().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Cong ty A", "Cong ty B"]);
        assert_eq!(session.results()[0].tax_code(), Some("0101234567"));

        assert_eq!(session.follow(1).unwrap(), AddOutcome::Added);
        assert_eq!(session.watchlist().unwrap().len(), 1);

        assert_eq!(session.follow(1).unwrap(), AddOutcome::AlreadyPresent);
        let watchlist = session.watchlist().unwrap();
        assert_eq!(watchlist.len(), 1);
        assert_eq!(watchlist[0].name, "Cong ty A");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn province_filter_and_history() {
        let dir = temp_dir("province");
        let mut session = logged_in_user(&dir);

        session.search(&query(Some("hcm")), &null_progress()).await.unwrap();
        assert_eq!(session.results().len(), 1);
        assert_eq!(session.results()[0].name, "Cong ty B");

        let history = session.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].username, "lan");
        assert_eq!(history[0].result_count, 1);

        session.logout();
        session.login("admin", "admin123").unwrap();
        let all = session.history().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].username, "lan");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn detail_keeps_result_table() {
        let dir = temp_dir("detail");
        let mut session = logged_in_user(&dir);
        assert!(matches!(session.detail(1).await, Err(SessionError::NoResults)));

        session.search(&query(None), &null_progress()).await.unwrap();
        let fields = session.detail(1).await.unwrap();
        assert_eq!(fields.get("Người đại diện").map(String::as_str), Some("Nguyen Van A"));
        assert!(matches!(session.state(), SessionState::Ready(_)));
        assert_eq!(session.results().len(), 2);

        // Company B's detail page is not scripted.
        assert!(matches!(
            session.detail(2).await,
            Err(SessionError::Scrape(ScrapeError::Status { status: 404, .. }))
        ));
        assert!(matches!(session.state(), SessionState::Ready(_)));
        assert_eq!(session.results().len(), 2);

        assert!(matches!(
            session.detail(3).await,
            Err(SessionError::RowOutOfRange { row: 3, len: 2 })
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn failed_listing_page_is_reported() {
        let dir = temp_dir("failed_page");
        let mut session = logged_in_user(&dir);
        let q = SearchQuery {
            province: None,
            pages: PageSelection::Fixed(2),
            threads: 2,
        };

        let report = session.search(&q, &null_progress()).await.unwrap();
        assert_eq!(report.failed_pages(), vec![2]);
        assert_eq!(session.results().len(), 2);
        assert_eq!(session.history().unwrap()[0].failed_pages, vec![2]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_bad_credentials() {
        let dir = temp_dir("auth");
        let mut session = open(&dir);

        assert!(matches!(
            session.login("admin", "wrong"),
            Err(SessionError::AuthFailure)
        ));
        assert!(matches!(
            session.login("nobody", "admin123"),
            Err(SessionError::AuthFailure)
        ));
        assert_eq!(session.current_user(), None);
        assert!(matches!(session.watchlist(), Err(SessionError::NotLoggedIn)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn admin_operations_require_admin() {
        let dir = temp_dir("forbidden");
        let session = logged_in_user(&dir);

        assert!(!session.is_admin());
        assert!(matches!(
            session.add_user("minh", "pw"),
            Err(SessionError::Forbidden { .. })
        ));
        assert!(matches!(session.list_users(), Err(SessionError::Forbidden { .. })));
        assert!(matches!(
            session.delete_user("admin"),
            Err(SessionError::Forbidden { .. })
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn admin_cannot_be_deleted() {
        let dir = temp_dir("admin_protected");
        let mut session = open(&dir);
        session.login("admin", "admin123").unwrap();

        assert!(matches!(
            session.delete_user("admin"),
            Err(SessionError::Store(StoreError::AdminProtected { .. }))
        ));
        assert_eq!(session.list_users().unwrap().len(), 1);

        session.add_user("lan", "secret").unwrap();
        session.delete_user("lan").unwrap();
        assert_eq!(session.list_users().unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn changes_own_password() {
        let dir = temp_dir("passwd");
        let mut session = logged_in_user(&dir);

        assert!(matches!(
            session.change_password("wrong", "new"),
            Err(SessionError::AuthFailure)
        ));
        session.change_password("secret", "new-secret").unwrap();

        session.logout();
        assert!(session.login("lan", "secret").is_err());
        session.login("lan", "new-secret").unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }
}
