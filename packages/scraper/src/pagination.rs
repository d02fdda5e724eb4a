//! Pagination driver.
//!
//! Visits listing pages `1..=n`, runs the [`ListingParser`] on each and
//! aggregates the records in page order. The page count is either given
//! by the caller or discovered from the pagination control of page 1.
//!
//! Every page ends up as a [`PageReport`] in the [`CrawlReport`]. A page
//! that fails to load contributes no records and is logged as a warning;
//! the remaining pages are still crawled.

use std::sync::Arc;

use bizwatch_business_models::{BusinessRecord, PageSelection};
use futures::stream::{self, StreamExt as _};

use crate::listing::ListingParser;
use crate::progress::ProgressCallback;
use crate::{Fetcher, ScrapeConfig, ScrapeError};

/// Default number of concurrent page fetches.
pub const DEFAULT_THREADS: usize = 5;

/// What happened to one listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page loaded and yielded `records` rows.
    Fetched {
        /// Number of records parsed from the page.
        records: usize,
    },
    /// The page could not be loaded.
    Failed {
        /// Human-readable failure reason.
        reason: String,
    },
}

/// Outcome of a single listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    /// 1-based page index.
    pub page: u32,
    /// Whether the page loaded.
    pub outcome: PageOutcome,
}

/// Aggregate result of a crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Records of every page that loaded, in page order.
    pub records: Vec<BusinessRecord>,
    /// One report per visited page, in page order.
    pub pages: Vec<PageReport>,
}

impl CrawlReport {
    fn push(&mut self, page: u32, result: Result<Vec<BusinessRecord>, ScrapeError>) {
        let outcome = match result {
            Ok(records) => {
                let count = records.len();
                self.records.extend(records);
                PageOutcome::Fetched { records: count }
            }
            Err(e) => {
                log::warn!("Failed to load listing page {page}: {e}");
                PageOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        self.pages.push(PageReport { page, outcome });
    }

    /// Pages that failed to load.
    pub fn failures(&self) -> impl Iterator<Item = &PageReport> {
        self.pages
            .iter()
            .filter(|p| matches!(p.outcome, PageOutcome::Failed { .. }))
    }

    /// Indices of the pages that failed to load.
    #[must_use]
    pub fn failed_pages(&self) -> Vec<u32> {
        self.failures().map(|p| p.page).collect()
    }

    /// Whether every visited page loaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Crawls the listing pages described by `selection`.
///
/// With `threads <= 1` pages are fetched one after another; otherwise at
/// most `threads` requests are in flight at once. Either way the report
/// lists pages and records in page order. This never fails as a whole:
/// per-page errors are recorded in the report.
///
/// At most [`ScrapeConfig::max_pages`] pages are visited; a larger
/// requested or discovered count is cut down with a warning.
#[allow(clippy::future_not_send)]
pub async fn crawl<F: Fetcher>(
    fetcher: &F,
    config: &ScrapeConfig,
    parser: &ListingParser,
    selection: PageSelection,
    threads: usize,
    progress: &Arc<dyn ProgressCallback>,
) -> CrawlReport {
    let mut report = CrawlReport::default();

    let (first_page, wanted) = match selection {
        PageSelection::Fixed(0) => {
            progress.finish("No pages requested");
            return report;
        }
        PageSelection::Fixed(n) => (None, n),
        PageSelection::Discover => {
            progress.set_status("Discovering page count");
            match fetcher.fetch(&config.page_url(1)).await {
                Ok(body) => {
                    let max = parser.max_page(&body);
                    log::info!("Pagination shows {max} page(s)");
                    (Some(body), max)
                }
                Err(e) => {
                    report.push(1, Err(e));
                    progress.finish("Could not load the first listing page");
                    return report;
                }
            }
        }
    };

    let last_page = wanted.min(config.max_pages.max(1));
    if last_page < wanted {
        log::warn!(
            "Limiting crawl to {last_page} of {wanted} page(s); raise max_pages to fetch more"
        );
    }

    progress.set_total_pages(last_page);
    progress.set_status("Fetching listing pages");

    let mut results: Vec<(u32, Result<Vec<BusinessRecord>, ScrapeError>)> = Vec::new();

    let first_fetched = if let Some(body) = first_page {
        results.push((1, Ok(parser.parse(&body))));
        progress.page_done();
        2
    } else {
        1
    };

    let fetch_page = |page: u32| async move {
        let url = config.page_url(page);
        let result = fetcher.fetch(&url).await.map(|body| parser.parse(&body));
        progress.page_done();
        (page, result)
    };

    if threads <= 1 {
        for page in first_fetched..=last_page {
            results.push(fetch_page(page).await);
        }
    } else {
        log::debug!("Fetching pages {first_fetched}..={last_page} with {threads} workers");
        let fetched: Vec<_> = stream::iter((first_fetched..=last_page).map(fetch_page))
            .buffer_unordered(threads)
            .collect()
            .await;
        results.extend(fetched);
        results.sort_by_key(|(page, _)| *page);
    }

    for (page, result) in results {
        report.push(page, result);
    }

    let failed = report.failures().count();
    log::info!(
        "Crawl complete: {} record(s) from {} page(s), {failed} failed",
        report.records.len(),
        report.pages.len()
    );
    progress.finish(&format!(
        "{} record(s), {failed} failed page(s)",
        report.records.len()
    ));

    report
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;
    use crate::progress::null_progress;

    /// Serves canned pages; `None` simulates a timeout, unknown URLs 404.
    struct ScriptedFetcher {
        pages: BTreeMap<String, Option<String>>,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn new(config: &ScrapeConfig, pages: &[(u32, Option<String>)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(page, body)| (config.page_url(*page), body.clone()))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
            self.requested.lock().unwrap().push(url.to_owned());
            match self.pages.get(url) {
                Some(Some(body)) => Ok(body.clone()),
                Some(None) => Err(ScrapeError::Timeout {
                    url: url.to_owned(),
                }),
                None => Err(ScrapeError::Status {
                    url: url.to_owned(),
                    status: 404,
                }),
            }
        }
    }

    /// Records every progress update in call order.
    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl RecordingProgress {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressCallback for RecordingProgress {
        fn set_total_pages(&self, pages: u32) {
            self.events.lock().unwrap().push(format!("total {pages}"));
        }

        fn page_done(&self) {
            self.events.lock().unwrap().push("page".to_owned());
        }

        fn set_status(&self, status: &str) {
            self.events.lock().unwrap().push(format!("status {status}"));
        }

        fn finish(&self, summary: &str) {
            self.events.lock().unwrap().push(format!("finish {summary}"));
        }
    }

    fn listing(page: u32, count: u32, pagination: &str) -> String {
        let mut html = String::from("<ul class=\"tax-listing\">");
        for i in 0..count {
            html.push_str(&format!(
                "<li><a class=\"tax-name\" href=\"/0{page}0000000{i}-cong-ty\">Cong ty {page}-{i}</a>\
                 <span class=\"address\">Page {page}</span></li>"
            ));
        }
        html.push_str("</ul>");
        html.push_str(pagination);
        html
    }

    fn setup() -> (ScrapeConfig, ListingParser) {
        let config = ScrapeConfig::default();
        let parser = ListingParser::with_defaults(&config.base_url).unwrap();
        (config, parser)
    }

    fn names(report: &CrawlReport) -> Vec<&str> {
        report.records.iter().map(|r| r.name.as_str()).collect()
    }

    #[tokio::test]
    async fn isolates_failed_page() {
        let (config, parser) = setup();
        let fetcher = ScriptedFetcher::new(
            &config,
            &[
                (1, Some(listing(1, 2, ""))),
                (2, None),
                (3, Some(listing(3, 1, ""))),
            ],
        );

        let report = crawl(
            &fetcher,
            &config,
            &parser,
            PageSelection::Fixed(3),
            1,
            &null_progress(),
        )
        .await;

        assert_eq!(names(&report), vec!["Cong ty 1-0", "Cong ty 1-1", "Cong ty 3-0"]);
        assert_eq!(report.failed_pages(), vec![2]);
        assert!(!report.is_complete());
        assert_eq!(
            report.pages[0].outcome,
            PageOutcome::Fetched { records: 2 }
        );
        assert!(matches!(
            &report.pages[1].outcome,
            PageOutcome::Failed { reason } if reason.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn concurrent_crawl_keeps_page_order() {
        let (config, parser) = setup();
        let pages: Vec<(u32, Option<String>)> =
            (1..=8).map(|p| (p, Some(listing(p, 3, "")))).collect();
        let fetcher = ScriptedFetcher::new(&config, &pages);

        let sequential = crawl(
            &fetcher,
            &config,
            &parser,
            PageSelection::Fixed(8),
            1,
            &null_progress(),
        )
        .await;
        let concurrent = crawl(
            &fetcher,
            &config,
            &parser,
            PageSelection::Fixed(8),
            DEFAULT_THREADS,
            &null_progress(),
        )
        .await;

        assert_eq!(concurrent.records.len(), 24);
        assert_eq!(concurrent, sequential);
        assert!(concurrent.is_complete());
    }

    #[tokio::test]
    async fn concurrent_crawl_isolates_failures() {
        let (config, parser) = setup();
        let fetcher = ScriptedFetcher::new(
            &config,
            &[(1, Some(listing(1, 1, ""))), (3, Some(listing(3, 1, "")))],
        );

        let report = crawl(
            &fetcher,
            &config,
            &parser,
            PageSelection::Fixed(4),
            3,
            &null_progress(),
        )
        .await;

        assert_eq!(names(&report), vec!["Cong ty 1-0", "Cong ty 3-0"]);
        assert_eq!(report.failed_pages(), vec![2, 4]);
    }

    #[tokio::test]
    async fn discovers_page_count_and_reuses_first_page() {
        let (config, parser) = setup();
        let pagination = r#"<ul class="pagination"><li><a href="?page=2">2</a></li>
            <li><a href="?page=3">3</a></li></ul>"#;
        let fetcher = ScriptedFetcher::new(
            &config,
            &[
                (1, Some(listing(1, 1, pagination))),
                (2, Some(listing(2, 1, pagination))),
                (3, Some(listing(3, 1, pagination))),
            ],
        );

        let report = crawl(
            &fetcher,
            &config,
            &parser,
            PageSelection::Discover,
            2,
            &null_progress(),
        )
        .await;

        assert_eq!(names(&report), vec!["Cong ty 1-0", "Cong ty 2-0", "Cong ty 3-0"]);
        assert_eq!(fetcher.requested().len(), 3);
        assert_eq!(
            fetcher
                .requested()
                .iter()
                .filter(|u| **u == config.page_url(1))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn oversized_discovered_count_is_capped() {
        let config = ScrapeConfig::default().with_max_pages(3);
        let parser = ListingParser::with_defaults(&config.base_url).unwrap();
        let pagination =
            r#"<ul class="pagination"><li><a href="?page=4294967295">Cuối</a></li></ul>"#;
        let fetcher = ScriptedFetcher::new(
            &config,
            &[
                (1, Some(listing(1, 1, pagination))),
                (2, Some(listing(2, 1, pagination))),
            ],
        );

        let report = crawl(
            &fetcher,
            &config,
            &parser,
            PageSelection::Discover,
            2,
            &null_progress(),
        )
        .await;

        assert_eq!(report.pages.len(), 3);
        assert_eq!(fetcher.requested().len(), 3);
        assert_eq!(names(&report), vec!["Cong ty 1-0", "Cong ty 2-0"]);
        assert_eq!(report.failed_pages(), vec![3]);
    }

    #[tokio::test]
    async fn reports_discovered_page_progress() {
        let (config, parser) = setup();
        let pagination = r#"<ul class="pagination"><li><a href="?page=3">3</a></li></ul>"#;
        let fetcher = ScriptedFetcher::new(
            &config,
            &[
                (1, Some(listing(1, 2, pagination))),
                (2, None),
                (3, Some(listing(3, 1, pagination))),
            ],
        );
        let recorder = Arc::new(RecordingProgress::default());
        let progress: Arc<dyn ProgressCallback> = recorder.clone();

        crawl(
            &fetcher,
            &config,
            &parser,
            PageSelection::Discover,
            1,
            &progress,
        )
        .await;

        assert_eq!(
            recorder.events(),
            vec![
                "status Discovering page count",
                "total 3",
                "status Fetching listing pages",
                "page",
                "page",
                "page",
                "finish 3 record(s), 1 failed page(s)",
            ]
        );
    }

    #[tokio::test]
    async fn fixed_count_is_capped() {
        let config = ScrapeConfig::default().with_max_pages(2);
        let parser = ListingParser::with_defaults(&config.base_url).unwrap();
        let fetcher = ScriptedFetcher::new(&config, &[]);

        let report = crawl(
            &fetcher,
            &config,
            &parser,
            PageSelection::Fixed(u32::MAX),
            1,
            &null_progress(),
        )
        .await;

        assert_eq!(report.failed_pages(), vec![1, 2]);
    }

    #[tokio::test]
    async fn discovery_without_pagination_crawls_one_page() {
        let (config, parser) = setup();
        let fetcher = ScriptedFetcher::new(&config, &[(1, Some(listing(1, 2, "")))]);

        let report = crawl(
            &fetcher,
            &config,
            &parser,
            PageSelection::Discover,
            1,
            &null_progress(),
        )
        .await;

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.pages.len(), 1);
    }

    #[tokio::test]
    async fn discovery_reports_failed_first_page() {
        let (config, parser) = setup();
        let fetcher = ScriptedFetcher::new(&config, &[(1, None)]);

        let report = crawl(
            &fetcher,
            &config,
            &parser,
            PageSelection::Discover,
            5,
            &null_progress(),
        )
        .await;

        assert!(report.records.is_empty());
        assert_eq!(report.failed_pages(), vec![1]);
    }

    #[tokio::test]
    async fn zero_pages_is_an_empty_report() {
        let (config, parser) = setup();
        let fetcher = ScriptedFetcher::new(&config, &[]);

        let report = crawl(
            &fetcher,
            &config,
            &parser,
            PageSelection::Fixed(0),
            1,
            &null_progress(),
        )
        .await;

        assert_eq!(report, CrawlReport::default());
        assert!(fetcher.requested().is_empty());
    }
}
