//! Page-level progress of a listing crawl.
//!
//! [`crawl`](crate::pagination::crawl) announces how many listing pages it
//! will visit, ticks once per page as each one loads or fails, and ends with
//! a one-line summary. The CLI renders this as a bar; everything else passes
//! [`null_progress`].

use std::sync::Arc;

/// Observer of a crawl's page count and completed pages.
///
/// Page fetches may finish on different tasks, so observers are shared
/// behind an `Arc` and must be `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// The crawl will visit `pages` listing pages. Called once, after
    /// discovery when the count comes from the pagination control.
    fn set_total_pages(&self, pages: u32);

    /// One more page has loaded or failed.
    fn page_done(&self);

    /// Describes the current phase ("discovering", "fetching").
    fn set_status(&self, status: &str);

    /// The crawl is over; `summary` counts records and failed pages.
    fn finish(&self, summary: &str);
}

/// Drops every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total_pages(&self, _pages: u32) {}
    fn page_done(&self) {}
    fn set_status(&self, _status: &str) {}
    fn finish(&self, _summary: &str) {}
}

/// Shared [`NullProgress`] for callers without a display.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
