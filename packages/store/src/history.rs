//! Search history.
//!
//! A single most-recent-first list shared by all users, truncated to a
//! fixed number of entries on every write.

use std::path::PathBuf;

use bizwatch_business_models::SearchHistoryEntry;

use crate::json::{read_or_default, write_pretty};
use crate::paths::DataPaths;
use crate::StoreError;

/// Default number of entries kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Reads and writes `history.json`.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    limit: usize,
}

impl HistoryStore {
    /// Creates a store that keeps at most `limit` entries.
    #[must_use]
    pub fn new(paths: &DataPaths, limit: usize) -> Self {
        Self {
            path: paths.history_path(),
            limit,
        }
    }

    /// Returns all entries, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read or decoded.
    pub fn list(&self) -> Result<Vec<SearchHistoryEntry>, StoreError> {
        read_or_default(&self.path)
    }

    /// Returns `username`'s entries, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read or decoded.
    pub fn for_user(&self, username: &str) -> Result<Vec<SearchHistoryEntry>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|e| e.username == username)
            .collect())
    }

    /// Prepends `entry` and drops the oldest entries beyond the limit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read or written.
    pub fn record(&self, entry: SearchHistoryEntry) -> Result<(), StoreError> {
        let mut entries = self.list()?;
        entries.insert(0, entry);
        entries.truncate(self.limit);
        write_pretty(&self.path, &entries)
    }
}
