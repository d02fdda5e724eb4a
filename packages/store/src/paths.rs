#![allow(clippy::module_name_repetitions)]
//! File layout of the data directory.

use std::path::{Path, PathBuf};

/// Resolves the files of one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Uses `root` as the data directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the data directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of the account file.
    #[must_use]
    pub fn users_path(&self) -> PathBuf {
        self.root.join("users.json")
    }

    /// Returns the directory holding one watchlist file per user.
    #[must_use]
    pub fn watchlists_dir(&self) -> PathBuf {
        self.root.join("watchlists")
    }

    /// Returns the search history file.
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.root.join("history.json")
    }
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
