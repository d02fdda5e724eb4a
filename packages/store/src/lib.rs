#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! JSON document stores for bizwatch.
//!
//! Three collections live under the data directory:
//!
//! - `users.json`: username to password hash ([`users::UserStore`])
//! - `watchlists/<username>.json`: one ordered list of followed businesses
//!   per user ([`watchlist::WatchlistStore`])
//! - `history.json`: capped, most-recent-first search history
//!   ([`history::HistoryStore`])
//!
//! Every operation reads the whole file, modifies it in memory and writes
//! it back. There is no locking; a file is assumed to have one interactive
//! writer at a time.

pub mod history;
pub mod json;
pub mod password;
pub mod paths;
pub mod users;
pub mod watchlist;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The username is empty or contains characters that cannot name a file.
    #[error("Invalid username '{username}'")]
    InvalidUsername {
        /// The rejected username.
        username: String,
    },

    /// Passwords may not be empty.
    #[error("Password must not be empty")]
    EmptyPassword,

    /// An account with this name already exists.
    #[error("User '{username}' already exists")]
    UserExists {
        /// The conflicting username.
        username: String,
    },

    /// No account with this name exists.
    #[error("User '{username}' not found")]
    UserNotFound {
        /// The missing username.
        username: String,
    },

    /// The admin account cannot be deleted.
    #[error("The admin account '{username}' cannot be deleted")]
    AdminProtected {
        /// The admin username.
        username: String,
    },

    /// No watchlist entry has this key.
    #[error("No watchlist entry for '{key}'")]
    EntryNotFound {
        /// The key that was looked up.
        key: String,
    },

    /// An edit would give an entry the key of another entry.
    #[error("Another watchlist entry already uses '{key}'")]
    DuplicateKey {
        /// The colliding key.
        key: String,
    },

    /// A 1-based position is outside the current collection.
    #[error("Selection out of range: row {index} of {len}")]
    IndexOutOfRange {
        /// The requested 1-based position.
        index: usize,
        /// The collection length at the time of the request.
        len: usize,
    },
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;

    /// Creates an empty, uniquely named directory under the system temp dir.
    pub fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "bizwatch_store_{name}_{}",
            uuid::Uuid::new_v4().simple()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
