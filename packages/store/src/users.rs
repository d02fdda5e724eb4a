//! Account store.
//!
//! `users.json` is a single JSON object mapping usernames to password
//! hashes. The admin account named at construction is created on first use
//! and can never be removed.

use std::collections::BTreeMap;
use std::path::PathBuf;

use bizwatch_business_models::UserAccount;

use crate::json::{read_or_default, write_pretty};
use crate::password::{hash_password, verify_password};
use crate::paths::DataPaths;
use crate::StoreError;

type Accounts = BTreeMap<String, String>;

/// Outcome of a bulk account import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkAddReport {
    /// Usernames that were created.
    pub added: Vec<String>,
    /// Usernames (or the whole line, if it has no comma) that were not
    /// imported, with the reason.
    pub skipped: Vec<(String, String)>,
}

/// Reads and writes `users.json`.
#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
    admin_username: String,
}

impl UserStore {
    /// Creates a store for the account file under `paths`.
    #[must_use]
    pub fn new(paths: &DataPaths, admin_username: &str) -> Self {
        Self {
            path: paths.users_path(),
            admin_username: admin_username.to_owned(),
        }
    }

    /// Name of the protected admin account.
    #[must_use]
    pub fn admin_username(&self) -> &str {
        &self.admin_username
    }

    /// Whether `username` is the admin account.
    #[must_use]
    pub fn is_admin(&self, username: &str) -> bool {
        username == self.admin_username
    }

    fn load(&self) -> Result<Accounts, StoreError> {
        read_or_default(&self.path)
    }

    fn save(&self, accounts: &Accounts) -> Result<(), StoreError> {
        write_pretty(&self.path, accounts)
    }

    /// Creates the admin account with `initial_password` if it is missing.
    /// Returns whether the account was created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read or written.
    pub fn ensure_admin(&self, initial_password: &str) -> Result<bool, StoreError> {
        let mut accounts = self.load()?;
        if accounts.contains_key(&self.admin_username) {
            return Ok(false);
        }
        if initial_password.is_empty() {
            return Err(StoreError::EmptyPassword);
        }
        accounts.insert(self.admin_username.clone(), hash_password(initial_password));
        self.save(&accounts)?;
        log::info!("Created admin account '{}'", self.admin_username);
        Ok(true)
    }

    /// Checks a username/password pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read.
    pub fn verify(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let accounts = self.load()?;
        Ok(accounts
            .get(username.trim())
            .is_some_and(|hash| verify_password(password, hash)))
    }

    /// Lists all accounts in username order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read.
    pub fn list(&self) -> Result<Vec<UserAccount>, StoreError> {
        Ok(self
            .load()?
            .into_iter()
            .map(|(username, password_hash)| UserAccount {
                username,
                password_hash,
            })
            .collect())
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UserExists`] if the name is taken, or a
    /// validation error for a bad username or empty password.
    pub fn add_user(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let username = validate_username(username)?;
        if password.is_empty() {
            return Err(StoreError::EmptyPassword);
        }

        let mut accounts = self.load()?;
        if accounts.contains_key(&username) {
            return Err(StoreError::UserExists { username });
        }
        accounts.insert(username.clone(), hash_password(password));
        self.save(&accounts)?;
        log::info!("Added user '{username}'");
        Ok(())
    }

    /// Imports accounts from `username,password` lines.
    ///
    /// Blank lines and lines starting with `#` are ignored. Malformed lines
    /// and existing usernames are reported in [`BulkAddReport::skipped`]
    /// without aborting the import. The file is written once at the end.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read or written.
    pub fn bulk_add(&self, input: &str) -> Result<BulkAddReport, StoreError> {
        let mut accounts = self.load()?;
        let mut report = BulkAddReport::default();

        for line in input.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((username, password)) = line.split_once(',') else {
                report
                    .skipped
                    .push((line.to_owned(), "expected 'username,password'".to_owned()));
                continue;
            };

            let username = match validate_username(username) {
                Ok(username) => username,
                Err(e) => {
                    report.skipped.push((username.trim().to_owned(), e.to_string()));
                    continue;
                }
            };
            let password = password.trim();
            if password.is_empty() {
                report
                    .skipped
                    .push((username, StoreError::EmptyPassword.to_string()));
                continue;
            }
            if accounts.contains_key(&username) {
                report.skipped.push((username, "already exists".to_owned()));
                continue;
            }

            accounts.insert(username.clone(), hash_password(password));
            report.added.push(username);
        }

        if !report.added.is_empty() {
            self.save(&accounts)?;
        }
        log::info!(
            "Bulk import: {} added, {} skipped",
            report.added.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Replaces the password of an existing account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UserNotFound`] if the account does not exist.
    pub fn reset_password(&self, username: &str, new_password: &str) -> Result<(), StoreError> {
        if new_password.is_empty() {
            return Err(StoreError::EmptyPassword);
        }
        let username = username.trim();
        let mut accounts = self.load()?;
        let Some(hash) = accounts.get_mut(username) else {
            return Err(StoreError::UserNotFound {
                username: username.to_owned(),
            });
        };
        *hash = hash_password(new_password);
        self.save(&accounts)?;
        log::info!("Reset password of '{username}'");
        Ok(())
    }

    /// Deletes an account. The admin account is always rejected.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AdminProtected`] for the admin account and
    /// [`StoreError::UserNotFound`] for an unknown one.
    pub fn delete_user(&self, username: &str) -> Result<(), StoreError> {
        let username = username.trim();
        if self.is_admin(username) {
            return Err(StoreError::AdminProtected {
                username: username.to_owned(),
            });
        }

        let mut accounts = self.load()?;
        if accounts.remove(username).is_none() {
            return Err(StoreError::UserNotFound {
                username: username.to_owned(),
            });
        }
        self.save(&accounts)?;
        log::info!("Deleted user '{username}'");
        Ok(())
    }
}

/// Trims `username` and checks that it can safely name a watchlist file.
///
/// # Errors
///
/// Returns [`StoreError::InvalidUsername`] if the name is empty or contains
/// whitespace, path separators or `..`.
pub fn validate_username(username: &str) -> Result<String, StoreError> {
    let trimmed = username.trim();
    let valid = !trimmed.is_empty()
        && !trimmed.contains("..")
        && !trimmed
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == '\\' || c.is_control());

    if valid {
        Ok(trimmed.to_owned())
    } else {
        Err(StoreError::InvalidUsername {
            username: username.to_owned(),
        })
    }
}
