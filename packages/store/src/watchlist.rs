//! Per-user watchlists.
//!
//! Each user's followed businesses are stored as an ordered JSON list in
//! `watchlists/<username>.json`. Entries are unique by
//! [`NaturalKey`] and by detail link: adding a business that is already
//! followed leaves the file untouched and reports
//! [`AddOutcome::AlreadyPresent`], even if its tax code was only learned
//! after it was first saved.
//!
//! Edits and removals locate entries by key. The positional variants take a
//! 1-based row and check it against the list as it is on disk at the time
//! of the call.

use std::path::PathBuf;

use bizwatch_business_models::{BusinessRecord, NaturalKey};
use strum_macros::Display;

use crate::json::{read_or_default, write_pretty};
use crate::paths::DataPaths;
use crate::users::validate_username;
use crate::StoreError;

/// Result of following a business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AddOutcome {
    /// The business was appended to the watchlist.
    #[strum(to_string = "added to watchlist")]
    Added,
    /// An entry with the same key already exists; nothing was written.
    #[strum(to_string = "already in watchlist")]
    AlreadyPresent,
}

/// Field changes for an existing entry. `None` leaves a field as is; an
/// empty string clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryEdit {
    /// New business name.
    pub name: Option<String>,
    /// New tax code.
    pub tax_code: Option<String>,
    /// New address.
    pub address: Option<String>,
    /// New representative.
    pub representative: Option<String>,
    /// New note.
    pub note: Option<String>,
}

impl EntryEdit {
    fn apply(&self, entry: &mut BusinessRecord) {
        if let Some(name) = non_empty(self.name.as_deref()) {
            entry.name = name;
        }
        if let Some(address) = non_empty(self.address.as_deref()) {
            entry.address = address;
        }
        if let Some(tax_code) = &self.tax_code {
            entry.tax_code = non_empty(Some(tax_code));
        }
        if let Some(representative) = &self.representative {
            entry.representative = non_empty(Some(representative));
        }
        if let Some(note) = &self.note {
            entry.note = Some(note.trim().to_owned());
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

/// Reads and writes the per-user watchlist files.
#[derive(Debug, Clone)]
pub struct WatchlistStore {
    dir: PathBuf,
}

impl WatchlistStore {
    /// Creates a store for the watchlist directory under `paths`.
    #[must_use]
    pub fn new(paths: &DataPaths) -> Self {
        Self {
            dir: paths.watchlists_dir(),
        }
    }

    fn path(&self, username: &str) -> Result<PathBuf, StoreError> {
        let username = validate_username(username)?;
        Ok(self.dir.join(format!("{username}.json")))
    }

    /// Returns the user's entries in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read or decoded.
    pub fn load(&self, username: &str) -> Result<Vec<BusinessRecord>, StoreError> {
        read_or_default(&self.path(username)?)
    }

    fn save(&self, username: &str, entries: &[BusinessRecord]) -> Result<(), StoreError> {
        write_pretty(&self.path(username)?, entries)
    }

    /// Follows `record` unless an entry with the same natural key or the
    /// same detail link exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read or written.
    pub fn add(&self, username: &str, record: &BusinessRecord) -> Result<AddOutcome, StoreError> {
        let mut entries = self.load(username)?;
        let key = record.natural_key();
        let link = NaturalKey::Link(record.detail_link.clone());

        if entries
            .iter()
            .any(|e| e.is_identified_by(&key) || e.is_identified_by(&link))
        {
            log::info!("'{key}' is already in {username}'s watchlist");
            return Ok(AddOutcome::AlreadyPresent);
        }

        let mut entry = record.clone();
        entry.note.get_or_insert_with(String::new);
        entries.push(entry);
        self.save(username, &entries)?;

        log::info!("Added '{key}' to {username}'s watchlist");
        Ok(AddOutcome::Added)
    }

    fn position(entries: &[BusinessRecord], key: &NaturalKey) -> Result<usize, StoreError> {
        entries
            .iter()
            .position(|e| e.is_identified_by(key))
            .ok_or_else(|| StoreError::EntryNotFound {
                key: key.to_string(),
            })
    }

    /// Returns the entry identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntryNotFound`] if no entry matches.
    pub fn get(&self, username: &str, key: &NaturalKey) -> Result<BusinessRecord, StoreError> {
        let mut entries = self.load(username)?;
        let index = Self::position(&entries, key)?;
        Ok(entries.swap_remove(index))
    }

    /// Replaces the note of the entry identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntryNotFound`] if no entry matches.
    pub fn set_note(&self, username: &str, key: &NaturalKey, note: &str) -> Result<(), StoreError> {
        self.update(
            username,
            key,
            &EntryEdit {
                note: Some(note.to_owned()),
                ..EntryEdit::default()
            },
        )
        .map(|_| ())
    }

    /// Applies `edit` to the entry identified by `key` and returns the
    /// updated entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntryNotFound`] if no entry matches and
    /// [`StoreError::DuplicateKey`] if the edit would collide with another
    /// entry's key.
    pub fn update(
        &self,
        username: &str,
        key: &NaturalKey,
        edit: &EntryEdit,
    ) -> Result<BusinessRecord, StoreError> {
        let mut entries = self.load(username)?;
        let index = Self::position(&entries, key)?;

        let mut updated = entries[index].clone();
        edit.apply(&mut updated);

        let new_key = updated.natural_key();
        if entries
            .iter()
            .enumerate()
            .any(|(i, e)| i != index && e.natural_key() == new_key)
        {
            return Err(StoreError::DuplicateKey {
                key: new_key.to_string(),
            });
        }

        entries[index] = updated.clone();
        self.save(username, &entries)?;
        log::info!("Updated '{key}' in {username}'s watchlist");
        Ok(updated)
    }

    /// Removes the entry identified by `key` and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntryNotFound`] if no entry matches.
    pub fn remove(&self, username: &str, key: &NaturalKey) -> Result<BusinessRecord, StoreError> {
        let mut entries = self.load(username)?;
        let index = Self::position(&entries, key)?;
        let removed = entries.remove(index);
        self.save(username, &entries)?;
        log::info!("Removed '{key}' from {username}'s watchlist");
        Ok(removed)
    }

    /// Returns the entry at 1-based `index`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IndexOutOfRange`] if `index` is not a row of
    /// the current list.
    pub fn entry_at(&self, username: &str, index: usize) -> Result<BusinessRecord, StoreError> {
        let mut entries = self.load(username)?;
        let position = checked_position(index, entries.len())?;
        Ok(entries.swap_remove(position))
    }

    /// Removes the entry at 1-based `index` and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IndexOutOfRange`] if `index` is not a row of
    /// the current list.
    pub fn remove_at(&self, username: &str, index: usize) -> Result<BusinessRecord, StoreError> {
        let mut entries = self.load(username)?;
        let position = checked_position(index, entries.len())?;
        let removed = entries.remove(position);
        self.save(username, &entries)?;
        log::info!(
            "Removed row {index} ('{}') from {username}'s watchlist",
            removed.natural_key()
        );
        Ok(removed)
    }

    /// Deletes the user's watchlist file, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file exists but cannot be removed.
    pub fn delete_all(&self, username: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path(username)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Converts a 1-based row into a vector position.
fn checked_position(index: usize, len: usize) -> Result<usize, StoreError> {
    if (1..=len).contains(&index) {
        Ok(index - 1)
    } else {
        Err(StoreError::IndexOutOfRange { index, len })
    }
}
