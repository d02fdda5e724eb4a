#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Business records and the account/search types shared across bizwatch.
//!
//! A [`BusinessRecord`] is produced by the listing parser for every business
//! on a registry listing page. The same type is persisted in a user's
//! watchlist, where it additionally carries an editable note. Records are
//! identified by their [`NaturalKey`]: the tax code when one was scraped,
//! otherwise the absolute detail link.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A newly-registered business as shown on the registry listing.
///
/// Field names on the wire are the column headings the registry tool has
/// always exported, so existing watchlist files stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRecord {
    /// Registered business name.
    #[serde(rename = "Tên doanh nghiệp")]
    pub name: String,
    /// Tax code (mã số thuế). Not every listing layout exposes it.
    #[serde(
        rename = "Mã số thuế",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tax_code: Option<String>,
    /// Legal representative, when the listing shows one.
    #[serde(
        rename = "Người đại diện",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub representative: Option<String>,
    /// Registered address.
    #[serde(rename = "Địa chỉ")]
    pub address: String,
    /// Absolute URL of the business's detail page.
    #[serde(rename = "Link")]
    pub detail_link: String,
    /// Free-text note. Only populated on watchlist entries.
    #[serde(rename = "Ghi chú", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl BusinessRecord {
    /// Creates a record with the required fields and no optional ones.
    #[must_use]
    pub fn new(name: &str, address: &str, detail_link: &str) -> Self {
        Self {
            name: name.to_owned(),
            tax_code: None,
            representative: None,
            address: address.to_owned(),
            detail_link: detail_link.to_owned(),
            note: None,
        }
    }

    /// Sets the tax code.
    #[must_use]
    pub fn with_tax_code(mut self, tax_code: &str) -> Self {
        self.tax_code = Some(tax_code.to_owned());
        self
    }

    /// Sets the legal representative.
    #[must_use]
    pub fn with_representative(mut self, representative: &str) -> Self {
        self.representative = Some(representative.to_owned());
        self
    }

    /// Sets the note.
    #[must_use]
    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_owned());
        self
    }

    /// Returns the tax code if one is present and not blank.
    #[must_use]
    pub fn tax_code(&self) -> Option<&str> {
        non_blank(self.tax_code.as_deref())
    }

    /// Returns the legal representative if present and not blank.
    #[must_use]
    pub fn representative(&self) -> Option<&str> {
        non_blank(self.representative.as_deref())
    }

    /// Returns the note if present and not blank.
    #[must_use]
    pub fn note(&self) -> Option<&str> {
        non_blank(self.note.as_deref())
    }

    /// Returns the identity used for watchlist deduplication: the tax code
    /// when populated, otherwise the detail link.
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        self.tax_code().map_or_else(
            || NaturalKey::Link(self.detail_link.clone()),
            |code| NaturalKey::TaxCode(code.to_owned()),
        )
    }

    /// Whether `key` refers to this record.
    ///
    /// A link key matches on the detail link even when the record is keyed
    /// by tax code, so entries can always be addressed by their URL.
    #[must_use]
    pub fn is_identified_by(&self, key: &NaturalKey) -> bool {
        match key {
            NaturalKey::TaxCode(code) => self.tax_code() == Some(code.as_str()),
            NaturalKey::Link(link) => self.detail_link == *link,
        }
    }

    /// Case-insensitive substring match of `province` against the address.
    ///
    /// A blank filter matches every record.
    #[must_use]
    pub fn matches_province(&self, province: &str) -> bool {
        let needle = province.trim().to_lowercase();
        needle.is_empty() || self.address.to_lowercase().contains(&needle)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Identity of a [`BusinessRecord`] for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NaturalKey {
    /// Keyed by tax code.
    TaxCode(String),
    /// Keyed by absolute detail link.
    Link(String),
}

impl NaturalKey {
    /// Interprets user input as a key: anything that looks like an HTTP URL
    /// is a link, everything else a tax code.
    #[must_use]
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        if input.starts_with("http://") || input.starts_with("https://") {
            Self::Link(input.to_owned())
        } else {
            Self::TaxCode(input.to_owned())
        }
    }

    /// Returns the raw key value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TaxCode(value) | Self::Link(value) => value,
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Privilege level of an account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Manages accounts; cannot be deleted.
    Admin,
    /// Regular watchlist user.
    User,
}

/// A login account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Unique login name.
    pub username: String,
    /// Salted password digest.
    pub password_hash: String,
}

impl UserAccount {
    /// Returns the account's role given the configured admin name.
    #[must_use]
    pub fn role(&self, admin_username: &str) -> Role {
        if self.username == admin_username {
            Role::Admin
        } else {
            Role::User
        }
    }
}

/// Which listing pages a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSelection {
    /// Pages `1..=n`.
    Fixed(u32),
    /// Every page up to the highest index in the pagination control.
    Discover,
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(1) => f.write_str("1 page"),
            Self::Fixed(n) => write!(f, "{n} pages"),
            Self::Discover => f.write_str("all pages"),
        }
    }
}

/// Parameters of one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Address filter, matched as a case-insensitive substring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    /// Pages to crawl.
    pub pages: PageSelection,
    /// Maximum concurrent page fetches.
    pub threads: usize,
}

impl SearchQuery {
    /// Returns the province filter if present and not blank.
    #[must_use]
    pub fn province(&self) -> Option<&str> {
        non_blank(self.province.as_deref())
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pages)?;
        if let Some(province) = self.province() {
            write!(f, ", province \"{province}\"")?;
        }
        write!(f, ", {} thread(s)", self.threads)
    }
}

/// One completed search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    /// Who ran the search.
    pub username: String,
    /// What was searched for.
    pub query: SearchQuery,
    /// Number of rows in the resulting table.
    pub result_count: usize,
    /// Listing pages that failed to load.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_pages: Vec<u32>,
    /// When the search finished.
    pub searched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> BusinessRecord {
        BusinessRecord::new(
            "Cong ty A",
            "12 Tran Hung Dao, Hoan Kiem, Hà Nội",
            "https://masothue.com/0101234567-cong-ty-a",
        )
    }

    #[test]
    fn natural_key_prefers_tax_code() {
        let r = record().with_tax_code("0101234567");
        assert_eq!(r.natural_key(), NaturalKey::TaxCode("0101234567".into()));
    }

    #[test]
    fn natural_key_falls_back_to_link_for_blank_tax_code() {
        let r = record().with_tax_code("   ");
        assert_eq!(
            r.natural_key(),
            NaturalKey::Link("https://masothue.com/0101234567-cong-ty-a".into())
        );
        assert!(r.tax_code().is_none());
    }

    #[test]
    fn link_key_identifies_tax_coded_record() {
        let r = record().with_tax_code("0101234567");
        let key = NaturalKey::from_input("https://masothue.com/0101234567-cong-ty-a");
        assert!(r.is_identified_by(&key));
        assert!(r.is_identified_by(&NaturalKey::from_input(" 0101234567 ")));
        assert!(!r.is_identified_by(&NaturalKey::from_input("0109876543")));
    }

    #[test]
    fn province_filter_is_case_insensitive_substring() {
        let r = record();
        assert!(r.matches_province("hà nội"));
        assert!(r.matches_province("HOAN KIEM"));
        assert!(r.matches_province("  "));
        assert!(!r.matches_province("Đà Nẵng"));
    }

    #[test]
    fn serializes_with_registry_column_names() {
        let r = record().with_tax_code("0101234567").with_note("call back");
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"Tên doanh nghiệp\":\"Cong ty A\""));
        assert!(json.contains("\"Mã số thuế\":\"0101234567\""));
        assert!(json.contains("\"Ghi chú\":\"call back\""));
        assert!(!json.contains("Người đại diện"));

        let back: BusinessRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn role_follows_admin_name() {
        let account = UserAccount {
            username: "admin".into(),
            password_hash: String::new(),
        };
        assert_eq!(account.role("admin"), Role::Admin);
        assert_eq!(account.role("root"), Role::User);
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn describes_search_query() {
        let query = SearchQuery {
            province: Some("Hà Nội".into()),
            pages: PageSelection::Fixed(5),
            threads: 3,
        };
        assert_eq!(
            query.to_string(),
            "5 pages, province \"Hà Nội\", 3 thread(s)"
        );
    }
}
