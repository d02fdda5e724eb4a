//! Detail page parser.
//!
//! A business's detail page renders its registry attributes as a two-column
//! table (label, value). Rows with any other shape, such as the full-width
//! heading row, are ignored.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};

use crate::{Fetcher, ScrapeError, element_text, parse_selector};

/// Parser for business detail pages.
#[derive(Debug, Clone)]
pub struct DetailParser {
    /// Preferred table selector.
    table: Selector,
    /// Used when the preferred table is missing.
    fallback_table: Selector,
    row: Selector,
}

impl DetailParser {
    /// Creates a parser that looks for `table_selector` first and any
    /// `<table>` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] if `table_selector` is invalid.
    pub fn new(table_selector: &str) -> Result<Self, ScrapeError> {
        Ok(Self {
            table: parse_selector(table_selector)?,
            fallback_table: parse_selector("table")?,
            row: parse_selector("tr")?,
        })
    }

    /// Creates a parser for the registry's `table.table-taxinfo` layout.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] if the default selector is invalid.
    pub fn with_defaults() -> Result<Self, ScrapeError> {
        Self::new("table.table-taxinfo")
    }

    /// Maps each two-cell row's label to its value.
    ///
    /// Returns an empty map when the page has no table. If a label repeats,
    /// the first row wins.
    #[must_use]
    pub fn parse(&self, markup: &str) -> BTreeMap<String, String> {
        let document = Html::parse_document(markup);
        let mut fields = BTreeMap::new();

        let Some(table) = document
            .select(&self.table)
            .next()
            .or_else(|| document.select(&self.fallback_table).next())
        else {
            log::debug!("No attribute table found on detail page");
            return fields;
        };

        for row in table.select(&self.row) {
            let cells: Vec<ElementRef<'_>> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .collect();

            if let [label, value] = cells.as_slice() {
                let label = element_text(label);
                if label.is_empty() {
                    continue;
                }
                fields.entry(label).or_insert_with(|| element_text(value));
            }
        }

        fields
    }
}

/// Fetches the detail page at `link` and parses its attribute table.
///
/// # Errors
///
/// Returns [`ScrapeError`] if the page cannot be fetched.
pub async fn fetch_detail<F: Fetcher + ?Sized>(
    fetcher: &F,
    parser: &DetailParser,
    link: &str,
) -> Result<BTreeMap<String, String>, ScrapeError> {
    let body = fetcher.fetch(link).await?;
    let fields = parser.parse(&body);
    log::info!("Read {} attribute(s) from {link}", fields.len());
    Ok(fields)
}
