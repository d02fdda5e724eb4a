//! Listing page parser.
//!
//! Each listing page holds a sequence of containers, one per business.
//! Within a container the parser looks for the name/link anchor, the
//! address and optionally the representative and tax code. The registry
//! has changed its markup over time, so the tax code is read from whichever
//! of the known layouts is present:
//!
//! 1. a dedicated tax-code element whose text may carry a label
//!    (`Mã số thuế: 0101234567`), or
//! 2. an attribute string such as the container's `data-prefetch` or the
//!    anchor's `href` (`/0101234567-cong-ty-a`), whose leading numeric
//!    token is the tax code.
//!
//! Containers that lack the anchor or the address are promotional or
//! layout nodes and are skipped without error. A container that encloses
//! other containers is skipped too, so a record is never read twice.

use bizwatch_business_models::BusinessRecord;
use scraper::{ElementRef, Html, Selector};

use crate::link::absolute_link;
use crate::{ScrapeError, element_text, parse_selector};

/// CSS selectors used to pick records out of a listing page.
///
/// The defaults match the registry's current and previous layouts. Use the
/// builder methods to adapt to a changed layout without touching code.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    /// One element per business.
    pub container: String,
    /// Anchor carrying the business name and detail href.
    pub anchor: String,
    /// Address element.
    pub address: String,
    /// Legal representative element.
    pub representative: String,
    /// Element holding the tax code, possibly behind a label.
    pub tax_code: String,
    /// Attribute on the container whose value embeds the tax code.
    pub tax_code_attribute: String,
    /// Links of the pagination control.
    pub pagination: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            container: ".tax-listing li, .tax-listing > div".to_owned(),
            anchor: "a.tax-name, h3 > a".to_owned(),
            address: "span.address, address".to_owned(),
            representative: "span.legal-represent, em".to_owned(),
            tax_code: ".tax-code".to_owned(),
            tax_code_attribute: "data-prefetch".to_owned(),
            pagination: "ul.pagination a, .page-numbers".to_owned(),
        }
    }
}

impl ListingSelectors {
    /// Overrides the container selector.
    #[must_use]
    pub fn with_container(mut self, selector: &str) -> Self {
        selector.clone_into(&mut self.container);
        self
    }

    /// Overrides the name/link anchor selector.
    #[must_use]
    pub fn with_anchor(mut self, selector: &str) -> Self {
        selector.clone_into(&mut self.anchor);
        self
    }

    /// Overrides the address selector.
    #[must_use]
    pub fn with_address(mut self, selector: &str) -> Self {
        selector.clone_into(&mut self.address);
        self
    }

    /// Overrides the representative selector.
    #[must_use]
    pub fn with_representative(mut self, selector: &str) -> Self {
        selector.clone_into(&mut self.representative);
        self
    }

    /// Overrides the tax-code element selector.
    #[must_use]
    pub fn with_tax_code(mut self, selector: &str) -> Self {
        selector.clone_into(&mut self.tax_code);
        self
    }

    /// Overrides the pagination link selector.
    #[must_use]
    pub fn with_pagination(mut self, selector: &str) -> Self {
        selector.clone_into(&mut self.pagination);
        self
    }
}

/// Listing parser with pre-compiled selectors.
#[derive(Debug, Clone)]
pub struct ListingParser {
    base_url: String,
    container: Selector,
    anchor: Selector,
    address: Selector,
    representative: Selector,
    tax_code: Selector,
    tax_code_attribute: String,
    pagination: Selector,
}

impl ListingParser {
    /// Compiles `selectors`; detail links are resolved against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] if any selector is invalid.
    pub fn new(base_url: &str, selectors: &ListingSelectors) -> Result<Self, ScrapeError> {
        Ok(Self {
            base_url: base_url.to_owned(),
            container: parse_selector(&selectors.container)?,
            anchor: parse_selector(&selectors.anchor)?,
            address: parse_selector(&selectors.address)?,
            representative: parse_selector(&selectors.representative)?,
            tax_code: parse_selector(&selectors.tax_code)?,
            tax_code_attribute: selectors.tax_code_attribute.clone(),
            pagination: parse_selector(&selectors.pagination)?,
        })
    }

    /// Compiles the default selectors.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] if a default selector is invalid.
    pub fn with_defaults(base_url: &str) -> Result<Self, ScrapeError> {
        Self::new(base_url, &ListingSelectors::default())
    }

    /// Extracts the well-formed records of one listing page in document
    /// order.
    #[must_use]
    pub fn parse(&self, markup: &str) -> Vec<BusinessRecord> {
        let document = Html::parse_document(markup);
        let mut records = Vec::new();
        let mut skipped = 0_usize;

        for container in document.select(&self.container) {
            if self.wraps_containers(&container) {
                continue;
            }
            match self.parse_container(&container) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            log::debug!("Skipped {skipped} listing container(s) without name, link or address");
        }

        records
    }

    /// A container enclosing other containers is a layout wrapper, such as
    /// a `.tax-listing > div` holding the `li` records.
    fn wraps_containers(&self, container: &ElementRef<'_>) -> bool {
        container
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .any(|el| self.container.matches(&el))
    }

    fn parse_container(&self, container: &ElementRef<'_>) -> Option<BusinessRecord> {
        let anchor = container.select(&self.anchor).next()?;
        let href = anchor.value().attr("href").map(str::trim).filter(|h| !h.is_empty())?;
        let name = element_text(&anchor);
        if name.is_empty() {
            return None;
        }

        let address = container
            .select(&self.address)
            .next()
            .map(|el| element_text(&el))
            .filter(|a| !a.is_empty())?;

        let mut record = BusinessRecord::new(&name, &address, &absolute_link(&self.base_url, href));

        record.representative = container
            .select(&self.representative)
            .next()
            .map(|el| element_text(&el))
            .filter(|r| !r.is_empty());

        record.tax_code = container
            .select(&self.tax_code)
            .next()
            .and_then(|el| tax_code_from_text(&element_text(&el)))
            .or_else(|| {
                container
                    .value()
                    .attr(&self.tax_code_attribute)
                    .and_then(tax_code_from_attribute)
            })
            .or_else(|| tax_code_from_attribute(href));

        Some(record)
    }

    /// Returns the highest page index shown in the pagination control, or
    /// 1 when there is no parseable control.
    #[must_use]
    pub fn max_page(&self, markup: &str) -> u32 {
        let document = Html::parse_document(markup);

        document
            .select(&self.pagination)
            .filter_map(|el| {
                element_text(&el).parse::<u32>().ok().or_else(|| {
                    el.value().attr("href").and_then(page_from_href)
                })
            })
            .max()
            .unwrap_or(1)
            .max(1)
    }
}

/// Strips a `label:` prefix from a tax-code element's text.
fn tax_code_from_text(text: &str) -> Option<String> {
    let value = text.rsplit(':').next().unwrap_or(text).trim();
    (!value.is_empty()).then(|| value.to_owned())
}

/// Reads the tax code embedded in an attribute string such as
/// `/0101234567-cong-ty-a/` or a full detail URL.
fn tax_code_from_attribute(raw: &str) -> Option<String> {
    let path = raw.trim().trim_matches('/');
    let segment = path.rsplit('/').next()?;
    let token = segment.split('-').next()?;
    (!token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())).then(|| token.to_owned())
}

/// Reads the `page=` query value from a pagination href.
fn page_from_href(href: &str) -> Option<u32> {
    let (_, query) = href.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "page")
        .and_then(|(_, value)| value.parse().ok())
}
