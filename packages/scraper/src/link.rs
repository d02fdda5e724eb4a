//! URL construction for listing pages and detail links.

/// Joins a page-relative `href` onto `base_url` exactly once.
///
/// Absolute hrefs are returned unchanged and protocol-relative ones take
/// the scheme of `base_url`. Otherwise exactly one `/` separates the base
/// from the path, however either side was written.
#[must_use]
pub fn absolute_link(base_url: &str, href: &str) -> String {
    let href = href.trim();

    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }

    if let Some(rest) = href.strip_prefix("//") {
        let scheme = base_url.split_once("://").map_or("https", |(scheme, _)| scheme);
        return format!("{scheme}://{rest}");
    }

    let base = base_url.trim().trim_end_matches('/');
    let path = href.trim_start_matches('/');
    format!("{base}/{path}")
}

/// Returns the URL of listing page `page` under `base_url` + `listing_path`.
#[must_use]
pub fn page_url(base_url: &str, listing_path: &str, page: u32) -> String {
    let url = absolute_link(base_url, listing_path);
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}page={page}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://masothue.com";

    #[test]
    fn joins_relative_href_once() {
        for (base, href) in [
            (BASE, "/0101234567-cong-ty-a"),
            (BASE, "0101234567-cong-ty-a"),
            ("https://masothue.com/", "/0101234567-cong-ty-a"),
            ("https://masothue.com/", "0101234567-cong-ty-a"),
            ("https://masothue.com//", "/0101234567-cong-ty-a"),
        ] {
            assert_eq!(
                absolute_link(base, href),
                "https://masothue.com/0101234567-cong-ty-a",
                "{base} + {href}"
            );
        }
    }

    #[test]
    fn keeps_absolute_href() {
        let href = "https://masothue.com/0109876543-cong-ty-b";
        assert_eq!(absolute_link(BASE, href), href);
        assert_eq!(absolute_link(BASE, &absolute_link(BASE, "/x")), "https://masothue.com/x");
    }

    #[test]
    fn resolves_protocol_relative_href() {
        assert_eq!(
            absolute_link("http://localhost:8080", "//cdn.example.com/a"),
            "http://cdn.example.com/a"
        );
    }

    #[test]
    fn builds_page_urls() {
        assert_eq!(
            page_url(BASE, "/tra-cuu", 3),
            "https://masothue.com/tra-cuu?page=3"
        );
        assert_eq!(
            page_url(BASE, "/search?type=new", 2),
            "https://masothue.com/search?type=new&page=2"
        );
    }
}
