//! Directory-listing page scraping.

use std::sync::LazyLock;

use regex::Regex;

/// Column header of a name-sortable Apache-style index page.
pub const LISTING_MARKER: &str = r#"<th><a href="?C=N;O=D">Name</a></th>"#;

/// Links to subdirectories or `.tbz` archives, excluding sort links.
#[allow(clippy::expect_used)]
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="([^"?]+(?:/|\.tbz))""#).expect("link regex is valid") // Static pattern, safe to panic
});

/// Returns true when `body` looks like a directory listing.
#[must_use]
pub fn is_listing(body: &str) -> bool {
    body.contains(LISTING_MARKER)
}

/// Extracts relative listing links in page order.
///
/// Parent-directory entries and absolute links cannot be resolved by
/// appending to the page URL and are dropped.
#[must_use]
pub fn extract_links(body: &str) -> Vec<String> {
    LINK_PATTERN
        .captures_iter(body)
        .filter_map(|captures| captures.get(1))
        .map(|link| link.as_str())
        .filter(|link| !link.starts_with(['/', '.']) && !link.contains("://"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><table>
<tr><th><a href="?C=N;O=D">Name</a></th><th><a href="?C=M;O=A">Last modified</a></th></tr>
<tr><td><a href="/epf/">Parent Directory</a></td></tr>
<tr><td><a href="itunes20240101.tbz">itunes20240101.tbz</a></td></tr>
<tr><td><a href="itunes20240101.tbz.md5">itunes20240101.tbz.md5</a></td></tr>
<tr><td><a href="incremental/">incremental/</a></td></tr>
</table></body></html>"#;

    #[test]
    fn test_is_listing() {
        assert!(is_listing(PAGE));
        assert!(!is_listing("<html>login required</html>"));
    }

    #[test]
    fn test_extract_links_keeps_dirs_and_archives() {
        assert_eq!(
            extract_links(PAGE),
            vec!["itunes20240101.tbz", "incremental/"]
        );
    }

    #[test]
    fn test_extract_links_skips_relative_parent() {
        let page = r#"<a href="../">Parent</a><a href="full/">full/</a>"#;
        assert_eq!(extract_links(page), vec!["full/"]);
    }

    #[test]
    fn test_extract_links_skips_query_links() {
        assert!(extract_links(r#"<a href="?C=N;O=D/">x</a>"#).is_empty());
    }
}
