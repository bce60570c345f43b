//! URL handling: normalization, domain extraction, wildcard matching, and
//! the non-text-extension enqueue filter.

mod domain;
mod matcher;
mod normalize;

pub use domain::extract_domain;
pub use matcher::matches_wildcard;
pub use normalize::normalize_url;

/// Returns true if the URL's path suggests a non-text resource (image,
/// video, archive, font, stylesheet, etc.) that should be skipped at
/// enqueue time rather than added to the frontier.
///
/// Comparison is case-insensitive and matches on path suffix, so query
/// strings and fragments never affect the decision.
pub fn is_non_text_resource(url: &::url::Url, blocklist: &[String]) -> bool {
    let path = url.path().to_lowercase();
    blocklist
        .iter()
        .any(|ext| path.ends_with(&ext.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::url::Url;

    fn blocklist() -> Vec<String> {
        vec![".jpg".to_string(), ".png".to_string(), ".pdf".to_string()]
    }

    #[test]
    fn test_flags_known_extension() {
        let url = Url::parse("https://example.com/images/cat.jpg").unwrap();
        assert!(is_non_text_resource(&url, &blocklist()));
    }

    #[test]
    fn test_ignores_query_string() {
        let url = Url::parse("https://example.com/page.html?file=cat.jpg").unwrap();
        assert!(!is_non_text_resource(&url, &blocklist()));
    }

    #[test]
    fn test_case_insensitive() {
        let url = Url::parse("https://example.com/IMAGE.JPG").unwrap();
        assert!(is_non_text_resource(&url, &blocklist()));
    }

    #[test]
    fn test_allows_text_resource() {
        let url = Url::parse("https://example.com/articles/42").unwrap();
        assert!(!is_non_text_resource(&url, &blocklist()));
    }
}
