use crate::UrlError;
use url::Url;

/// Normalizes a URL string per the crawl-time canonicalization rules:
/// lowercase host, strip the scheme's default port, resolve `.`/`..` path
/// segments, strip the fragment, canonicalize percent-encoding, and escape
/// the frontier-file reserved delimiter if it ever appears literally.
///
/// `normalize(normalize(u)) == normalize(u)` for any `u` this function
/// accepts (round-trip property exercised in the tests below).
pub fn normalize_url(url_str: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    // `Url::parse` already lowercases the host and resolves `.`/`..` path
    // segments for special schemes (http/https) per the WHATWG URL
    // algorithm, so no manual host-casing or dot-segment code is needed
    // here; we only need to strip the scheme's default port.
    let is_default_port = matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    );
    if is_default_port {
        let _ = url.set_port(None);
    }

    url.set_fragment(None);

    let canonical_path = canonicalize_percent_encoding(url.path());
    url.set_path(&canonical_path);

    if let Some(query) = url.query() {
        let canonical_query = canonicalize_percent_encoding(query);
        url.set_query(Some(&canonical_query));
    }

    Ok(escape_reserved_delimiter(url.as_str()))
}

/// Decodes percent-encoded octets that represent RFC 3986 unreserved
/// characters (`ALPHA` / `DIGIT` / `-` `.` `_` `~`) back to their literal
/// form, and uppercases the hex digits of any octet left encoded. Leaves
/// everything else untouched.
fn canonicalize_percent_encoding(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                let byte = (hi << 4) | lo;
                if is_unreserved(byte) {
                    out.push(byte as char);
                } else {
                    out.push('%');
                    out.push(bytes[i + 1].to_ascii_uppercase() as char);
                    out.push(bytes[i + 2].to_ascii_uppercase() as char);
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

/// Escapes the frontier line-format reserved delimiter (`|`) and raw
/// newlines so a malformed input can never corrupt a frontier file line.
fn escape_reserved_delimiter(url_str: &str) -> String {
    if !url_str.contains(['|', '\n', '\r']) {
        return url_str.to_string();
    }
    url_str
        .replace('|', "%7C")
        .replace('\n', "%0A")
        .replace('\r', "%0D")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_host() {
        assert_eq!(
            normalize_url("https://EXAMPLE.com/Path").unwrap(),
            "https://example.com/Path"
        );
    }

    #[test]
    fn test_strips_default_https_port() {
        assert_eq!(
            normalize_url("https://example.com:443/").unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_strips_default_http_port() {
        assert_eq!(
            normalize_url("http://example.com:80/").unwrap(),
            "http://example.com/"
        );
    }

    #[test]
    fn test_keeps_non_default_port() {
        assert_eq!(
            normalize_url("http://example.com:8080/").unwrap(),
            "http://example.com:8080/"
        );
    }

    #[test]
    fn test_resolves_dot_segments() {
        assert_eq!(
            normalize_url("https://example.com/a/../b/./c").unwrap(),
            "https://example.com/b/c"
        );
    }

    #[test]
    fn test_strips_fragment() {
        assert_eq!(
            normalize_url("https://example.com/page#section").unwrap(),
            "https://example.com/page"
        );
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(normalize_url("ftp://example.com/file").is_err());
        assert!(normalize_url("mailto:a@example.com").is_err());
    }

    #[test]
    fn test_decodes_unreserved_percent_encoding() {
        // %41 is 'A', an unreserved character; should be decoded.
        assert_eq!(
            normalize_url("https://example.com/%41bc").unwrap(),
            "https://example.com/Abc"
        );
    }

    #[test]
    fn test_uppercases_reserved_percent_encoding() {
        assert_eq!(
            normalize_url("https://example.com/a%2fb").unwrap(),
            "https://example.com/a%2Fb"
        );
    }

    #[test]
    fn test_preserves_query_string() {
        assert_eq!(
            normalize_url("https://example.com/search?q=rust&sort=asc").unwrap(),
            "https://example.com/search?q=rust&sort=asc"
        );
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        let inputs = [
            "https://EXAMPLE.com:443/a/../b/?Q=1#frag",
            "http://example.com:80/%7euser/",
            "https://example.com/already/normal",
        ];
        for input in inputs {
            let once = normalize_url(input).unwrap();
            let twice = normalize_url(&once).unwrap();
            assert_eq!(once, twice, "round-trip failed for {input}");
        }
    }

    #[test]
    fn test_invalid_url_is_error() {
        assert!(normalize_url("not a url").is_err());
    }
}
