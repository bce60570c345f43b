//! Seed file loading: one URL per line, `#` comments and blank lines ignored.

use crate::url::extract_domain;
use crate::CrawlError;
use std::collections::HashSet;
use url::Url;

/// A parsed seed: the normalized URL and the domain it was marked seeded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub url: String,
    pub domain: String,
}

/// Reads `path` and returns one `Seed` per valid, non-comment, non-blank line.
/// Lines that fail to parse as an absolute HTTP(S) URL are skipped with a
/// warning rather than aborting the whole load.
pub async fn load_seeds(path: &str) -> Result<Vec<Seed>, CrawlError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CrawlError::TransientIo {
            path: path.to_string(),
            source,
        })?;

    let mut seeds = Vec::new();
    let mut seen = HashSet::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Ok(parsed) = Url::parse(line) else {
            tracing::warn!("skipping unparseable seed line: {line}");
            continue;
        };
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            tracing::warn!("skipping non-HTTP(S) seed line: {line}");
            continue;
        }
        let Some(domain) = extract_domain(&parsed) else {
            tracing::warn!("skipping seed line with no domain: {line}");
            continue;
        };

        if seen.insert(parsed.to_string()) {
            seeds.push(Seed {
                url: parsed.to_string(),
                domain,
            });
        }
    }

    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_tmp(content: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), content).await.unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_seeds_skips_comments_and_blanks() {
        let file = write_tmp("# comment\n\nhttp://example.com/\nhttps://other.test/page\n").await;
        let seeds = load_seeds(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].domain, "example.com");
        assert_eq!(seeds[1].domain, "other.test");
    }

    #[tokio::test]
    async fn test_load_seeds_dedupes_identical_urls() {
        let file = write_tmp("http://example.com/\nhttp://example.com/\n").await;
        let seeds = load_seeds(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(seeds.len(), 1);
    }

    #[tokio::test]
    async fn test_load_seeds_skips_invalid_lines() {
        let file = write_tmp("not a url\nftp://example.com/\nhttp://good.test/\n").await;
        let seeds = load_seeds(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].domain, "good.test");
    }
}
