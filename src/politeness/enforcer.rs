use super::robots_cache::get_or_fetch;
use crate::store::CoordinationStore;
use crate::{extract_domain, matches_wildcard, CrawlError};
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;

/// The outcome of checking a URL against every politeness rule. Distinct
/// from a plain bool so the fetcher pool can record the matching sentinel
/// visited-status code instead of a generic rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlVerdict {
    Allowed,
    RobotsDisallowed,
    ManuallyExcluded,
    SeededOnlyRejected,
}

impl UrlVerdict {
    /// Sentinel `visited` status code recorded for a rejected URL, per the
    /// error-handling design's "policy decision" category: 0 for a robots
    /// disallow, 1 for a manual exclusion, 2 for a seeded-only rejection.
    pub fn sentinel_status_code(self) -> Option<u16> {
        match self {
            UrlVerdict::Allowed => None,
            UrlVerdict::RobotsDisallowed => Some(0),
            UrlVerdict::ManuallyExcluded => Some(1),
            UrlVerdict::SeededOnlyRejected => Some(2),
        }
    }
}

/// Honors robots.txt and manual exclusions, enforces per-domain crawl
/// delay, and records fetch attempts against the coordination store.
pub struct PolitenessEnforcer {
    store: Arc<dyn CoordinationStore>,
    http_client: Client,
    user_agent_token: String,
    min_crawl_delay_seconds: u64,
    seeded_urls_only: bool,
    exclusion_patterns: Vec<String>,
}

impl PolitenessEnforcer {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        http_client: Client,
        user_agent_token: String,
        min_crawl_delay_seconds: u64,
        seeded_urls_only: bool,
        exclusion_patterns: Vec<String>,
    ) -> Self {
        Self {
            store,
            http_client,
            user_agent_token,
            min_crawl_delay_seconds,
            seeded_urls_only,
            exclusion_patterns,
        }
    }

    fn is_manually_excluded(&self, domain: &str) -> bool {
        self.exclusion_patterns
            .iter()
            .any(|pattern| matches_wildcard(pattern, domain))
    }

    /// Returns `false` if the domain is manually excluded, if seeded-only
    /// mode is on and the domain was never seeded, or if robots.txt
    /// disallows the URL for the configured user agent.
    pub async fn is_url_allowed(&self, url: &url::Url) -> Result<bool, CrawlError> {
        Ok(matches!(self.classify_url(url).await?, UrlVerdict::Allowed))
    }

    /// Same check as `is_url_allowed`, but names which rule rejected the
    /// URL so the caller can record the matching sentinel visited status.
    pub async fn classify_url(&self, url: &url::Url) -> Result<UrlVerdict, CrawlError> {
        let Some(domain) = extract_domain(url) else {
            return Ok(UrlVerdict::RobotsDisallowed);
        };

        if self.is_manually_excluded(&domain) {
            let _ = self.store.set_domain_excluded(&domain, true).await;
            return Ok(UrlVerdict::ManuallyExcluded);
        }

        if self.seeded_urls_only {
            let is_seeded = self
                .store
                .get_domain_metadata(&domain)
                .await?
                .map(|m| m.is_seeded)
                .unwrap_or(false);
            if !is_seeded {
                return Ok(UrlVerdict::SeededOnlyRejected);
            }
        }

        let robots = get_or_fetch(&self.store, &self.http_client, &domain).await;
        let path_and_query = if let Some(query) = url.query() {
            format!("{}?{}", url.path(), query)
        } else {
            url.path().to_string()
        };
        if robots.is_allowed(&path_and_query, &self.user_agent_token) {
            Ok(UrlVerdict::Allowed)
        } else {
            Ok(UrlVerdict::RobotsDisallowed)
        }
    }

    /// `max(robots crawl-delay for this agent or wildcard, configured minimum)`.
    pub async fn crawl_delay(&self, domain: &str) -> f64 {
        let robots = get_or_fetch(&self.store, &self.http_client, domain).await;
        let robots_delay = robots.crawl_delay(&self.user_agent_token).unwrap_or(0.0);
        robots_delay.max(self.min_crawl_delay_seconds as f64)
    }

    /// Sets `next_fetch_time` to `now + crawl_delay(domain)`.
    pub async fn record_fetch_attempt(&self, domain: &str) -> Result<(), CrawlError> {
        let delay = self.crawl_delay(domain).await;
        let next_fetch_time = Utc::now().timestamp() + delay.ceil() as i64;
        self.store
            .set_domain_next_fetch_time(domain, next_fetch_time)
            .await?;
        Ok(())
    }

    pub async fn can_fetch_domain_now(&self, domain: &str) -> Result<bool, CrawlError> {
        let now = Utc::now().timestamp();
        let next_fetch_time = self
            .store
            .get_domain_metadata(domain)
            .await?
            .map(|m| m.next_fetch_time)
            .unwrap_or(0);
        Ok(next_fetch_time <= now)
    }

    pub async fn mark_domain_seeded(&self, domain: &str) -> Result<(), CrawlError> {
        self.store.set_domain_seeded(domain, true).await?;
        Ok(())
    }
}

/// Loads manual exclusion patterns from a file: one domain wildcard pattern
/// per line, `#`-prefixed comments and blank lines ignored.
pub async fn load_exclusion_patterns(path: &str) -> Result<Vec<String>, CrawlError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CrawlError::TransientIo {
            path: path.to_string(),
            source,
        })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn enforcer(patterns: Vec<String>, seeded_only: bool) -> PolitenessEnforcer {
        let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
        PolitenessEnforcer::new(
            store,
            Client::new(),
            "TestBot".to_string(),
            70,
            seeded_only,
            patterns,
        )
    }

    #[tokio::test]
    async fn test_manual_exclusion_blocks_url() {
        let enforcer = enforcer(vec!["*.excluded.com".to_string()], false);
        let url = url::Url::parse("https://sub.excluded.com/page").unwrap();
        assert!(!enforcer.is_url_allowed(&url).await.unwrap());
    }

    #[tokio::test]
    async fn test_seeded_only_blocks_unseeded_domain() {
        let enforcer = enforcer(vec![], true);
        let url = url::Url::parse("https://example.com/page").unwrap();
        assert!(!enforcer.is_url_allowed(&url).await.unwrap());
    }

    #[tokio::test]
    async fn test_seeded_only_allows_seeded_domain() {
        let enforcer = enforcer(vec![], true);
        enforcer.mark_domain_seeded("example.com").await.unwrap();
        let url = url::Url::parse("https://example.invalid/page").unwrap();
        // Domain isn't actually reachable, but robots.txt fetch failure
        // falls back to allow-all, so the seeded check is what's exercised.
        let seeded_url = url::Url::parse("https://example.com/page").unwrap();
        let _ = url;
        assert!(enforcer.is_url_allowed(&seeded_url).await.unwrap());
    }

    #[tokio::test]
    async fn test_can_fetch_domain_now_defaults_true_for_unknown_domain() {
        let enforcer = enforcer(vec![], false);
        assert!(enforcer.can_fetch_domain_now("never-seen.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_fetch_attempt_advances_next_fetch_time() {
        let enforcer = enforcer(vec![], false);
        enforcer.record_fetch_attempt("example.com").await.unwrap();
        assert!(!enforcer.can_fetch_domain_now("example.com").await.unwrap());
    }
}
