use super::robots_parser::ParsedRobots;
use crate::store::CoordinationStore;
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

const CACHE_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Returns the cached-or-freshly-fetched robots.txt for `domain`, refreshing
/// the coordination store's cached copy on miss or expiry. Final fetch
/// failure is treated as "allow all" with an empty cached body, per the
/// politeness contract — a transient robots.txt outage must never stop the
/// crawl, only make it permissive until the next refresh.
pub async fn get_or_fetch(
    store: &Arc<dyn CoordinationStore>,
    http_client: &Client,
    domain: &str,
) -> ParsedRobots {
    let now = Utc::now().timestamp();

    if let Ok(Some(metadata)) = store.get_domain_metadata(domain).await {
        if let Some(body) = &metadata.robots_txt {
            if metadata.robots_expires > now {
                return ParsedRobots::from_content(body);
            }
        }
    }

    let body = fetch_robots_body(http_client, domain).await;
    let expires = now + CACHE_TTL_SECONDS;
    let _ = store.set_domain_robots(domain, &body, expires).await;
    ParsedRobots::from_content(&body)
}

async fn fetch_robots_body(http_client: &Client, domain: &str) -> String {
    if let Some(body) = try_fetch(http_client, &format!("http://{domain}/robots.txt")).await {
        if !body.is_empty() {
            return body;
        }
    }
    try_fetch(http_client, &format!("https://{domain}/robots.txt"))
        .await
        .unwrap_or_default()
}

async fn try_fetch(http_client: &Client, url: &str) -> Option<String> {
    let response = http_client
        .get(url)
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.text().await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_unreachable_domain_yields_allow_all() {
        let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
        let client = Client::new();
        // .invalid is reserved by RFC 2606 and guaranteed not to resolve.
        let robots = get_or_fetch(&store, &client, "nonexistent.invalid").await;
        assert!(robots.is_allowed("/anything", "TestBot"));
    }

    #[tokio::test]
    async fn test_cached_body_is_reused_before_expiry() {
        let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
        store
            .set_domain_robots("example.com", "User-agent: *\nDisallow: /", Utc::now().timestamp() + 1000)
            .await
            .unwrap();
        let client = Client::new();
        let robots = get_or_fetch(&store, &client, "example.com").await;
        assert!(!robots.is_allowed("/", "TestBot"));
    }
}
