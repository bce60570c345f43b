//! HTTP fetcher: builds the shared client, performs GETs with manual
//! redirect handling and retry-on-transient-failure, classifies responses
//! by textual content type.

use crate::config::{CrawlerConfig, UserAgentConfig};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::collections::HashSet;
use std::time::Duration;

/// Outcome of fetching one URL, after following redirects and retries.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Fetched a textual (HTML) body.
    Success {
        final_url: String,
        status_code: u16,
        content_type: String,
        body: String,
    },
    /// Fetched successfully but the content type is not textual.
    NonTextual {
        status_code: u16,
        content_type: String,
    },
    /// Terminal HTTP error (4xx, or 5xx after exhausting retries).
    HttpError { status_code: u16 },
    /// Network-level failure (timeout, connection refused, redirect loop).
    NetworkError { message: String },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt)
    }

    fn is_retryable(status: Option<StatusCode>, is_timeout: bool, is_connect: bool) -> bool {
        if is_timeout || is_connect {
            return true;
        }
        matches!(status, Some(status) if status.is_server_error())
    }
}

#[derive(Debug)]
struct RedirectChain {
    max_redirects: u32,
    visited: HashSet<String>,
}

impl RedirectChain {
    fn new() -> Self {
        Self {
            max_redirects: 10,
            visited: HashSet::new(),
        }
    }

    fn add_url(&mut self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    fn is_too_long(&self) -> bool {
        self.visited.len() > self.max_redirects as usize
    }
}

/// Builds the shared HTTP client: one per process, reused for page fetches
/// and robots.txt lookups. Redirects are followed manually so each hop can
/// be normalized and re-checked against politeness before use.
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(crawler.fetch_timeout_seconds))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

pub async fn fetch_url(client: &Client, url: &str) -> FetchOutcome {
    fetch_url_with_retry(client, url, &RetryPolicy::default()).await
}

pub async fn fetch_url_with_retry(
    client: &Client,
    url: &str,
    policy: &RetryPolicy,
) -> FetchOutcome {
    let mut attempt = 0;
    loop {
        let result = fetch_url_once(client, url).await;

        let should_retry = match &result {
            FetchOutcome::HttpError { status_code } => {
                RetryPolicy::is_retryable(StatusCode::from_u16(*status_code).ok(), false, false)
            }
            FetchOutcome::NetworkError { .. } => attempt < policy.max_retries,
            _ => false,
        };

        if !should_retry || attempt >= policy.max_retries {
            return result;
        }

        let delay = policy.delay_for_attempt(attempt);
        tracing::debug!("retry attempt {} for {}, waiting {:?}", attempt + 1, url, delay);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

async fn fetch_url_once(client: &Client, url: &str) -> FetchOutcome {
    Box::pin(fetch_url_with_redirects(client, url, &mut RedirectChain::new())).await
}

fn resolve_redirect(base: &str, location: &str) -> Option<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Some(location.to_string());
    }
    let base_url = url::Url::parse(base).ok()?;
    base_url.join(location).ok().map(|u| u.to_string())
}

async fn fetch_url_with_redirects(
    client: &Client,
    url: &str,
    redirect_chain: &mut RedirectChain,
) -> FetchOutcome {
    if !redirect_chain.add_url(url) {
        return FetchOutcome::NetworkError {
            message: format!("redirect loop detected at {url}"),
        };
    }
    if redirect_chain.is_too_long() {
        return FetchOutcome::NetworkError {
            message: format!("too many redirects (max {})", redirect_chain.max_redirects),
        };
    }

    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return classify_request_error(e),
    };

    let status = response.status();
    let final_url = response.url().to_string();

    if status.is_redirection() {
        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        return match location.and_then(|loc| resolve_redirect(url, &loc)) {
            Some(redirect_url) => {
                tracing::debug!("following redirect from {} to {}", url, redirect_url);
                Box::pin(fetch_url_with_redirects(client, &redirect_url, redirect_chain)).await
            }
            None => FetchOutcome::NetworkError {
                message: "redirect response without a usable Location header".to_string(),
            },
        };
    }

    if !status.is_success() {
        return FetchOutcome::HttpError {
            status_code: status.as_u16(),
        };
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !content_type.is_empty() && !content_type.contains("text/html") {
        return FetchOutcome::NonTextual {
            status_code: status.as_u16(),
            content_type,
        };
    }

    match response.text().await {
        Ok(body) => FetchOutcome::Success {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
        },
        Err(e) => FetchOutcome::NetworkError {
            message: e.to_string(),
        },
    }
}

fn classify_request_error(e: reqwest::Error) -> FetchOutcome {
    if e.is_timeout() {
        FetchOutcome::NetworkError {
            message: "request timeout".to_string(),
        }
    } else if e.is_connect() {
        FetchOutcome::NetworkError {
            message: "connection refused".to_string(),
        }
    } else if let Some(status) = e.status() {
        FetchOutcome::HttpError {
            status_code: status.as_u16(),
        }
    } else {
        FetchOutcome::NetworkError {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user_agent() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn test_crawler_config() -> CrawlerConfig {
        CrawlerConfig {
            data_dir: "/tmp/podcrawl-test".to_string(),
            seed_file: "seeds.txt".to_string(),
            exclude_file: None,
            resume: false,
            seeded_urls_only: false,
            max_pages: None,
            max_duration: None,
            max_workers: 10,
            min_crawl_delay_seconds: 70,
            url_max_length: 2000,
            non_text_extension_blocklist: vec![],
            candidate_check_limit: None,
            bloom_capacity: None,
            bloom_fpr: 0.001,
            content_storage: "disabled".to_string(),
            fetch_timeout_seconds: 30,
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&test_user_agent(), &test_crawler_config());
        assert!(client.is_ok());
    }

    #[test]
    fn test_retry_policy_delay_calculation() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(20));
    }

    #[test]
    fn test_is_retryable_5xx_not_4xx() {
        assert!(RetryPolicy::is_retryable(
            Some(StatusCode::INTERNAL_SERVER_ERROR),
            false,
            false
        ));
        assert!(!RetryPolicy::is_retryable(
            Some(StatusCode::NOT_FOUND),
            false,
            false
        ));
    }

    #[test]
    fn test_is_retryable_timeout_and_connect() {
        assert!(RetryPolicy::is_retryable(None, true, false));
        assert!(RetryPolicy::is_retryable(None, false, true));
    }

    #[test]
    fn test_resolve_redirect_relative() {
        let resolved = resolve_redirect("https://example.com/page", "/other").unwrap();
        assert_eq!(resolved, "https://example.com/other");
    }

    #[test]
    fn test_resolve_redirect_absolute() {
        let resolved = resolve_redirect("https://example.com/page", "https://other.com/x").unwrap();
        assert_eq!(resolved, "https://other.com/x");
    }
}
