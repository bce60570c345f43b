//! Fetcher worker pool: cooperative tasks that pop URLs from the hybrid
//! frontier, check politeness, fetch, and hand textual bodies off to the
//! parse queue.

use super::fetcher::{fetch_url, FetchOutcome};
use super::parse_job::ParseJob;
use crate::frontier::HybridFrontier;
use crate::metrics::{self, ProcessLabels};
use crate::politeness::{PolitenessEnforcer, UrlVerdict};
use crate::store::{parse_queue_key, CoordinationStore};
use crate::CrawlError;
use chrono::Utc;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const EMPTY_FRONTIER_BACKOFF: Duration = Duration::from_millis(500);
const PARSE_QUEUE_SOFT_CAP: i64 = 10_000;
const BACKPRESSURE_BACKOFF: Duration = Duration::from_millis(200);

/// One fetcher pod: a supervised group of `worker_count` cooperative
/// fetcher workers sharing a pod id and an HTTP client.
pub struct FetcherPod {
    pod_id: u32,
    worker_count: u32,
    frontier: Arc<HybridFrontier>,
    politeness: Arc<PolitenessEnforcer>,
    store: Arc<dyn CoordinationStore>,
    http_client: Client,
    shutdown: Arc<AtomicBool>,
}

impl FetcherPod {
    pub fn new(
        pod_id: u32,
        worker_count: u32,
        frontier: Arc<HybridFrontier>,
        politeness: Arc<PolitenessEnforcer>,
        store: Arc<dyn CoordinationStore>,
        http_client: Client,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pod_id,
            worker_count,
            frontier,
            politeness,
            store,
            http_client,
            shutdown,
        }
    }

    /// Spawns all workers for this pod and waits for them to drain on
    /// shutdown.
    pub async fn run(self) {
        let mut handles = Vec::with_capacity(self.worker_count as usize);
        for worker_id in 0..self.worker_count {
            let pod_id = self.pod_id;
            let frontier = self.frontier.clone();
            let politeness = self.politeness.clone();
            let store = self.store.clone();
            let http_client = self.http_client.clone();
            let shutdown = self.shutdown.clone();
            handles.push(tokio::spawn(async move {
                fetcher_worker_loop(
                    pod_id,
                    worker_id,
                    frontier,
                    politeness,
                    store,
                    http_client,
                    shutdown,
                )
                .await
            }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("fetcher worker panicked: {e}");
            }
        }
    }
}

async fn fetcher_worker_loop(
    pod_id: u32,
    worker_id: u32,
    frontier: Arc<HybridFrontier>,
    politeness: Arc<PolitenessEnforcer>,
    store: Arc<dyn CoordinationStore>,
    http_client: Client,
    shutdown: Arc<AtomicBool>,
) {
    let labels = ProcessLabels {
        pod_id,
        process_type: "fetcher",
        process_id: worker_id,
    };

    while !shutdown.load(Ordering::Relaxed) {
        if let Err(e) = throttle_on_backpressure(&store).await {
            tracing::warn!("parse queue backpressure check failed: {e}");
        }

        let next = match frontier.get_next_url(worker_id).await {
            Ok(next) => next,
            Err(e) => {
                tracing::error!("fetcher worker {worker_id} failed to get next URL: {e}");
                tokio::time::sleep(EMPTY_FRONTIER_BACKOFF).await;
                continue;
            }
        };

        let Some((url, domain, depth)) = next else {
            tokio::time::sleep(EMPTY_FRONTIER_BACKOFF).await;
            continue;
        };

        if let Err(e) = process_one_url(
            &frontier,
            &politeness,
            &store,
            &http_client,
            &url,
            &domain,
            depth,
        )
        .await
        {
            tracing::warn!("fetcher worker {worker_id} failed on {url}: {e}");
        }

        metrics::record_page_processed(labels);
    }
}

async fn throttle_on_backpressure(store: &Arc<dyn CoordinationStore>) -> Result<(), CrawlError> {
    if store.list_length(parse_queue_key()).await? > PARSE_QUEUE_SOFT_CAP {
        tokio::time::sleep(BACKPRESSURE_BACKOFF).await;
    }
    Ok(())
}

async fn process_one_url(
    frontier: &HybridFrontier,
    politeness: &PolitenessEnforcer,
    store: &Arc<dyn CoordinationStore>,
    http_client: &Client,
    url: &str,
    domain: &str,
    depth: u32,
) -> Result<(), CrawlError> {
    let Ok(parsed) = Url::parse(url) else {
        frontier
            .mark_visited(url, 0, Utc::now().timestamp(), "", "")
            .await?;
        return Ok(());
    };

    let verdict = politeness.classify_url(&parsed).await?;
    if let Some(status_code) = verdict.sentinel_status_code() {
        frontier
            .mark_visited(url, status_code, Utc::now().timestamp(), "", "")
            .await?;
        return Ok(());
    }
    debug_assert_eq!(verdict, UrlVerdict::Allowed);

    politeness.record_fetch_attempt(domain).await?;

    match fetch_url(http_client, url).await {
        FetchOutcome::Success {
            final_url,
            status_code,
            content_type,
            body,
        } => {
            let job = ParseJob {
                url: url.to_string(),
                domain: domain.to_string(),
                depth,
                final_url,
                status_code,
                content_type,
                body,
            };
            store
                .list_push_right(parse_queue_key(), &[job.to_json()])
                .await?;
        }
        FetchOutcome::NonTextual {
            status_code,
            content_type,
        } => {
            frontier
                .mark_visited(url, status_code, Utc::now().timestamp(), &content_type, "")
                .await?;
        }
        FetchOutcome::HttpError { status_code } => {
            frontier
                .mark_visited(url, status_code, Utc::now().timestamp(), "", "")
                .await?;
        }
        FetchOutcome::NetworkError { message } => {
            tracing::debug!("network error fetching {url}: {message}");
            frontier
                .mark_visited(url, 599, Utc::now().timestamp(), "", "")
                .await?;
        }
    }

    Ok(())
}
