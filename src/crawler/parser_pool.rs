//! Parser worker pool: cooperative tasks that drain the parse queue, extract
//! links, and feed them back into the hybrid frontier.

use super::parse_job::ParseJob;
use super::parser::parse_html;
use crate::content::ContentStore;
use crate::frontier::HybridFrontier;
use crate::metrics::{self, ProcessLabels};
use crate::store::{parse_queue_key, CoordinationStore};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const POP_TIMEOUT: Duration = Duration::from_secs(2);
const EMPTY_QUEUE_BACKOFF: Duration = Duration::from_millis(200);

/// One parser pod: a supervised group of `worker_count` cooperative parser
/// workers sharing a pod id.
pub struct ParserPod {
    pod_id: u32,
    worker_count: u32,
    frontier: Arc<HybridFrontier>,
    store: Arc<dyn CoordinationStore>,
    content_store: Arc<ContentStore>,
    shutdown: Arc<AtomicBool>,
}

impl ParserPod {
    pub fn new(
        pod_id: u32,
        worker_count: u32,
        frontier: Arc<HybridFrontier>,
        store: Arc<dyn CoordinationStore>,
        content_store: Arc<ContentStore>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pod_id,
            worker_count,
            frontier,
            store,
            content_store,
            shutdown,
        }
    }

    pub async fn run(self) {
        let mut handles = Vec::with_capacity(self.worker_count as usize);
        for worker_id in 0..self.worker_count {
            let pod_id = self.pod_id;
            let frontier = self.frontier.clone();
            let store = self.store.clone();
            let content_store = self.content_store.clone();
            let shutdown = self.shutdown.clone();
            handles.push(tokio::spawn(async move {
                parser_worker_loop(pod_id, worker_id, frontier, store, content_store, shutdown)
                    .await
            }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("parser worker panicked: {e}");
            }
        }
    }
}

async fn parser_worker_loop(
    pod_id: u32,
    worker_id: u32,
    frontier: Arc<HybridFrontier>,
    store: Arc<dyn CoordinationStore>,
    content_store: Arc<ContentStore>,
    shutdown: Arc<AtomicBool>,
) {
    let labels = ProcessLabels {
        pod_id,
        process_type: "parser",
        process_id: worker_id,
    };

    while !shutdown.load(Ordering::Relaxed) {
        let popped = store
            .list_pop_left_blocking(parse_queue_key(), POP_TIMEOUT)
            .await;

        let raw = match popped {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tokio::time::sleep(EMPTY_QUEUE_BACKOFF).await;
                continue;
            }
            Err(e) => {
                tracing::error!("parser worker {worker_id} failed to pop parse job: {e}");
                tokio::time::sleep(EMPTY_QUEUE_BACKOFF).await;
                continue;
            }
        };

        let job = match ParseJob::from_json(&raw) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!("parser worker {worker_id} got malformed parse job: {e}");
                continue;
            }
        };

        if let Err(e) = process_one_job(&frontier, &content_store, job).await {
            tracing::warn!("parser worker {worker_id} failed: {e}");
        }

        metrics::record_page_processed(labels);
    }
}

async fn process_one_job(
    frontier: &HybridFrontier,
    content_store: &ContentStore,
    job: ParseJob,
) -> Result<(), crate::CrawlError> {
    let Ok(final_url) = Url::parse(&job.final_url) else {
        frontier
            .mark_visited(&job.url, job.status_code, Utc::now().timestamp(), &job.content_type, "")
            .await?;
        return Ok(());
    };

    let links = match parse_html(&job.body, &final_url) {
        Ok(parsed) => parsed.links,
        Err(e) => {
            tracing::debug!("parse failed for {}: {e}", job.url);
            Vec::new()
        }
    };

    if !links.is_empty() {
        frontier.add_urls_batch(&links, job.depth + 1).await?;
    }

    let content_path = content_store.store(&job.url, &job.body).await?;

    frontier
        .mark_visited(
            &job.url,
            job.status_code,
            Utc::now().timestamp(),
            &job.content_type,
            &content_path,
        )
        .await?;

    Ok(())
}
