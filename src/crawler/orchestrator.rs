//! The orchestrator: brings up shared state, forks fetcher and parser pod
//! task groups, and supervises the run to completion or shutdown.

use super::fetcher::build_http_client;
use super::fetcher_pool::FetcherPod;
use super::parser_pool::ParserPod;
use super::seed::load_seeds;
use crate::config::Config;
use crate::content::ContentStore;
use crate::frontier::{HybridFrontier, VisitedSet};
use crate::metrics::{self, ProcessLabels};
use crate::politeness::{load_exclusion_patterns, PolitenessEnforcer};
use crate::store::{ready_index_key, stats_key, CoordinationStore, RedisStore};
use crate::CrawlError;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How often the active-domain claim sweep runs after startup.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
/// Claims older than this are assumed to belong to a crashed worker.
const STALE_CLAIM_MAX_AGE_SECS: i64 = 300;
/// How often the status loop prints progress and evaluates stopping conditions.
const STATUS_INTERVAL: Duration = Duration::from_secs(5);
/// How long the orchestrator waits for in-flight work to drain before
/// force-aborting pod tasks on shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
/// Consecutive empty status ticks (frontier drained, parse queue empty)
/// required before "naturally finished" is treated as a stopping condition.
const DRAINED_TICKS_REQUIRED: u32 = 3;

/// Supervises one crawl run: store bring-up, seeding, pod task groups, and
/// the shutdown sequence.
pub struct Orchestrator {
    config: Config,
    store: Arc<dyn CoordinationStore>,
    shutdown: Arc<AtomicBool>,
}

impl Orchestrator {
    /// Connects to the coordination store named in `config.store.store_url`
    /// and builds an orchestrator around it.
    pub async fn bootstrap(config: Config) -> Result<Self, CrawlError> {
        let store = RedisStore::connect(&config.store.store_url)
            .await
            .map_err(CrawlError::from)?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Builds an orchestrator around an already-constructed store; used by
    /// tests to inject a `MemoryStore`.
    pub fn with_store(config: Config, store: Arc<dyn CoordinationStore>) -> Self {
        Self {
            config,
            store,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A clone of the shared shutdown flag, for a signal handler installed
    /// by the caller (the CLI binary) to trip.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Runs the crawl to completion: brings up collaborators, seeds or
    /// resumes, forks pod task groups, and drives the status/stop loop.
    pub async fn run(&self) -> Result<(), CrawlError> {
        let crawler_cfg = &self.config.crawler;

        let now = Utc::now().timestamp();
        let stale = self
            .store
            .sweep_stale_claims(now, STALE_CLAIM_MAX_AGE_SECS)
            .await?;
        if !stale.is_empty() {
            tracing::info!("startup sweep released {} stale domain claim(s)", stale.len());
        }

        let visited = VisitedSet::reserve(
            self.store.clone(),
            crawler_cfg.bloom_fpr,
            crawler_cfg.bloom_capacity(),
        )
        .await?;

        let http_client = build_http_client(&self.config.user_agent, crawler_cfg)
            .map_err(|e| CrawlError::Fatal(format!("failed to build HTTP client: {e}")))?;

        let exclusion_patterns = match &crawler_cfg.exclude_file {
            Some(path) => load_exclusion_patterns(path).await?,
            None => Vec::new(),
        };

        let politeness = Arc::new(PolitenessEnforcer::new(
            self.store.clone(),
            http_client.clone(),
            self.config.user_agent.token().to_string(),
            crawler_cfg.min_crawl_delay_seconds,
            crawler_cfg.seeded_urls_only,
            exclusion_patterns,
        ));

        let frontier = Arc::new(HybridFrontier::new(
            self.store.clone(),
            crawler_cfg.data_dir.clone(),
            visited,
            politeness.clone(),
            crawler_cfg.url_max_length,
            crawler_cfg.non_text_extension_blocklist.clone(),
            crawler_cfg.candidate_check_limit(),
        ));

        if crawler_cfg.resume {
            tracing::info!("resuming: skipping seed load, relying on persisted frontier state");
        } else {
            self.load_and_enqueue_seeds(&frontier, &politeness).await?;
        }

        let content_store = Arc::new(ContentStore::new(
            crawler_cfg.data_dir.clone(),
            &crawler_cfg.content_storage,
        ));

        let mut pod_handles = Vec::new();
        for pod_id in 0..self.config.pods.fetcher_pods {
            let pod = FetcherPod::new(
                pod_id,
                self.config.pods.fetcher_workers_per_pod,
                frontier.clone(),
                politeness.clone(),
                self.store.clone(),
                http_client.clone(),
                self.shutdown.clone(),
            );
            pod_handles.push(tokio::spawn(report_resource_usage_then_run(
                pod.run(),
                self.shutdown.clone(),
                ProcessLabels {
                    pod_id,
                    process_type: "fetcher",
                    process_id: pod_id,
                },
            )));
        }
        for pod_id in 0..self.config.pods.parser_pods {
            let pod = ParserPod::new(
                pod_id,
                self.config.pods.parser_workers_per_pod,
                frontier.clone(),
                self.store.clone(),
                content_store.clone(),
                self.shutdown.clone(),
            );
            pod_handles.push(tokio::spawn(report_resource_usage_then_run(
                pod.run(),
                self.shutdown.clone(),
                ProcessLabels {
                    pod_id,
                    process_type: "parser",
                    process_id: pod_id,
                },
            )));
        }

        let sweep_handle = tokio::spawn(sweep_loop(self.store.clone(), self.shutdown.clone()));

        self.status_loop().await?;

        self.shutdown.store(true, Ordering::Relaxed);
        sweep_handle.abort();

        let abort_handles: Vec<_> = pod_handles.iter().map(|h| h.abort_handle()).collect();
        match tokio::time::timeout(DRAIN_TIMEOUT, futures_join_all(pod_handles)).await {
            Ok(()) => tracing::info!("all pods drained cleanly"),
            Err(_) => {
                tracing::warn!("drain timeout exceeded, force-terminating straggling pods");
                for handle in abort_handles {
                    handle.abort();
                }
            }
        }

        Ok(())
    }

    async fn load_and_enqueue_seeds(
        &self,
        frontier: &HybridFrontier,
        politeness: &PolitenessEnforcer,
    ) -> Result<(), CrawlError> {
        let seeds = load_seeds(&self.config.crawler.seed_file).await?;
        tracing::info!("loaded {} seed URL(s)", seeds.len());

        let mut seeded_domains = std::collections::HashSet::new();
        for seed in &seeds {
            if seeded_domains.insert(seed.domain.clone()) {
                politeness.mark_domain_seeded(&seed.domain).await?;
            }
        }

        let urls: Vec<String> = seeds.into_iter().map(|s| s.url).collect();
        let added = frontier.add_urls_batch(&urls, 0).await?;
        tracing::info!("enqueued {added} seed URL(s) to the frontier");
        Ok(())
    }

    async fn status_loop(&self) -> Result<(), CrawlError> {
        let start = tokio::time::Instant::now();
        let mut drained_ticks = 0u32;

        loop {
            tokio::time::sleep(STATUS_INTERVAL).await;

            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(());
            }

            let pages_crawled = self.read_pages_crawled().await?;
            let ready_domains = self
                .store
                .sorted_set_range_by_score(ready_index_key(), f64::NEG_INFINITY, f64::INFINITY, 0, 1)
                .await?;
            let parse_queue_len = self
                .store
                .list_length(crate::store::parse_queue_key())
                .await?;

            metrics::record_pages_crawled(pages_crawled);
            metrics::record_frontier_size_estimate(parse_queue_len.max(0) as u64);

            tracing::info!(
                "status: crawled={pages_crawled} runtime={:.0}s parse_queue={parse_queue_len}",
                start.elapsed().as_secs_f64()
            );

            if let Some(max_pages) = self.config.crawler.max_pages {
                if pages_crawled >= max_pages {
                    tracing::info!("stopping: max_pages reached ({pages_crawled} >= {max_pages})");
                    return Ok(());
                }
            }
            if let Some(max_duration) = self.config.crawler.max_duration {
                if start.elapsed().as_secs() >= max_duration {
                    tracing::info!("stopping: max_duration reached");
                    return Ok(());
                }
            }

            if ready_domains.is_empty() && parse_queue_len == 0 {
                drained_ticks += 1;
                if drained_ticks >= DRAINED_TICKS_REQUIRED {
                    tracing::info!("stopping: frontier drained and parse queue empty");
                    return Ok(());
                }
            } else {
                drained_ticks = 0;
            }
        }
    }

    async fn read_pages_crawled(&self) -> Result<u64, CrawlError> {
        let values = self
            .store
            .hash_get_fields(stats_key(), &["pages_crawled"])
            .await?;
        Ok(values
            .into_iter()
            .next()
            .flatten()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }
}

async fn sweep_loop(store: Arc<dyn CoordinationStore>, shutdown: Arc<AtomicBool>) {
    loop {
        tokio::time::sleep(SWEEP_INTERVAL).await;
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        let now = Utc::now().timestamp();
        match store.sweep_stale_claims(now, STALE_CLAIM_MAX_AGE_SECS).await {
            Ok(released) if !released.is_empty() => {
                tracing::info!("periodic sweep released {} stale domain claim(s)", released.len());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("periodic stale-claim sweep failed: {e}"),
        }
    }
}

/// Periodically samples this process's memory/FD usage while `fut` runs,
/// so pod resource gauges update throughout the run rather than once.
async fn report_resource_usage_then_run<F>(fut: F, shutdown: Arc<AtomicBool>, labels: ProcessLabels<'static>)
where
    F: std::future::Future<Output = ()>,
{
    let sampler_shutdown = shutdown.clone();
    let sampler = tokio::spawn(async move {
        while !sampler_shutdown.load(Ordering::Relaxed) {
            let (memory_bytes, open_fds) = metrics::read_process_resource_usage();
            metrics::record_memory_bytes(labels, memory_bytes);
            metrics::record_open_fds(labels, open_fds);
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
    });
    fut.await;
    sampler.abort();
}

async fn futures_join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            if !e.is_cancelled() {
                tracing::error!("pod task failed: {e}");
            }
        }
    }
}
