use super::entry::FrontierEntry;
use super::file_manager::FrontierFileManager;
use super::visited::VisitedSet;
use crate::politeness::PolitenessEnforcer;
use crate::store::{ready_index_key, CoordinationStore};
use crate::url::{is_non_text_resource, normalize_url};
use crate::{extract_domain, CrawlError};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const CLAIM_BACKOFF: Duration = Duration::from_millis(100);
const GET_NEXT_URL_WAIT_BUDGET: Duration = Duration::from_secs(5);
/// Workers are split into this many contention shards (per spec §4.4,
/// "worker_id mod shard count"), not `candidate_check_limit` — with the
/// limit defaulting to `max_workers * 5`, modding by it instead would push
/// higher-numbered workers past the end of a small ready set, starving
/// them until more domains become ready.
const WORKER_SHARD_COUNT: u32 = 8;

/// The queue-with-politeness abstraction fetchers consume from and parsers
/// feed into: per-domain append-only files, coordinated through the
/// coordination store's ready index and active-claim set.
pub struct HybridFrontier {
    store: Arc<dyn CoordinationStore>,
    files: FrontierFileManager,
    visited: VisitedSet,
    politeness: Arc<PolitenessEnforcer>,
    url_max_length: usize,
    non_text_extension_blocklist: Vec<String>,
    candidate_check_limit: u32,
}

impl HybridFrontier {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        data_dir: impl Into<std::path::PathBuf>,
        visited: VisitedSet,
        politeness: Arc<PolitenessEnforcer>,
        url_max_length: usize,
        non_text_extension_blocklist: Vec<String>,
        candidate_check_limit: u32,
    ) -> Self {
        Self {
            store,
            files: FrontierFileManager::new(data_dir),
            visited,
            politeness,
            url_max_length,
            non_text_extension_blocklist,
            candidate_check_limit,
        }
    }

    /// Normalizes, filters, and enqueues `candidates`, returning the number
    /// of URLs actually appended to a frontier file.
    pub async fn add_urls_batch(
        &self,
        candidates: &[String],
        depth: u32,
    ) -> Result<usize, CrawlError> {
        let now = Utc::now().timestamp();
        let mut by_domain: HashMap<String, Vec<String>> = HashMap::new();

        for candidate in candidates {
            if candidate.len() > self.url_max_length {
                continue;
            }
            let Ok(parsed) = Url::parse(candidate) else {
                continue;
            };
            if is_non_text_resource(&parsed, &self.non_text_extension_blocklist) {
                continue;
            }
            let Ok(normalized) = normalize_url(candidate) else {
                continue;
            };
            // Normalization can lengthen a URL (percent-encoding expansion),
            // so the length cap must be re-checked on the normalized form,
            // not just the raw candidate.
            if normalized.len() > self.url_max_length {
                continue;
            }
            let Ok(normalized_parsed) = Url::parse(&normalized) else {
                continue;
            };
            let Some(domain) = extract_domain(&normalized_parsed) else {
                continue;
            };
            by_domain.entry(domain).or_default().push(normalized);
        }

        let mut total_added = 0usize;
        for (domain, urls) in by_domain {
            let mut surviving = Vec::with_capacity(urls.len());
            for url in urls {
                if !self.visited.contains(&url).await? {
                    surviving.push(url);
                }
            }
            if surviving.is_empty() {
                continue;
            }

            let entries: Vec<FrontierEntry> = surviving
                .iter()
                .map(|url| FrontierEntry::new(url.clone(), depth, now))
                .collect();

            let (bytes_written, _new_size) = self.files.append(&domain, &entries).await?;

            let file_path = crate::store::frontier_relative_path(&domain);
            self.store
                .pipeline_update_domain_on_enqueue(&domain, &file_path, bytes_written, now)
                .await?;

            for url in &surviving {
                self.visited.add(url).await?;
            }

            total_added += surviving.len();
        }

        Ok(total_added)
    }

    /// Claims a ready domain and pops the next URL from its frontier file.
    /// Returns `(url, domain, depth)`, or `None` if no domain was claimable
    /// within the wait budget.
    pub async fn get_next_url(
        &self,
        worker_id: u32,
    ) -> Result<Option<(String, String, u32)>, CrawlError> {
        let start = tokio::time::Instant::now();

        loop {
            let now = Utc::now().timestamp();
            let offset = (worker_id % WORKER_SHARD_COUNT) as usize;
            let candidates = self
                .store
                .sorted_set_range_by_score(
                    ready_index_key(),
                    f64::NEG_INFINITY,
                    now as f64,
                    offset,
                    self.candidate_check_limit as usize,
                )
                .await?;

            for domain in candidates {
                if !self.store.claim_domain(&domain, now).await? {
                    continue;
                }

                let offset = self
                    .store
                    .get_domain_metadata(&domain)
                    .await?
                    .map(|m| m.frontier_offset)
                    .unwrap_or(0);

                match self.files.read_one(&domain, offset).await? {
                    Some((entry, new_offset)) => {
                        self.store
                            .set_domain_frontier_offset(&domain, new_offset)
                            .await?;
                        let delay = self.politeness.crawl_delay(&domain).await;
                        self.store
                            .sorted_set_add(
                                ready_index_key(),
                                &domain,
                                now as f64 + delay,
                                false,
                            )
                            .await?;
                        self.store.release_domain(&domain).await?;
                        return Ok(Some((entry.url, domain, entry.depth)));
                    }
                    None => {
                        self.store.sorted_set_remove(ready_index_key(), &domain).await?;
                        self.store.release_domain(&domain).await?;
                        continue;
                    }
                }
            }

            if start.elapsed() >= GET_NEXT_URL_WAIT_BUDGET {
                return Ok(None);
            }
            tokio::time::sleep(CLAIM_BACKOFF).await;
        }
    }

    /// Records the outcome of a fetch attempt against the visited record.
    /// Defensively adds to the visited bloom filter, covering seed URLs
    /// that were never routed through `add_urls_batch`.
    pub async fn mark_visited(
        &self,
        url: &str,
        status_code: u16,
        fetched_at: i64,
        content_type: &str,
        content_path: &str,
    ) -> Result<(), CrawlError> {
        let key = crate::store::visited_record_key(url);
        self.store
            .hash_set(
                &key,
                &[
                    ("status_code", status_code.to_string()),
                    ("fetched_at", fetched_at.to_string()),
                    ("content_type", content_type.to_string()),
                    ("content_path", content_path.to_string()),
                ],
            )
            .await?;
        self.visited.add(url).await?;
        self.store
            .hash_increment(crate::store::stats_key(), "pages_crawled", 1)
            .await?;
        Ok(())
    }
}
