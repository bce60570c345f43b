//! Prometheus metrics surface. Every metric carries `pod_id` as a distinct
//! label; every process additionally reports `process_type` and a numeric
//! `process_id` so per-pod and per-process-role aggregations both work.

use crate::CrawlError;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Installs the global Prometheus recorder and starts its HTTP listener.
/// Call once, at process startup.
pub fn install_exporter(listen_addr: SocketAddr) -> Result<(), CrawlError> {
    PrometheusBuilder::new()
        .with_http_listener(listen_addr)
        .install()
        .map_err(|e| CrawlError::Fatal(format!("failed to install metrics exporter: {e}")))
}

/// Labels identifying one pod process: `pod_id` plus its role (`"fetcher"`,
/// `"parser"`, `"orchestrator"`) and a role-scoped numeric id.
#[derive(Debug, Clone, Copy)]
pub struct ProcessLabels<'a> {
    pub pod_id: u32,
    pub process_type: &'a str,
    pub process_id: u32,
}

impl ProcessLabels<'_> {
    fn pod_id_str(&self) -> String {
        self.pod_id.to_string()
    }

    fn process_id_str(&self) -> String {
        self.process_id.to_string()
    }
}

/// Records one fetched/parsed page for the `pages_per_second`-derived
/// counter, labeled by pod and worker role.
pub fn record_page_processed(labels: ProcessLabels) {
    metrics::counter!(
        "podcrawl_pages_processed_total",
        "pod_id" => labels.pod_id_str(),
        "process_type" => labels.process_type.to_string(),
        "worker_id" => labels.process_id_str(),
    )
    .increment(1);
}

/// Records the process-level resident memory gauge.
pub fn record_memory_bytes(labels: ProcessLabels, bytes: u64) {
    metrics::gauge!(
        "podcrawl_process_memory_bytes",
        "pod_id" => labels.pod_id_str(),
        "process_type" => labels.process_type.to_string(),
        "process_id" => labels.process_id_str(),
    )
    .set(bytes as f64);
}

/// Records the process-level open file descriptor gauge.
pub fn record_open_fds(labels: ProcessLabels, count: u64) {
    metrics::gauge!(
        "podcrawl_process_open_fds",
        "pod_id" => labels.pod_id_str(),
        "process_type" => labels.process_type.to_string(),
        "process_id" => labels.process_id_str(),
    )
    .set(count as f64);
}

/// Records an overall crawl progress gauge (pages crawled so far).
pub fn record_pages_crawled(total: u64) {
    metrics::gauge!("podcrawl_pages_crawled").set(total as f64);
}

/// Records the approximate frontier size (sum of `frontier_size - frontier_offset`
/// across known domains, as sampled by the orchestrator's status loop).
pub fn record_frontier_size_estimate(size: u64) {
    metrics::gauge!("podcrawl_frontier_size_estimate").set(size as f64);
}

/// Reads this process's resident memory (bytes) and open file descriptor
/// count from `/proc/self`. Returns `(0, 0)` on platforms without it (the
/// gauges simply read zero rather than failing the pod).
pub fn read_process_resource_usage() -> (u64, u64) {
    let memory_bytes = std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status.lines().find_map(|line| {
                line.strip_prefix("VmRSS:").map(|rest| {
                    rest.trim()
                        .trim_end_matches(" kB")
                        .trim()
                        .parse::<u64>()
                        .unwrap_or(0)
                        * 1024
                })
            })
        })
        .unwrap_or(0);

    let open_fds = std::fs::read_dir("/proc/self/fd")
        .map(|entries| entries.count() as u64)
        .unwrap_or(0);

    (memory_bytes, open_fds)
}
