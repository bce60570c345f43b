use serde::Deserialize;

/// Default non-text path suffixes skipped at enqueue time. Fully overridable
/// via `non-text-extension-blocklist`; this is a conservative starting set,
/// not an exhaustive one (see DESIGN.md, open question on extension lists).
pub const DEFAULT_NON_TEXT_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp", ".ico", ".tiff", ".avif", ".mp3",
    ".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm", ".mkv", ".ogg", ".wav", ".pdf", ".doc",
    ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".zip", ".tar", ".gz", ".bz2", ".7z", ".rar",
    ".exe", ".dmg", ".iso", ".css", ".js", ".woff", ".woff2", ".ttf", ".eot",
];

/// Top-level configuration for a crawl run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pods: PodConfig,
}

/// Core crawl behavior: paths, limits, and stopping conditions.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Base directory for frontier files and (optionally) stored content.
    #[serde(rename = "data-dir")]
    pub data_dir: String,

    /// Path to the seed file (one URL per line).
    #[serde(rename = "seed-file")]
    pub seed_file: String,

    /// Optional path to the manual exclusion file (one domain per line).
    #[serde(rename = "exclude-file", default)]
    pub exclude_file: Option<String>,

    /// Skip seed loading and resume from persisted frontier/domain state.
    #[serde(default)]
    pub resume: bool,

    /// Only allow URLs whose domain was present in the seed file.
    #[serde(rename = "seeded-urls-only", default)]
    pub seeded_urls_only: bool,

    /// Stop once this many pages have been crawled.
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u64>,

    /// Stop after this many seconds of wall-clock runtime.
    #[serde(rename = "max-duration", default)]
    pub max_duration: Option<u64>,

    /// Total fetcher workers across all fetcher pods.
    #[serde(rename = "max-workers", default = "default_max_workers")]
    pub max_workers: u32,

    /// Floor on crawl delay, in seconds. Default matches the conservative
    /// 70-second minimum called out in the politeness contract.
    #[serde(rename = "min-crawl-delay-seconds", default = "default_min_crawl_delay")]
    pub min_crawl_delay_seconds: u64,

    /// Hard cap on normalized URL length, in bytes.
    #[serde(rename = "url-max-length", default = "default_url_max_length")]
    pub url_max_length: usize,

    /// Path suffixes treated as non-text and skipped at enqueue.
    #[serde(rename = "non-text-extension-blocklist", default = "default_non_text_extensions")]
    pub non_text_extension_blocklist: Vec<String>,

    /// How many ready domains `get_next_url` considers per scheduling
    /// attempt. Resolved open question: defaults to `max_workers * 5`.
    #[serde(rename = "candidate-check-limit", default)]
    pub candidate_check_limit: Option<u32>,

    /// Bloom filter capacity (entries). Default is computed from
    /// `max_pages` (2x) when absent, or a fixed fallback otherwise.
    #[serde(rename = "bloom-capacity", default)]
    pub bloom_capacity: Option<u64>,

    /// Bloom filter target false-positive rate.
    #[serde(rename = "bloom-fpr", default = "default_bloom_fpr")]
    pub bloom_fpr: f64,

    /// Content-storage collaborator mode: "disabled" or a directory name
    /// (relative to `data_dir`) to write fetched bodies into.
    #[serde(rename = "content-storage", default = "default_content_storage")]
    pub content_storage: String,

    /// Per-request fetch timeout, in seconds.
    #[serde(rename = "fetch-timeout-seconds", default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
}

fn default_max_workers() -> u32 {
    10
}

fn default_min_crawl_delay() -> u64 {
    70
}

fn default_url_max_length() -> usize {
    2000
}

fn default_bloom_fpr() -> f64 {
    0.001
}

fn default_content_storage() -> String {
    "disabled".to_string()
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_non_text_extensions() -> Vec<String> {
    DEFAULT_NON_TEXT_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl CrawlerConfig {
    pub fn candidate_check_limit(&self) -> u32 {
        self.candidate_check_limit
            .unwrap_or_else(|| self.max_workers.saturating_mul(5))
    }

    pub fn bloom_capacity(&self) -> u64 {
        self.bloom_capacity.unwrap_or_else(|| {
            self.max_pages
                .map(|p| p.saturating_mul(2))
                .unwrap_or(2_000_000)
        })
    }
}

/// User agent identification, sent as the `User-Agent` header and matched
/// against robots.txt groups.
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Renders the `User-Agent` header value and the token matched against
    /// robots.txt `User-agent:` groups.
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }

    pub fn token(&self) -> &str {
        &self.crawler_name
    }
}

/// Coordination store connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(rename = "store-url", default = "default_store_url")]
    pub store_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
        }
    }
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// Pod/worker concurrency layout.
#[derive(Debug, Clone, Deserialize)]
pub struct PodConfig {
    #[serde(rename = "fetcher-pods", default = "default_fetcher_pods")]
    pub fetcher_pods: u32,

    #[serde(rename = "parser-pods", default = "default_parser_pods")]
    pub parser_pods: u32,

    #[serde(rename = "fetcher-workers-per-pod", default = "default_workers_per_pod")]
    pub fetcher_workers_per_pod: u32,

    #[serde(rename = "parser-workers-per-pod", default = "default_workers_per_pod")]
    pub parser_workers_per_pod: u32,
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            fetcher_pods: default_fetcher_pods(),
            parser_pods: default_parser_pods(),
            fetcher_workers_per_pod: default_workers_per_pod(),
            parser_workers_per_pod: default_workers_per_pod(),
        }
    }
}

fn default_fetcher_pods() -> u32 {
    2
}

fn default_parser_pods() -> u32 {
    1
}

fn default_workers_per_pod() -> u32 {
    5
}
