use sha2::{Digest, Sha256};

/// Coordination store keys and the content-hash path layout used to derive
/// frontier file paths and visited-record keys without putting raw domain
/// or URL strings into file paths.

pub fn domain_metadata_key(domain: &str) -> String {
    format!("domain:{domain}")
}

pub fn ready_index_key() -> &'static str {
    "domains:ready"
}

pub fn active_set_key() -> &'static str {
    "domains:active"
}

pub fn visited_bloom_key() -> &'static str {
    "visited:bloom"
}

pub fn parse_queue_key() -> &'static str {
    "parse:queue"
}

/// Global run counters: currently just `pages_crawled`, incremented once
/// per `mark_visited` call and read by the orchestrator's status loop and
/// stopping-condition check.
pub fn stats_key() -> &'static str {
    "stats:counters"
}

pub fn visited_record_key(url: &str) -> String {
    format!("visited:{}", url_hash_prefix(url, 16))
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Truncated SHA-256 hex digest of `input`, used both to cap the visited
/// key length and to fan out frontier files across subdirectories.
pub fn url_hash_prefix(input: &str, len: usize) -> String {
    let full = sha256_hex(input);
    full[..len.min(full.len())].to_string()
}

/// Derives the per-domain frontier file path (relative to `data_dir`):
/// `frontiers/{hh}/{domain_hash}.frontier`, where `{hh}` is the first two
/// hex characters of the domain's content hash, capping directory fan-out.
pub fn frontier_relative_path(domain: &str) -> String {
    let hash = url_hash_prefix(domain, 32);
    let subdir = &hash[..2];
    format!("frontiers/{subdir}/{hash}.frontier")
}

/// Derives the content file path (relative to `data_dir`) for a fetched
/// URL body: `content/{prefix}/{url_hash}.html`.
pub fn content_relative_path(url: &str) -> String {
    let hash = url_hash_prefix(url, 32);
    let subdir = &hash[..2];
    format!("content/{subdir}/{hash}.html")
}
