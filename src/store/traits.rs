use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the coordination store client.
///
/// Transient failures (network blips, a momentarily evicted connection) are
/// retried internally by the client with jittered backoff; what reaches the
/// caller here is either a successfully-retried result or an exhausted
/// retry budget reported as `Transient`, plus a handful of conditions that
/// are never worth retrying.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation failed after retries: {0}")]
    Transient(String),

    #[error("store unreachable: {0}")]
    Unavailable(String),

    #[error("store serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// The fields tracked for a domain in the coordination store, per the data
/// model's Domain Metadata hash.
#[derive(Debug, Clone, Default)]
pub struct DomainMetadata {
    pub file_path: Option<String>,
    pub frontier_offset: u64,
    pub frontier_size: u64,
    pub next_fetch_time: i64,
    pub robots_txt: Option<String>,
    pub robots_expires: i64,
    pub is_excluded: bool,
    pub is_seeded: bool,
}

const FIELD_FILE_PATH: &str = "file_path";
const FIELD_FRONTIER_OFFSET: &str = "frontier_offset";
const FIELD_FRONTIER_SIZE: &str = "frontier_size";
const FIELD_NEXT_FETCH_TIME: &str = "next_fetch_time";
const FIELD_ROBOTS_TXT: &str = "robots_txt";
const FIELD_ROBOTS_EXPIRES: &str = "robots_expires";
const FIELD_IS_EXCLUDED: &str = "is_excluded";
const FIELD_IS_SEEDED: &str = "is_seeded";

const DOMAIN_METADATA_FIELDS: &[&str] = &[
    FIELD_FILE_PATH,
    FIELD_FRONTIER_OFFSET,
    FIELD_FRONTIER_SIZE,
    FIELD_NEXT_FETCH_TIME,
    FIELD_ROBOTS_TXT,
    FIELD_ROBOTS_EXPIRES,
    FIELD_IS_EXCLUDED,
    FIELD_IS_SEEDED,
];

/// Typed wrapper over a key/value store exposing the narrow capability set
/// the core needs: hashes, sorted sets, sets, lists, pipelining, and an
/// extension for probabilistic (bloom) sets.
///
/// This is the one place in the core where a trait is essential: storage
/// operations are polymorphic over this capability set, and every other
/// component depends on a concrete choice of `dyn CoordinationStore`
/// (Redis in production, an in-memory double in tests).
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn hash_get_fields(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>>;
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>>;
    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<()>;
    async fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> Result<bool>;
    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64>;
    async fn hash_delete_field(&self, key: &str, field: &str) -> Result<()>;

    async fn sorted_set_add(
        &self,
        key: &str,
        member: &str,
        score: f64,
        only_if_absent: bool,
    ) -> Result<bool>;
    async fn sorted_set_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        offset: usize,
        count: usize,
    ) -> Result<Vec<String>>;
    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<()>;

    async fn set_add(&self, key: &str, member: &str) -> Result<bool>;
    async fn set_remove(&self, key: &str, member: &str) -> Result<()>;

    async fn list_push_right(&self, key: &str, values: &[String]) -> Result<()>;
    async fn list_pop_left_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>>;
    async fn list_length(&self, key: &str) -> Result<i64>;

    async fn bloom_reserve(&self, key: &str, fpr: f64, capacity: u64) -> Result<()>;
    async fn bloom_add(&self, key: &str, value: &str) -> Result<bool>;
    async fn bloom_contains(&self, key: &str, value: &str) -> Result<bool>;

    /// The one pipelined transaction `add_urls_batch` needs: update
    /// `frontier_size`, ensure `file_path` and `frontier_offset` are
    /// initialized, and add the domain to the ready index if absent — all
    /// in a single round trip. Modeled as a named operation rather than a
    /// generic `pipeline()` context so the trait stays object-safe (see
    /// DESIGN.md).
    async fn pipeline_update_domain_on_enqueue(
        &self,
        domain: &str,
        file_path: &str,
        bytes_written: u64,
        now: i64,
    ) -> Result<()>;

    /// Attempts to claim `domain` in the active set, recording `now` as the
    /// claim timestamp. Returns `true` if the claim was acquired.
    async fn claim_domain(&self, domain: &str, now: i64) -> Result<bool>;

    /// Releases a claim this process holds on `domain`.
    async fn release_domain(&self, domain: &str) -> Result<()>;

    /// Removes and returns any active-set claims older than `max_age_secs`,
    /// used by the crash-recovery sweep.
    async fn sweep_stale_claims(&self, now: i64, max_age_secs: i64) -> Result<Vec<String>>;

    /// Reads the domain metadata hash, returning `None` if it has never
    /// been created.
    async fn get_domain_metadata(&self, domain: &str) -> Result<Option<DomainMetadata>> {
        let key = crate::store::keys::domain_metadata_key(domain);
        let values = self.hash_get_fields(&key, DOMAIN_METADATA_FIELDS).await?;
        if values.iter().all(Option::is_none) {
            return Ok(None);
        }
        let get = |i: usize| values.get(i).cloned().flatten();
        Ok(Some(DomainMetadata {
            file_path: get(0),
            frontier_offset: get(1).and_then(|v| v.parse().ok()).unwrap_or(0),
            frontier_size: get(2).and_then(|v| v.parse().ok()).unwrap_or(0),
            next_fetch_time: get(3).and_then(|v| v.parse().ok()).unwrap_or(0),
            robots_txt: get(4),
            robots_expires: get(5).and_then(|v| v.parse().ok()).unwrap_or(0),
            is_excluded: get(6).as_deref() == Some("1"),
            is_seeded: get(7).as_deref() == Some("1"),
        }))
    }

    async fn set_domain_excluded(&self, domain: &str, excluded: bool) -> Result<()> {
        let key = crate::store::keys::domain_metadata_key(domain);
        self.hash_set(
            &key,
            &[(FIELD_IS_EXCLUDED, if excluded { "1" } else { "0" }.to_string())],
        )
        .await
    }

    async fn set_domain_seeded(&self, domain: &str, seeded: bool) -> Result<()> {
        let key = crate::store::keys::domain_metadata_key(domain);
        self.hash_set(
            &key,
            &[(FIELD_IS_SEEDED, if seeded { "1" } else { "0" }.to_string())],
        )
        .await
    }

    async fn set_domain_robots(&self, domain: &str, body: &str, expires: i64) -> Result<()> {
        let key = crate::store::keys::domain_metadata_key(domain);
        self.hash_set(
            &key,
            &[
                (FIELD_ROBOTS_TXT, body.to_string()),
                (FIELD_ROBOTS_EXPIRES, expires.to_string()),
            ],
        )
        .await
    }

    async fn set_domain_next_fetch_time(&self, domain: &str, next_fetch_time: i64) -> Result<()> {
        let key = crate::store::keys::domain_metadata_key(domain);
        self.hash_set(
            &key,
            &[(FIELD_NEXT_FETCH_TIME, next_fetch_time.to_string())],
        )
        .await
    }

    async fn set_domain_frontier_offset(&self, domain: &str, offset: u64) -> Result<()> {
        let key = crate::store::keys::domain_metadata_key(domain);
        self.hash_set(&key, &[(FIELD_FRONTIER_OFFSET, offset.to_string())])
            .await
    }
}
