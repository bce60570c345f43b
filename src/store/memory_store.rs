use super::traits::{CoordinationStore, Result};
use async_trait::async_trait;
use bloomfilter::Bloom;
use dashmap::{DashMap, DashSet};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

struct SortedSet {
    scores: HashMap<String, f64>,
}

impl SortedSet {
    fn new() -> Self {
        Self {
            scores: HashMap::new(),
        }
    }
}

struct ListState {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl ListState {
    fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

/// In-memory [`CoordinationStore`] double used by integration tests in place
/// of a real Redis instance. Not a performance-oriented implementation:
/// sorted-set range queries are linear scans, which is fine at test scale.
pub struct MemoryStore {
    hashes: DashMap<String, HashMap<String, String>>,
    sorted_sets: DashMap<String, Mutex<SortedSet>>,
    sets: DashMap<String, DashSet<String>>,
    lists: DashMap<String, std::sync::Arc<ListState>>,
    blooms: DashMap<String, Mutex<Bloom<String>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            hashes: DashMap::new(),
            sorted_sets: DashMap::new(),
            sets: DashMap::new(),
            lists: DashMap::new(),
            blooms: DashMap::new(),
        }
    }

    fn list_handle(&self, key: &str) -> std::sync::Arc<ListState> {
        self.lists
            .entry(key.to_string())
            .or_insert_with(|| std::sync::Arc::new(ListState::new()))
            .clone()
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn hash_get_fields(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        let map = self.hashes.get(key);
        Ok(fields
            .iter()
            .map(|f| map.as_ref().and_then(|m| m.get(*f).cloned()))
            .collect())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        Ok(self.hashes.get(key).map(|m| m.clone()).unwrap_or_default())
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        let mut entry = self.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            entry.insert((*field).to_string(), value.clone());
        }
        Ok(())
    }

    async fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        let mut entry = self.hashes.entry(key.to_string()).or_default();
        if entry.contains_key(field) {
            Ok(false)
        } else {
            entry.insert(field.to_string(), value.to_string());
            Ok(true)
        }
    }

    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut entry = self.hashes.entry(key.to_string()).or_default();
        let current: i64 = entry
            .get(field)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let next = current + delta;
        entry.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    async fn hash_delete_field(&self, key: &str, field: &str) -> Result<()> {
        if let Some(mut entry) = self.hashes.get_mut(key) {
            entry.remove(field);
        }
        Ok(())
    }

    async fn sorted_set_add(
        &self,
        key: &str,
        member: &str,
        score: f64,
        only_if_absent: bool,
    ) -> Result<bool> {
        let entry = self
            .sorted_sets
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(SortedSet::new()));
        let mut set = entry.lock().unwrap();
        if only_if_absent && set.scores.contains_key(member) {
            return Ok(false);
        }
        let is_new = !set.scores.contains_key(member);
        set.scores.insert(member.to_string(), score);
        Ok(is_new)
    }

    async fn sorted_set_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        offset: usize,
        count: usize,
    ) -> Result<Vec<String>> {
        let Some(entry) = self.sorted_sets.get(key) else {
            return Ok(Vec::new());
        };
        let set = entry.lock().unwrap();
        let mut matches: Vec<(&String, &f64)> = set
            .scores
            .iter()
            .filter(|(_, &score)| score >= min && score <= max)
            .collect();
        matches.sort_by(|a, b| a.1.partial_cmp(b.1).unwrap());
        Ok(matches
            .into_iter()
            .skip(offset)
            .take(count)
            .map(|(member, _)| member.clone())
            .collect())
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<()> {
        if let Some(entry) = self.sorted_sets.get(key) {
            entry.lock().unwrap().scores.remove(member);
        }
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let set = self.sets.entry(key.to_string()).or_default();
        Ok(set.insert(member.to_string()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        if let Some(set) = self.sets.get(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn list_push_right(&self, key: &str, values: &[String]) -> Result<()> {
        let handle = self.list_handle(key);
        {
            let mut items = handle.items.lock().unwrap();
            items.extend(values.iter().cloned());
        }
        handle.notify.notify_waiters();
        Ok(())
    }

    async fn list_pop_left_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let handle = self.list_handle(key);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(value) = handle.items.lock().unwrap().pop_front() {
                return Ok(Some(value));
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            tokio::select! {
                _ = handle.notify.notified() => {}
                _ = tokio::time::sleep(remaining) => return Ok(None),
            }
        }
    }

    async fn list_length(&self, key: &str) -> Result<i64> {
        Ok(self
            .lists
            .get(key)
            .map(|h| h.items.lock().unwrap().len() as i64)
            .unwrap_or(0))
    }

    async fn bloom_reserve(&self, key: &str, fpr: f64, capacity: u64) -> Result<()> {
        self.blooms
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(Bloom::new_for_fp_rate(capacity as usize, fpr)));
        Ok(())
    }

    async fn bloom_add(&self, key: &str, value: &str) -> Result<bool> {
        let entry = self
            .blooms
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(Bloom::new_for_fp_rate(100_000, 0.001)));
        let mut bloom = entry.lock().unwrap();
        let already_present = bloom.check_and_set(&value.to_string());
        Ok(!already_present)
    }

    async fn bloom_contains(&self, key: &str, value: &str) -> Result<bool> {
        Ok(self
            .blooms
            .get(key)
            .map(|b| b.lock().unwrap().check(&value.to_string()))
            .unwrap_or(false))
    }

    async fn pipeline_update_domain_on_enqueue(
        &self,
        domain: &str,
        file_path: &str,
        bytes_written: u64,
        now: i64,
    ) -> Result<()> {
        let metadata_key = super::keys::domain_metadata_key(domain);
        self.hash_set_if_absent(&metadata_key, "file_path", file_path)
            .await?;
        self.hash_set_if_absent(&metadata_key, "frontier_offset", "0")
            .await?;
        self.hash_increment(&metadata_key, "frontier_size", bytes_written as i64)
            .await?;
        self.sorted_set_add(super::keys::ready_index_key(), domain, now as f64, true)
            .await?;
        Ok(())
    }

    async fn claim_domain(&self, domain: &str, now: i64) -> Result<bool> {
        self.hash_set_if_absent(super::keys::active_set_key(), domain, &now.to_string())
            .await
    }

    async fn release_domain(&self, domain: &str) -> Result<()> {
        self.hash_delete_field(super::keys::active_set_key(), domain)
            .await
    }

    async fn sweep_stale_claims(&self, now: i64, max_age_secs: i64) -> Result<Vec<String>> {
        let claims = self.hash_get_all(super::keys::active_set_key()).await?;
        let mut stale = Vec::new();
        for (domain, claimed_at) in claims {
            let claimed_at: i64 = claimed_at.parse().unwrap_or(0);
            if now - claimed_at > max_age_secs {
                self.release_domain(&domain).await?;
                stale.push(domain);
            }
        }
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_set_if_absent_only_sets_once() {
        let store = MemoryStore::new();
        assert!(store.hash_set_if_absent("k", "f", "1").await.unwrap());
        assert!(!store.hash_set_if_absent("k", "f", "2").await.unwrap());
        let values = store.hash_get_fields("k", &["f"]).await.unwrap();
        assert_eq!(values[0], Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_sorted_set_range_by_score_orders_ascending() {
        let store = MemoryStore::new();
        store.sorted_set_add("z", "b", 2.0, false).await.unwrap();
        store.sorted_set_add("z", "a", 1.0, false).await.unwrap();
        let range = store
            .sorted_set_range_by_score("z", 0.0, 10.0, 0, 10)
            .await
            .unwrap();
        assert_eq!(range, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_list_push_then_blocking_pop() {
        let store = MemoryStore::new();
        store
            .list_push_right("q", &["x".to_string()])
            .await
            .unwrap();
        let popped = store
            .list_pop_left_blocking("q", Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(popped, Some("x".to_string()));
    }

    #[tokio::test]
    async fn test_blocking_pop_times_out_on_empty_list() {
        let store = MemoryStore::new();
        let popped = store
            .list_pop_left_blocking("empty", Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(popped, None);
    }

    #[tokio::test]
    async fn test_bloom_add_reports_first_insertion_only() {
        let store = MemoryStore::new();
        store.bloom_reserve("b", 0.001, 1000).await.unwrap();
        assert!(store.bloom_add("b", "url-1").await.unwrap());
        assert!(!store.bloom_add("b", "url-1").await.unwrap());
        assert!(store.bloom_contains("b", "url-1").await.unwrap());
        assert!(!store.bloom_contains("b", "url-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_and_release_domain() {
        let store = MemoryStore::new();
        assert!(store.claim_domain("example.com", 100).await.unwrap());
        assert!(!store.claim_domain("example.com", 200).await.unwrap());
        store.release_domain("example.com").await.unwrap();
        assert!(store.claim_domain("example.com", 300).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_stale_claims_releases_old_entries() {
        let store = MemoryStore::new();
        store.claim_domain("stale.com", 0).await.unwrap();
        store.claim_domain("fresh.com", 1000).await.unwrap();
        let stale = store.sweep_stale_claims(1000, 500).await.unwrap();
        assert_eq!(stale, vec!["stale.com".to_string()]);
        assert!(store.claim_domain("stale.com", 1000).await.unwrap());
    }
}
