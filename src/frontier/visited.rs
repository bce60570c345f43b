use crate::store::{visited_bloom_key, CoordinationStore};
use crate::CrawlError;
use dashmap::DashSet;
use std::sync::Arc;

/// Fast, memory-bounded "have we seen this URL" check, backed by the
/// coordination store's bloom filter and short-circuited in-process by a
/// small cache of URLs this process itself just inserted.
pub struct VisitedSet {
    store: Arc<dyn CoordinationStore>,
    recent: DashSet<String>,
}

impl VisitedSet {
    /// Reserves the bloom filter (idempotent across restarts: a reservation
    /// that already exists in the store is a no-op).
    pub async fn reserve(
        store: Arc<dyn CoordinationStore>,
        fpr: f64,
        capacity: u64,
    ) -> Result<Self, CrawlError> {
        store.bloom_reserve(visited_bloom_key(), fpr, capacity).await?;
        Ok(Self {
            store,
            recent: DashSet::new(),
        })
    }

    pub async fn contains(&self, url: &str) -> Result<bool, CrawlError> {
        if self.recent.contains(url) {
            return Ok(true);
        }
        Ok(self.store.bloom_contains(visited_bloom_key(), url).await?)
    }

    /// Idempotent: inserting an already-present URL is a no-op.
    pub async fn add(&self, url: &str) -> Result<(), CrawlError> {
        self.store.bloom_add(visited_bloom_key(), url).await?;
        self.recent.insert(url.to_string());
        // Keep the in-process cache bounded; the store's bloom filter is
        // the durable source of truth, this is purely a short-circuit.
        if self.recent.len() > 10_000 {
            self.recent.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_add_then_contains() {
        let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
        let visited = VisitedSet::reserve(store, 0.001, 1000).await.unwrap();
        assert!(!visited.contains("https://example.com/").await.unwrap());
        visited.add("https://example.com/").await.unwrap();
        assert!(visited.contains("https://example.com/").await.unwrap());
    }

    #[tokio::test]
    async fn test_unrelated_url_not_contained() {
        let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
        let visited = VisitedSet::reserve(store, 0.001, 1000).await.unwrap();
        visited.add("https://example.com/a").await.unwrap();
        assert!(!visited.contains("https://example.com/b").await.unwrap());
    }
}
