//! Coordination store client: the typed capability surface the rest of the
//! crawler uses to talk to shared crawl state, plus the two implementations
//! (Redis in production, an in-memory double in tests) and the content-hash
//! key layout they share.

pub mod keys;
mod memory_store;
mod redis_store;
mod traits;

pub use keys::{
    active_set_key, content_relative_path, domain_metadata_key, frontier_relative_path,
    parse_queue_key, ready_index_key, stats_key, url_hash_prefix, visited_bloom_key,
    visited_record_key,
};
pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use traits::{CoordinationStore, DomainMetadata, Result, StoreError};
