use super::traits::{CoordinationStore, Result, StoreError};
use async_trait::async_trait;
use rand::Rng;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 50;

/// Retries an idempotent store operation with jittered exponential backoff,
/// surfacing an exhausted budget as [`StoreError::Transient`].
async fn retry_idempotent<T, F, Fut>(op: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = redis::RedisResult<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= MAX_RETRIES => {
                return Err(StoreError::Transient(format!("{op} failed: {e}")));
            }
            Err(_) => {
                let jitter_ms = rand::thread_rng().gen_range(0..BASE_BACKOFF_MS);
                let backoff = BASE_BACKOFF_MS * 2u64.pow(attempt) + jitter_ms;
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
        }
    }
}

/// Runs a write once; only retried by the caller when Redis reports the
/// write was not applied (modeled here simply as a single attempt, since
/// every write below is naturally idempotent at the command level: NX
/// flags, HSETNX, and SADD are all safe to repeat).
async fn once<T, F, Fut>(op: &str, f: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = redis::RedisResult<T>>,
{
    f().await
        .map_err(|e| StoreError::Transient(format!("{op} failed: {e}")))
}

/// Redis-backed coordination store client. Cheaply cloneable: `ConnectionManager`
/// auto-reconnects and is safe to share across every fetcher/parser worker.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Unavailable(format!("invalid store url: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Unavailable(format!("store unreachable: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn hash_get_fields(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        let key = key.to_string();
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        retry_idempotent("hash_get_fields", || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            let fields = fields.clone();
            async move { conn.hget(&key, &fields).await }
        })
        .await
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let key = key.to_string();
        retry_idempotent("hash_get_all", || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            async move { conn.hgetall(&key).await }
        })
        .await
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        let pairs: Vec<(String, String)> = fields
            .iter()
            .map(|(f, v)| (f.to_string(), v.clone()))
            .collect();
        let key = key.to_string();
        once("hash_set", || async move {
            let mut conn = self.conn.clone();
            conn.hset_multiple(&key, &pairs).await
        })
        .await
    }

    async fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        let key = key.to_string();
        let field = field.to_string();
        let value = value.to_string();
        once("hash_set_if_absent", || async move {
            let mut conn = self.conn.clone();
            conn.hset_nx(&key, &field, &value).await
        })
        .await
    }

    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let key = key.to_string();
        let field = field.to_string();
        once("hash_increment", || async move {
            let mut conn = self.conn.clone();
            conn.hincr(&key, &field, delta).await
        })
        .await
    }

    async fn hash_delete_field(&self, key: &str, field: &str) -> Result<()> {
        let key = key.to_string();
        let field = field.to_string();
        once("hash_delete_field", || async move {
            let mut conn = self.conn.clone();
            conn.hdel(&key, &field).await
        })
        .await
    }

    async fn sorted_set_add(
        &self,
        key: &str,
        member: &str,
        score: f64,
        only_if_absent: bool,
    ) -> Result<bool> {
        let key = key.to_string();
        let member = member.to_string();
        once("sorted_set_add", || async move {
            let mut conn = self.conn.clone();
            let mut cmd = redis::cmd("ZADD");
            cmd.arg(&key);
            if only_if_absent {
                cmd.arg("NX");
            }
            cmd.arg(score).arg(&member);
            let added: i64 = cmd.query_async(&mut conn).await?;
            Ok(added > 0)
        })
        .await
    }

    async fn sorted_set_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        offset: usize,
        count: usize,
    ) -> Result<Vec<String>> {
        let key = key.to_string();
        retry_idempotent("sorted_set_range_by_score", || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            async move {
                redis::cmd("ZRANGEBYSCORE")
                    .arg(&key)
                    .arg(min)
                    .arg(max)
                    .arg("LIMIT")
                    .arg(offset)
                    .arg(count)
                    .query_async(&mut conn)
                    .await
            }
        })
        .await
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<()> {
        let key = key.to_string();
        let member = member.to_string();
        once("sorted_set_remove", || async move {
            let mut conn = self.conn.clone();
            conn.zrem(&key, &member).await
        })
        .await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let key = key.to_string();
        let member = member.to_string();
        once("set_add", || async move {
            let mut conn = self.conn.clone();
            let added: i64 = conn.sadd(&key, &member).await?;
            Ok(added > 0)
        })
        .await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let key = key.to_string();
        let member = member.to_string();
        once("set_remove", || async move {
            let mut conn = self.conn.clone();
            conn.srem(&key, &member).await
        })
        .await
    }

    async fn list_push_right(&self, key: &str, values: &[String]) -> Result<()> {
        let key = key.to_string();
        let values = values.to_vec();
        once("list_push_right", || async move {
            let mut conn = self.conn.clone();
            conn.rpush(&key, &values).await
        })
        .await
    }

    async fn list_pop_left_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let key = key.to_string();
        once("list_pop_left_blocking", || async move {
            let mut conn = self.conn.clone();
            let result: Option<(String, String)> =
                conn.blpop(&key, timeout.as_secs_f64()).await?;
            Ok(result.map(|(_, value)| value))
        })
        .await
    }

    async fn list_length(&self, key: &str) -> Result<i64> {
        let key = key.to_string();
        retry_idempotent("list_length", || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            async move { conn.llen(&key).await }
        })
        .await
    }

    async fn bloom_reserve(&self, key: &str, fpr: f64, capacity: u64) -> Result<()> {
        let key = key.to_string();
        once("bloom_reserve", || async move {
            let mut conn = self.conn.clone();
            let result: redis::RedisResult<()> = redis::cmd("BF.RESERVE")
                .arg(&key)
                .arg(fpr)
                .arg(capacity)
                .query_async(&mut conn)
                .await;
            // "item exists" means the filter was already reserved by a
            // prior run; that's the expected steady state on resume.
            match result {
                Ok(()) => Ok(()),
                Err(e) if e.to_string().contains("item exists") => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn bloom_add(&self, key: &str, value: &str) -> Result<bool> {
        let key = key.to_string();
        let value = value.to_string();
        once("bloom_add", || async move {
            let mut conn = self.conn.clone();
            let added: i64 = redis::cmd("BF.ADD")
                .arg(&key)
                .arg(&value)
                .query_async(&mut conn)
                .await?;
            Ok(added == 1)
        })
        .await
    }

    async fn bloom_contains(&self, key: &str, value: &str) -> Result<bool> {
        let key = key.to_string();
        let value = value.to_string();
        retry_idempotent("bloom_contains", || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            let value = value.clone();
            async move {
                let exists: i64 = redis::cmd("BF.EXISTS")
                    .arg(&key)
                    .arg(&value)
                    .query_async(&mut conn)
                    .await?;
                Ok(exists == 1)
            }
        })
        .await
    }

    async fn pipeline_update_domain_on_enqueue(
        &self,
        domain: &str,
        file_path: &str,
        bytes_written: u64,
        now: i64,
    ) -> Result<()> {
        let metadata_key = super::keys::domain_metadata_key(domain);
        let ready_key = super::keys::ready_index_key().to_string();
        let domain = domain.to_string();
        let file_path = file_path.to_string();
        once("pipeline_update_domain_on_enqueue", || async move {
            let mut conn = self.conn.clone();
            redis::pipe()
                .atomic()
                .cmd("HSETNX")
                .arg(&metadata_key)
                .arg("file_path")
                .arg(&file_path)
                .ignore()
                .cmd("HSETNX")
                .arg(&metadata_key)
                .arg("frontier_offset")
                .arg(0)
                .ignore()
                .cmd("HINCRBY")
                .arg(&metadata_key)
                .arg("frontier_size")
                .arg(bytes_written as i64)
                .ignore()
                .cmd("ZADD")
                .arg(&ready_key)
                .arg("NX")
                .arg(now)
                .arg(&domain)
                .ignore()
                .query_async(&mut conn)
                .await
        })
        .await
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
