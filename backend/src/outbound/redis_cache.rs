//! Redis-backed [`TodoCache`] adapter.
//!
//! Entries are JSON-encoded [`CachedValue`]s stored with `SET ... EX`. The
//! expiry carries up to ten percent of random jitter so entries written
//! together do not all expire together. Batch tokens are plain counters
//! under `todo:batch:<user>` bumped with `INCR`; they never expire.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::{Pool, PooledConnection};
use bb8_redis::redis;
use rand::Rng;
use tracing::{debug, warn};

use crate::domain::UserId;
use crate::domain::ports::{BatchToken, CachedValue, TodoCache, TodoCacheError, TodoCacheKey};

const BATCH_TOKEN_PREFIX: &str = "todo:batch:";
const JITTER_DIVISOR: u64 = 10;

/// [`TodoCache`] over a pooled Redis connection.
#[derive(Clone)]
pub struct RedisTodoCache {
    pool: Pool<RedisConnectionManager>,
}

impl RedisTodoCache {
    /// Build a pool for `url` and wrap it.
    pub async fn connect(url: &str) -> Result<Self, TodoCacheError> {
        let manager = RedisConnectionManager::new(url)
            .map_err(|err| TodoCacheError::backend(format!("invalid redis url: {err}")))?;
        let pool = Pool::builder()
            .build(manager)
            .await
            .map_err(|err| TodoCacheError::backend(format!("redis pool: {err}")))?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: Pool<RedisConnectionManager>) -> Self {
        Self { pool }
    }

    async fn connection(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, TodoCacheError> {
        self.pool
            .get()
            .await
            .map_err(|err| TodoCacheError::backend(format!("redis checkout: {err}")))
    }
}

fn batch_key(user: UserId) -> String {
    format!("{BATCH_TOKEN_PREFIX}{user}")
}

fn backend(err: redis::RedisError) -> TodoCacheError {
    TodoCacheError::backend(err.to_string())
}

/// Expiry in whole seconds for `ttl`, stretched by up to a tenth of itself.
/// Never shorter than one second.
fn jittered_seconds(ttl: Duration, rng: &mut impl Rng) -> u64 {
    let base = ttl.as_secs().max(1);
    let spread = base / JITTER_DIVISOR;
    base + rng.gen_range(0..=spread)
}

/// Decode a stored entry; undecodable entries read as a miss.
fn decode_entry(key: &TodoCacheKey, raw: &str) -> Option<CachedValue> {
    match serde_json::from_str(raw) {
        Ok(entry) => Some(entry),
        Err(err) => {
            warn!(key = %key, error = %err, "discarding undecodable redis entry");
            None
        }
    }
}

#[async_trait]
impl TodoCache for RedisTodoCache {
    async fn get(&self, key: &TodoCacheKey) -> Result<Option<CachedValue>, TodoCacheError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(key.as_str())
            .query_async(&mut *conn)
            .await
            .map_err(backend)?;
        Ok(raw.and_then(|raw| decode_entry(key, &raw)))
    }

    async fn put(
        &self,
        key: &TodoCacheKey,
        value: &CachedValue,
        ttl: Duration,
    ) -> Result<(), TodoCacheError> {
        let encoded = serde_json::to_string(value)
            .map_err(|err| TodoCacheError::serialization(err.to_string()))?;
        let seconds = jittered_seconds(ttl, &mut rand::thread_rng());
        let mut conn = self.connection().await?;
        redis::cmd("SET")
            .arg(key.as_str())
            .arg(encoded)
            .arg("EX")
            .arg(seconds)
            .query_async::<()>(&mut *conn)
            .await
            .map_err(backend)?;
        debug!(key = %key, seconds, "stored to-do cache entry");
        Ok(())
    }

    async fn batch_token(&self, user: UserId) -> Result<BatchToken, TodoCacheError> {
        let mut conn = self.connection().await?;
        let raw: Option<u64> = redis::cmd("GET")
            .arg(batch_key(user))
            .query_async(&mut *conn)
            .await
            .map_err(backend)?;
        Ok(raw.map(BatchToken::new).unwrap_or_default())
    }

    async fn bump_batch_token(&self, user: UserId) -> Result<BatchToken, TodoCacheError> {
        let mut conn = self.connection().await?;
        let next: u64 = redis::cmd("INCR")
            .arg(batch_key(user))
            .query_async(&mut *conn)
            .await
            .map_err(backend)?;
        Ok(BatchToken::new(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rstest::rstest;

    #[rstest]
    #[case(Duration::from_secs(7_200), 7_200, 7_920)]
    #[case(Duration::from_secs(5), 5, 5)]
    #[case(Duration::from_millis(10), 1, 1)]
    fn jitter_stays_within_a_tenth_of_the_ttl(
        #[case] ttl: Duration,
        #[case] min: u64,
        #[case] max: u64,
    ) {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..64 {
            let seconds = jittered_seconds(ttl, &mut rng);
            assert!((min..=max).contains(&seconds), "{seconds} outside {min}..={max}");
        }
    }

    #[rstest]
    fn stored_entries_decode() {
        let entry = CachedValue {
            batch_token: BatchToken::new(3),
            payload: serde_json::json!([1, 2]),
        };
        let raw = serde_json::to_string(&entry).expect("entry encodes");

        let decoded = decode_entry(&TodoCacheKey::from_digest("ab"), &raw);

        assert_eq!(decoded, Some(entry));
    }

    #[rstest]
    #[case("not json")]
    #[case(r#"{"payload": []}"#)]
    fn undecodable_entries_read_as_a_miss(#[case] raw: &str) {
        assert_eq!(decode_entry(&TodoCacheKey::from_digest("ab"), raw), None);
    }

    #[rstest]
    fn batch_keys_are_namespaced_per_user() {
        assert_eq!(batch_key(UserId::new(12)), "todo:batch:12");
    }
}
