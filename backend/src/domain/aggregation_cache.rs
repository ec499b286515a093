//! Read-through cache around to-do queries.
//!
//! Results are stored under a content-derived [`TodoCacheKey`] together with
//! the user's batch token. A read is a hit only when the entry is present,
//! unexpired (the store enforces the TTL) and carries the user's current
//! token. [`AggregationCache::touch`] bumps the token, so every entry of that
//! user stops matching at once.
//!
//! Concurrent misses may both compute and both store; the cache is
//! at-least-once by construction.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::domain::cache_key::{CacheKeyParts, derive_cache_key};
use crate::domain::ports::{BatchToken, CachedValue, TodoCache, TodoCacheKey};
use crate::domain::{ContextRef, Error, ObjectKind, Purpose, UserId};

/// Description of one cached to-do query.
#[derive(Debug, Clone)]
pub struct CacheRequest<'a> {
    pub user: UserId,
    pub kind: ObjectKind,
    pub purpose: Purpose,
    /// Contexts the query covers.
    pub contexts: &'a [ContextRef],
    /// Every parameter that changes the result.
    pub params: serde_json::Value,
    pub ttl: Duration,
}

impl CacheRequest<'_> {
    fn key(&self, batch_token: BatchToken) -> Result<TodoCacheKey, Error> {
        derive_cache_key(&CacheKeyParts {
            user: self.user,
            kind: self.kind,
            purpose: self.purpose,
            contexts: self.contexts,
            params: &self.params,
            batch_token,
        })
        .map_err(|err| Error::internal(err.to_string()))
    }
}

/// Aggregation cache service.
#[derive(Clone)]
pub struct AggregationCache<C> {
    cache: Arc<C>,
}

impl<C> AggregationCache<C> {
    /// Create a cache service over the given store.
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }
}

impl<C> AggregationCache<C>
where
    C: TodoCache,
{
    /// Return the cached result for `request`, computing and storing it on a
    /// miss. `compute` runs at most once per call.
    ///
    /// Cache store failures propagate to the caller.
    pub async fn fetch_or_compute<T, F, Fut>(
        &self,
        request: CacheRequest<'_>,
        compute: F,
    ) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let batch_token = self.cache.batch_token(request.user).await?;
        let key = request.key(batch_token)?;

        if let Some(entry) = self.cache.get(&key).await? {
            if entry.batch_token == batch_token {
                match serde_json::from_value(entry.payload) {
                    Ok(value) => {
                        debug!(key = %key, "to-do cache hit");
                        return Ok(value);
                    }
                    Err(err) => {
                        warn!(key = %key, error = %err, "discarding undecodable to-do cache entry");
                    }
                }
            }
        }

        debug!(
            key = %key,
            kind = %request.kind,
            purpose = %request.purpose,
            "to-do cache miss"
        );
        let value = compute().await?;
        let payload = serde_json::to_value(&value)
            .map_err(|err| Error::internal(format!("failed to serialise to-do result: {err}")))?;
        self.cache
            .put(
                &key,
                &CachedValue {
                    batch_token,
                    payload,
                },
                request.ttl,
            )
            .await?;
        Ok(value)
    }

    /// Invalidate every cached to-do result of `user`.
    pub async fn touch(&self, user: UserId) -> Result<BatchToken, Error> {
        let token = self.cache.bump_batch_token(user).await?;
        debug!(user = %user, batch_token = %token, "touched to-do batch token");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    //! Hit, miss and failure paths against a mocked cache store.
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{MockTodoCache, TodoCacheError};
    use rstest::rstest;
    use serde_json::json;

    const USER: UserId = UserId::new(7);

    fn request(contexts: &[ContextRef]) -> CacheRequest<'_> {
        CacheRequest {
            user: USER,
            kind: ObjectKind::Assignment,
            purpose: Purpose::Submitting,
            contexts,
            params: json!({"limit": 15}),
            ttl: Duration::from_secs(60),
        }
    }

    fn cache_with_token(token: u64) -> MockTodoCache {
        let mut cache = MockTodoCache::new();
        cache
            .expect_batch_token()
            .returning(move |_| Ok(BatchToken::new(token)));
        cache
    }

    #[rstest]
    #[tokio::test]
    async fn hit_skips_compute() {
        let mut cache = cache_with_token(3);
        cache.expect_get().times(1).returning(|_| {
            Ok(Some(CachedValue {
                batch_token: BatchToken::new(3),
                payload: json!([1, 2]),
            }))
        });
        cache.expect_put().never();
        let service = AggregationCache::new(Arc::new(cache));

        let value: Vec<u32> = service
            .fetch_or_compute(request(&[]), || async {
                Err(Error::internal("compute must not run on a hit"))
            })
            .await
            .expect("cached value");

        assert_eq!(value, vec![1, 2]);
    }

    #[rstest]
    #[tokio::test]
    async fn miss_computes_once_and_stores_with_token() {
        let mut cache = cache_with_token(5);
        cache.expect_get().returning(|_| Ok(None));
        cache
            .expect_put()
            .times(1)
            .withf(|key, value, ttl| {
                key.as_str().starts_with("todo:v1:")
                    && value.batch_token == BatchToken::new(5)
                    && value.payload == json!([9])
                    && *ttl == Duration::from_secs(60)
            })
            .returning(|_, _, _| Ok(()));
        let service = AggregationCache::new(Arc::new(cache));
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let value: Vec<u32> = service
            .fetch_or_compute(request(&[]), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![9])
            })
            .await
            .expect("computed value");

        assert_eq!(value, vec![9]);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn stale_batch_token_recomputes() {
        let mut cache = cache_with_token(2);
        cache.expect_get().returning(|_| {
            Ok(Some(CachedValue {
                batch_token: BatchToken::new(1),
                payload: json!([1]),
            }))
        });
        cache.expect_put().times(1).returning(|_, _, _| Ok(()));
        let service = AggregationCache::new(Arc::new(cache));

        let value: Vec<u32> = service
            .fetch_or_compute(request(&[]), || async { Ok(vec![2]) })
            .await
            .expect("recomputed value");

        assert_eq!(value, vec![2]);
    }

    #[rstest]
    #[tokio::test]
    async fn cache_failures_propagate() {
        let mut cache = cache_with_token(0);
        cache
            .expect_get()
            .returning(|_| Err(TodoCacheError::backend("connection reset")));
        let service = AggregationCache::new(Arc::new(cache));

        let err = service
            .fetch_or_compute::<Vec<u32>, _, _>(request(&[]), || async { Ok(vec![]) })
            .await
            .expect_err("backend failure surfaces");

        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    }

    #[rstest]
    #[tokio::test]
    async fn touch_bumps_the_batch_token() {
        let mut cache = MockTodoCache::new();
        cache
            .expect_bump_batch_token()
            .times(1)
            .returning(|_| Ok(BatchToken::new(4)));
        let service = AggregationCache::new(Arc::new(cache));

        let token = service.touch(USER).await.expect("token bumped");

        assert_eq!(token, BatchToken::new(4));
    }
}
