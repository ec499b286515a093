//! Process-local to-do cache with clock-driven expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;

use crate::domain::UserId;
use crate::domain::ports::{BatchToken, CachedValue, TodoCache, TodoCacheError, TodoCacheKey};

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, (CachedValue, DateTime<Utc>)>,
    tokens: HashMap<UserId, BatchToken>,
}

/// [`TodoCache`] held in process memory.
///
/// Expiry is evaluated against the injected clock on read, so tests can step
/// past a TTL without sleeping.
pub struct InMemoryTodoCache {
    state: Mutex<CacheState>,
    clock: Arc<dyn Clock + Send + Sync>,
    writes: AtomicUsize,
}

impl InMemoryTodoCache {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            clock,
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of entries written so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn state(&self) -> Result<MutexGuard<'_, CacheState>, TodoCacheError> {
        self.state
            .lock()
            .map_err(|_| TodoCacheError::backend("cache state poisoned"))
    }
}

#[async_trait]
impl TodoCache for InMemoryTodoCache {
    async fn get(&self, key: &TodoCacheKey) -> Result<Option<CachedValue>, TodoCacheError> {
        let now = self.clock.utc();
        let mut state = self.state()?;
        let fresh = state
            .entries
            .get(key.as_str())
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone());
        if fresh.is_none() {
            state.entries.remove(key.as_str());
        }
        Ok(fresh)
    }

    async fn put(
        &self,
        key: &TodoCacheKey,
        value: &CachedValue,
        ttl: Duration,
    ) -> Result<(), TodoCacheError> {
        let ttl = TimeDelta::from_std(ttl)
            .map_err(|err| TodoCacheError::serialization(format!("ttl out of range: {err}")))?;
        let expires_at = self.clock.utc() + ttl;
        self.state()?
            .entries
            .insert(key.as_str().to_owned(), (value.clone(), expires_at));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn batch_token(&self, user: UserId) -> Result<BatchToken, TodoCacheError> {
        Ok(self
            .state()?
            .tokens
            .get(&user)
            .copied()
            .unwrap_or_default())
    }

    async fn bump_batch_token(&self, user: UserId) -> Result<BatchToken, TodoCacheError> {
        let mut state = self.state()?;
        let token = state.tokens.entry(user).or_default();
        *token = token.next();
        Ok(*token)
    }
}
