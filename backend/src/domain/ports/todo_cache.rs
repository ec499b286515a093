//! Port interface for caching aggregated to-do results.
//!
//! Entries are tagged with the owning user's batch token. Bumping the token
//! orphans every entry written under the previous one, which is how a user's
//! whole to-do cache is invalidated without enumerating keys.
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::UserId;

use super::{TodoCacheKey, define_port_error};

define_port_error! {
    /// Errors surfaced by the caching adapter.
    pub enum TodoCacheError {
        /// Cache backend is unavailable or timing out.
        Backend { message: String } => "todo cache backend failure: {message}",
        /// Serialisation or deserialisation of cached content failed.
        Serialization { message: String } => "todo cache serialisation failed: {message}",
    }
    unavailable: [Backend]
}

/// Invalidation tag shared by all cached entries of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchToken(u64);

impl BatchToken {
    /// Wrap a raw token value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw token value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The token following this one.
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for BatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value stored under a [`TodoCacheKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedValue {
    /// Batch token current when the value was computed.
    pub batch_token: BatchToken,
    /// Serialised result.
    pub payload: serde_json::Value,
}

/// Cache port for aggregated to-do results.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TodoCache: Send + Sync {
    /// Read an unexpired entry.
    async fn get(&self, key: &TodoCacheKey) -> Result<Option<CachedValue>, TodoCacheError>;

    /// Store an entry that expires after `ttl`.
    async fn put(
        &self,
        key: &TodoCacheKey,
        value: &CachedValue,
        ttl: Duration,
    ) -> Result<(), TodoCacheError>;

    /// Current batch token of `user`.
    async fn batch_token(&self, user: UserId) -> Result<BatchToken, TodoCacheError>;

    /// Replace the batch token of `user`, returning the new token.
    async fn bump_batch_token(&self, user: UserId) -> Result<BatchToken, TodoCacheError>;
}
