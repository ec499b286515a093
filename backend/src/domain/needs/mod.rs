//! Needs-queries: learning objects that need a user's attention.
//!
//! Each query resolves its scope, fans out over the shards that scope
//! touches, filters the rows each shard returns and fans the results back in
//! ascending shard order before sorting. Materialised results go through the
//! [`AggregationCache`]; the `*_scope` variants skip the cache and return a
//! lazy [`NeedsScope`] instead.
//!
//! Filters that need several tables, or a permission check that cannot be
//! pushed into the store, run in memory after the bounded store query.

mod assignments;
mod moderation;
mod options;
mod peer_reviews;
mod quizzes;
mod viewables;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, TryFutureExt, try_join_all};
use mockable::Clock;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::aggregation_cache::{AggregationCache, CacheRequest};
use crate::domain::ports::{LearningObjectStore, MembershipDirectory, PermissionEngine, TodoCache};
use crate::domain::{
    Error, ObjectKind, Purpose, ResolvedScope, ScopeResolver, ShardId, ShardPartition, Sharded,
    UserId,
};

pub use assignments::{AssignmentKind, AssignmentTodo};
pub use options::{DEFAULT_LIMIT, NeedsOptions, QuizOptions, SubmittingOptions};
pub use peer_reviews::PeerReviewTodo;
pub use quizzes::QuizTodo;

/// Default lifetime of a cached needs-query result.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(120 * 60);

/// Operational settings of the needs-queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeedsConfig {
    /// Kill switch: grading queries return nothing without touching the store.
    pub disable_grading_queries: bool,
    pub cache_ttl: Duration,
}

impl Default for NeedsConfig {
    fn default() -> Self {
        Self {
            disable_grading_queries: false,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// Ordering key of a to-do item: due date falling back to the last update,
/// then id.
pub trait TodoOrder {
    fn sort_key(&self) -> (DateTime<Utc>, i64);
}

/// Sort items ascending by [`TodoOrder::sort_key`].
pub fn sort_todos<T: TodoOrder>(items: &mut [T]) {
    items.sort_by_key(TodoOrder::sort_key);
}

/// A needs-query that has not run yet.
///
/// Nothing touches the store until [`load`](Self::load) or
/// [`exists`](Self::exists) is awaited. [`filter`](Self::filter) composes an
/// in-memory predicate, which is how callers add checks the store cannot
/// express.
pub struct NeedsScope<'a, T> {
    query: BoxFuture<'a, Result<Vec<T>, Error>>,
}

impl<'a, T> NeedsScope<'a, T>
where
    T: Send + 'a,
{
    pub(crate) fn new(query: impl Future<Output = Result<Vec<T>, Error>> + Send + 'a) -> Self {
        Self {
            query: query.boxed(),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(async { Ok(Vec::new()) })
    }

    /// Keep only the items matching `keep`.
    pub fn filter<F>(self, mut keep: F) -> Self
    where
        F: FnMut(&T) -> bool + Send + 'a,
    {
        let query = self.query;
        Self::new(async move {
            let mut items = query.await?;
            items.retain(|item| keep(item));
            Ok(items)
        })
    }

    /// Run the query, optionally truncating the result.
    pub async fn load(self, limit: Option<usize>) -> Result<Vec<T>, Error> {
        let mut items = self.query.await?;
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    /// Whether the query matches anything.
    pub async fn exists(self) -> Result<bool, Error> {
        Ok(!self.query.await?.is_empty())
    }
}

/// Builds and runs the needs-queries for one deployment.
pub struct NeedsQueryBuilder<S, D, P, C> {
    store: Arc<S>,
    scopes: ScopeResolver<D, P>,
    permissions: Arc<P>,
    cache: AggregationCache<C>,
    clock: Arc<dyn Clock + Send + Sync>,
    config: NeedsConfig,
}

impl<S, D, P, C> NeedsQueryBuilder<S, D, P, C> {
    /// Create a builder over the given ports.
    pub fn new(
        store: Arc<S>,
        directory: Arc<D>,
        permissions: Arc<P>,
        cache: Arc<C>,
        clock: Arc<dyn Clock + Send + Sync>,
        config: NeedsConfig,
    ) -> Self {
        Self {
            store,
            scopes: ScopeResolver::new(directory, Arc::clone(&permissions)),
            permissions,
            cache: AggregationCache::new(cache),
            clock,
            config,
        }
    }

    /// Operational settings in force.
    pub fn config(&self) -> NeedsConfig {
        self.config
    }

    /// Cache service used for materialised results.
    pub fn cache(&self) -> &AggregationCache<C> {
        &self.cache
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn permissions(&self) -> &P {
        &self.permissions
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }
}

impl<S, D, P, C> NeedsQueryBuilder<S, D, P, C>
where
    S: LearningObjectStore,
    D: MembershipDirectory,
    P: PermissionEngine,
    C: TodoCache,
{
    /// Global ids of the `kind` objects `user` ignored for `purpose`; empty
    /// when the options keep ignored objects.
    async fn ignored(
        &self,
        user: UserId,
        kind: ObjectKind,
        purpose: Purpose,
        options: &NeedsOptions,
    ) -> Result<BTreeSet<i64>, Error> {
        if options.include_ignored {
            return Ok(BTreeSet::new());
        }
        let rows = self.store.ignores(user.shard(), user, purpose).await?;
        Ok(rows
            .into_iter()
            .filter(|row| row.asset.kind == kind)
            .map(|row| row.asset.id)
            .collect())
    }

    /// Run `compute` behind the aggregation cache, keyed on the resolved
    /// scope and `params`.
    async fn cached<T, F, Fut>(
        &self,
        user: UserId,
        kind: ObjectKind,
        purpose: Purpose,
        scope: &ResolvedScope,
        params: serde_json::Value,
        compute: F,
    ) -> Result<Vec<T>, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, Error>>,
    {
        let contexts = scope.contexts();
        let request = CacheRequest {
            user,
            kind,
            purpose,
            contexts: &contexts,
            params,
            ttl: self.config.cache_ttl,
        };
        self.cache.fetch_or_compute(request, compute).await
    }
}

/// Run `query` once per shard of `partition`, concurrently, and concatenate
/// the results in ascending shard order.
async fn fan_out<'a, I, T, F, Fut>(
    partition: &'a ShardPartition<I>,
    mut query: F,
) -> Result<Vec<T>, Error>
where
    I: Sharded + Ord + Copy,
    F: FnMut(ShardId, &'a [I]) -> Fut,
    Fut: Future<Output = Result<Vec<T>, Error>>,
{
    let pending: Vec<_> = partition
        .iter()
        .map(|(shard, ids)| query(shard, ids).map_err(move |err| err.on_shard(shard)))
        .collect();
    let per_shard = try_join_all(pending).await?;
    Ok(per_shard.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests;
