//! Ignore lifecycle: recording ignores and clearing them when the ignored
//! condition changes.
//!
//! Every mutation touches the affected users' batch tokens so their cached
//! to-do lists are recomputed on the next read.

use std::sync::Arc;

use tracing::info;

use crate::domain::aggregation_cache::AggregationCache;
use crate::domain::ports::{IgnoreRepository, TodoCache};
use crate::domain::{AssetRef, Error, IgnoreRow, Purpose, UserId};

/// Writes ignore rows and invalidates cached lists.
#[derive(Clone)]
pub struct IgnoreLedger<R, C> {
    repository: Arc<R>,
    cache: AggregationCache<C>,
}

impl<R, C> IgnoreLedger<R, C> {
    /// Create a ledger over the repository and cache store.
    pub fn new(repository: Arc<R>, cache: Arc<C>) -> Self {
        Self {
            repository,
            cache: AggregationCache::new(cache),
        }
    }
}

impl<R, C> IgnoreLedger<R, C>
where
    R: IgnoreRepository,
    C: TodoCache,
{
    /// Record that `user` ignores `asset` on the `purpose` list. Replaces an
    /// existing ignore of the same asset and purpose.
    pub async fn ignore(
        &self,
        user: UserId,
        asset: AssetRef,
        purpose: Purpose,
        permanent: bool,
    ) -> Result<IgnoreRow, Error> {
        let row = IgnoreRow {
            user_id: user,
            asset,
            purpose,
            permanent,
        };
        self.repository.upsert(&row).await?;
        self.cache.touch(user).await?;
        info!(
            user = %user,
            kind = %asset.kind,
            asset = asset.id,
            purpose = %purpose,
            permanent,
            "recorded to-do ignore"
        );
        Ok(row)
    }

    /// Drop non-permanent ignores of `asset` for `purpose` after the ignored
    /// condition changed, for example when a new submission arrives.
    /// Returns the users whose ignores were removed.
    pub async fn clear_on_change(
        &self,
        asset: AssetRef,
        purpose: Purpose,
    ) -> Result<Vec<UserId>, Error> {
        let users = self.repository.delete_transient(asset, purpose).await?;
        for user in &users {
            self.cache.touch(*user).await?;
        }
        if !users.is_empty() {
            info!(
                kind = %asset.kind,
                asset = asset.id,
                purpose = %purpose,
                cleared = users.len(),
                "cleared to-do ignores"
            );
        }
        Ok(users)
    }
}
