//! Port for writing ignore rows.
use async_trait::async_trait;

use crate::domain::{AssetRef, IgnoreRow, Purpose, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by ignore repository adapters.
    pub enum IgnoreRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "ignore repository connection failed: {message}",
        /// Mutation failed during execution.
        Write { message: String } => "ignore repository write failed: {message}",
    }
    unavailable: [Connection]
}

/// Write access to ignore rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IgnoreRepository: Send + Sync {
    /// Insert the row or replace the one with the same `(user, asset, purpose)`.
    async fn upsert(&self, row: &IgnoreRow) -> Result<(), IgnoreRepositoryError>;

    /// Delete non-permanent ignores of `asset` for `purpose`, returning the
    /// users whose ignores were removed.
    async fn delete_transient(
        &self,
        asset: AssetRef,
        purpose: Purpose,
    ) -> Result<Vec<UserId>, IgnoreRepositoryError>;
}
