//! Port for the permission engine the to-do lists consult.
//!
//! Denials are not errors: an engine answers `false` and the item is simply
//! left off the list. Errors mean the engine could not answer at all.
use async_trait::async_trait;

use crate::domain::{ContextRef, Permission, PermissionMatrix, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by permission engine adapters.
    pub enum PermissionEngineError {
        /// Backing policy store could not be reached.
        Unavailable { message: String } => "permission engine unavailable: {message}",
    }
    unavailable: [Unavailable]
}

/// Authorisation checks for an acting user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionEngine: Send + Sync {
    /// Whether `actor` holds `permission` on `context`.
    async fn grants_right(
        &self,
        actor: UserId,
        context: ContextRef,
        permission: Permission,
    ) -> Result<bool, PermissionEngineError>;

    /// Answer every `(context, permission)` pair in one round trip.
    async fn precalculate_permissions(
        &self,
        actor: UserId,
        contexts: &[ContextRef],
        permissions: &[Permission],
    ) -> Result<PermissionMatrix, PermissionEngineError>;
}
