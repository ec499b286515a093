//! Port listing the courses and groups a user belongs to.
use async_trait::async_trait;

use crate::domain::{CourseMembership, GroupId, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by membership directory adapters.
    pub enum MembershipDirectoryError {
        /// Directory backend could not be reached.
        Connection { message: String } => "membership directory connection failed: {message}",
        /// Lookup failed during execution.
        Query { message: String } => "membership directory query failed: {message}",
    }
    unavailable: [Connection]
}

/// Memberships of a user across every shard.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Every course membership of `user`, including concluded ones.
    async fn course_memberships(
        &self,
        user: UserId,
    ) -> Result<Vec<CourseMembership>, MembershipDirectoryError>;

    /// Groups `user` is an active member of.
    async fn group_ids(&self, user: UserId) -> Result<Vec<GroupId>, MembershipDirectoryError>;
}
