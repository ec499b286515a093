//! Domain ports defining the edges of the hexagon.
//!
//! Ports describe how the to-do domain reaches its collaborators: the
//! sharded learning object store, the membership directory, the permission
//! engine, the result cache and the ignore ledger. Each trait exposes a
//! strongly typed error generated by `define_port_error!`.

mod macros;
pub(crate) use macros::define_port_error;

mod cache_key;
mod ignore_repository;
mod learning_object_store;
mod membership_directory;
mod permission_engine;
mod todo_cache;

pub use cache_key::{TODO_CACHE_KEY_PREFIX, TodoCacheKey, TodoCacheKeyValidationError};
#[cfg(test)]
pub use ignore_repository::MockIgnoreRepository;
pub use ignore_repository::{IgnoreRepository, IgnoreRepositoryError};
#[cfg(test)]
pub use learning_object_store::MockLearningObjectStore;
pub use learning_object_store::{
    AssessmentRequestQuery, AssignmentQuery, EnrollmentQuery, LearningObjectStore,
    LearningStoreError, SubmissionQuery,
};
#[cfg(test)]
pub use membership_directory::MockMembershipDirectory;
pub use membership_directory::{MembershipDirectory, MembershipDirectoryError};
#[cfg(test)]
pub use permission_engine::MockPermissionEngine;
pub use permission_engine::{PermissionEngine, PermissionEngineError};
#[cfg(test)]
pub use todo_cache::MockTodoCache;
pub use todo_cache::{BatchToken, CachedValue, TodoCache, TodoCacheError};
