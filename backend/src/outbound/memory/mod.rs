//! In-memory adapters for every port.
//!
//! Used by the snapshot CLI and by behaviour tests. They implement the same
//! shard boundaries and expiry rules as the production adapters would.

mod cache;
mod permissions;
mod store;

pub use cache::InMemoryTodoCache;
pub use permissions::{PermissionGrant, StaticPermissionEngine};
pub use store::{InMemoryLearningStore, LearningTables, UserMemberships};
