//! User-scoped suppression of learning objects from to-do lists.

use serde::{Deserialize, Serialize};

use super::ids::UserId;
use super::purpose::{ObjectKind, Purpose};

/// Learning object referenced by kind and global id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    /// Object kind.
    pub kind: ObjectKind,
    /// Global id of the object.
    pub id: i64,
}

impl AssetRef {
    /// Build an asset reference.
    pub const fn new(kind: ObjectKind, id: i64) -> Self {
        Self { kind, id }
    }
}

/// An ignore row; unique per `(user_id, asset, purpose)`.
///
/// Non-permanent ignores are cleared when the underlying condition changes
/// (for example a new submission arrives). Permanent ignores stay until the
/// user removes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRow {
    /// Ignoring user.
    pub user_id: UserId,
    /// Ignored object.
    pub asset: AssetRef,
    /// List the object is ignored on.
    pub purpose: Purpose,
    /// Survives condition changes.
    #[serde(default)]
    pub permanent: bool,
}

impl IgnoreRow {
    /// Whether this row has the same identity as `other`.
    pub fn same_identity(&self, other: &Self) -> bool {
        self.user_id == other.user_id && self.asset == other.asset && self.purpose == other.purpose
    }
}
