//! Global record identifiers and the shards that own them.
//!
//! Every record id is a global 64-bit id. The shard holding a record is
//! encoded in the id itself: `shard = id / IDS_PER_SHARD`. Queries for a
//! record must run against that shard, so every identifier exposes
//! [`shard`](CourseId::shard).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of local ids reserved for each shard.
pub const IDS_PER_SHARD: i64 = 10_000_000_000_000;

/// Anything that lives on exactly one shard.
pub trait Sharded {
    /// Shard owning the record.
    fn shard(&self) -> ShardId;
}

/// Database partition owning a subset of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(u32);

impl ShardId {
    /// Construct a shard identifier.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Shard owning the given global id.
    ///
    /// ```
    /// use todo_backend::domain::ShardId;
    ///
    /// assert_eq!(ShardId::of(42), ShardId::new(0));
    /// assert_eq!(ShardId::of(20_000_000_000_007), ShardId::new(2));
    /// ```
    pub fn of(global_id: i64) -> Self {
        let shard = global_id.max(0) / IDS_PER_SHARD;
        Self(u32::try_from(shard).unwrap_or(u32::MAX))
    }

    /// Raw shard number.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Build the global id for `local_id` on this shard.
    pub fn global_id(self, local_id: i64) -> i64 {
        i64::from(self.0) * IDS_PER_SHARD + local_id
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard-{}", self.0)
    }
}

macro_rules! global_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a global id.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Raw global id.
            pub const fn get(self) -> i64 {
                self.0
            }

            /// Shard owning this record.
            pub fn shard(self) -> ShardId {
                ShardId::of(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl Sharded for $name {
            fn shard(&self) -> ShardId {
                ShardId::of(self.0)
            }
        }
    };
}

global_id!(
    /// User identifier.
    UserId
);
global_id!(
    /// Account identifier; accounts own courses and carry feature flags.
    AccountId
);
global_id!(
    /// Course identifier.
    CourseId
);
global_id!(
    /// Group identifier.
    GroupId
);
global_id!(
    /// Course section identifier.
    SectionId
);
global_id!(
    /// Assignment (or sub-assignment) identifier.
    AssignmentId
);
global_id!(
    /// Submission identifier.
    SubmissionId
);
global_id!(
    /// Quiz identifier.
    QuizId
);
global_id!(
    /// Discussion topic identifier.
    DiscussionTopicId
);
global_id!(
    /// Wiki page identifier.
    WikiPageId
);
global_id!(
    /// Peer review (assessment request) identifier.
    AssessmentRequestId
);

/// Context owning learning objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ContextRef {
    /// A course.
    Course(CourseId),
    /// A group.
    Group(GroupId),
}

impl ContextRef {
    /// Shard owning the context record.
    pub fn shard(self) -> ShardId {
        match self {
            Self::Course(id) => id.shard(),
            Self::Group(id) => id.shard(),
        }
    }

    /// Course id when this context is a course.
    pub fn as_course(self) -> Option<CourseId> {
        match self {
            Self::Course(id) => Some(id),
            Self::Group(_) => None,
        }
    }

    /// Group id when this context is a group.
    pub fn as_group(self) -> Option<GroupId> {
        match self {
            Self::Group(id) => Some(id),
            Self::Course(_) => None,
        }
    }

    /// Stable string form used in cache keys and logs, e.g. `course_12`.
    pub fn asset_string(self) -> String {
        match self {
            Self::Course(id) => format!("course_{id}"),
            Self::Group(id) => format!("group_{id}"),
        }
    }
}

impl Sharded for ContextRef {
    fn shard(&self) -> ShardId {
        ContextRef::shard(*self)
    }
}

impl fmt::Display for ContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.asset_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 0)]
    #[case(IDS_PER_SHARD - 1, 0)]
    #[case(IDS_PER_SHARD, 1)]
    #[case(3 * IDS_PER_SHARD + 17, 3)]
    fn shard_is_derived_from_the_global_id(#[case] id: i64, #[case] shard: u32) {
        assert_eq!(CourseId::new(id).shard(), ShardId::new(shard));
    }

    #[rstest]
    fn global_id_round_trips_through_shard() {
        let shard = ShardId::new(4);
        let id = AssignmentId::new(shard.global_id(99));
        assert_eq!(id.shard(), shard);
    }

    #[rstest]
    fn context_asset_string_names_the_type() {
        assert_eq!(ContextRef::Course(CourseId::new(5)).asset_string(), "course_5");
        assert_eq!(ContextRef::Group(GroupId::new(9)).to_string(), "group_9");
    }
}
