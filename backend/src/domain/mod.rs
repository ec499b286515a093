//! Domain primitives and services of the to-do aggregation.
//!
//! Purpose: define the strongly typed rows the sharded store returns, the
//! scope resolver, the aggregation cache and the needs-queries built on top
//! of them. Keep types immutable and document serialisation contracts
//! (serde) on each type.
//!
//! Public surface:
//! - Error (alias to `error::Error`): transport-agnostic failure payload.
//! - ErrorCode (alias to `error::ErrorCode`): stable error identifier.
//! - ScopeResolver, AggregationCache, NeedsQueryBuilder and IgnoreLedger:
//!   the services the presenter composes.

pub mod aggregation_cache;
pub mod cache_key;
pub mod context;
pub mod error;
pub mod ids;
pub mod ignore;
pub mod ignores;
pub mod learning_objects;
pub mod needs;
pub mod permissions;
pub mod ports;
pub mod purpose;
pub mod scope;

pub use self::aggregation_cache::{AggregationCache, CacheRequest};
pub use self::cache_key::{
    CacheKeyParts, Fingerprint, FingerprintError, canonicalize_and_hash, context_fingerprint,
    derive_cache_key,
};
pub use self::context::{
    ContextSummary, CourseMembership, CourseRow, CourseState, EnrollmentRole, EnrollmentRow,
    EnrollmentState, GroupRow,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::ids::{
    AccountId, AssessmentRequestId, AssignmentId, ContextRef, CourseId, DiscussionTopicId,
    GroupId, IDS_PER_SHARD, QuizId, SectionId, ShardId, Sharded, SubmissionId, UserId,
    WikiPageId,
};
pub use self::ignore::{AssetRef, IgnoreRow};
pub use self::ignores::IgnoreLedger;
pub use self::learning_objects::{
    AssessmentRequestRow, AssessmentRequestState, AssignmentRow, AssignmentState,
    DiscussionTopicRow, DueDateOverrideRow, EffectiveDates, OverrideTarget, ProvisionalGradeRow,
    QuizRow, QuizState, QuizSubmissionRow, QuizType, SubmissionRow, SubmissionState,
    SubmissionType, TopicState, WikiPageRow, WikiPageState,
};
pub use self::needs::{
    AssignmentKind, AssignmentTodo, DEFAULT_CACHE_TTL, DEFAULT_LIMIT, NeedsConfig, NeedsOptions,
    NeedsQueryBuilder, NeedsScope, PeerReviewTodo, QuizOptions, QuizTodo, SubmittingOptions,
    TodoOrder, sort_todos,
};
pub use self::permissions::{Permission, PermissionMatrix};
pub use self::purpose::{ObjectKind, ParseTodoTermError, Purpose};
pub use self::scope::{ResolvedScope, ScopePermission, ScopeRequest, ScopeResolver, ShardPartition};

/// Convenient domain result alias.
///
/// # Examples
/// ```
/// use todo_backend::domain::{DomainResult, Error};
///
/// fn lookup() -> DomainResult<u32> {
///     Err(Error::invalid_request("unknown purpose"))
/// }
///
/// assert!(lookup().is_err());
/// ```
pub type DomainResult<T> = Result<T, Error>;
