//! Port for per-shard reads of learning objects and the rows joined to them.
//!
//! Every method targets exactly one shard. Callers partition their ids with
//! [`crate::domain::ShardPartition`] and fan out; adapters never hop shards
//! on their own. Filters carried by the query structs are the ones a
//! relational adapter pushes into SQL; predicates that need several tables
//! are evaluated by the domain afterwards.

use async_trait::async_trait;

use crate::domain::{
    AssessmentRequestRow, AssignmentId, AssignmentRow, AssignmentState, ContextRef, CourseId,
    CourseRow, DiscussionTopicRow, DueDateOverrideRow, EnrollmentRow, GroupId, GroupRow,
    IgnoreRow, OverrideTarget, ProvisionalGradeRow, Purpose, QuizId, QuizRow, QuizSubmissionRow,
    ShardId, SubmissionId, SubmissionRow, UserId, WikiPageRow,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by learning object store adapters.
    pub enum LearningStoreError {
        /// The shard could not be reached.
        Connection { shard: ShardId, message: String } =>
            "learning store connection to {shard} failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "learning store query failed: {message}",
    }
    unavailable: [Connection]
}

/// Assignment rows to load from one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentQuery {
    /// Courses the assignments belong to.
    pub course_ids: Vec<CourseId>,
    /// Accepted workflow states.
    pub states: Vec<AssignmentState>,
    /// Load checkpoints (`true`) or ordinary assignments (`false`).
    pub sub_assignments: bool,
    /// Only moderated assignments whose grades are unpublished.
    pub awaiting_moderation: bool,
}

/// Submission rows to load from one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionQuery {
    /// Assignments submitted to.
    pub assignment_ids: Vec<AssignmentId>,
    /// Restrict to one student.
    pub user_id: Option<UserId>,
}

/// Enrollment rows to load from one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentQuery {
    /// Courses enrolled in.
    pub course_ids: Vec<CourseId>,
    /// Restrict to one user.
    pub user_id: Option<UserId>,
}

/// Peer review requests to load from one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentRequestQuery {
    /// Reviewer.
    pub assessor_id: UserId,
    /// Courses of the reviewed assignments.
    pub course_ids: Vec<CourseId>,
    /// Skip completed reviews.
    pub incomplete_only: bool,
}

/// Per-shard read access to the persistent store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LearningObjectStore: Send + Sync {
    /// Course rows for `ids`.
    async fn courses(
        &self,
        shard: ShardId,
        ids: &[CourseId],
    ) -> Result<Vec<CourseRow>, LearningStoreError>;

    /// Group rows for `ids`.
    async fn groups(
        &self,
        shard: ShardId,
        ids: &[GroupId],
    ) -> Result<Vec<GroupRow>, LearningStoreError>;

    /// Assignment rows matching `query`.
    async fn assignments(
        &self,
        shard: ShardId,
        query: &AssignmentQuery,
    ) -> Result<Vec<AssignmentRow>, LearningStoreError>;

    /// Submission rows matching `query`.
    async fn submissions(
        &self,
        shard: ShardId,
        query: &SubmissionQuery,
    ) -> Result<Vec<SubmissionRow>, LearningStoreError>;

    /// Enrollment rows matching `query`.
    async fn enrollments(
        &self,
        shard: ShardId,
        query: &EnrollmentQuery,
    ) -> Result<Vec<EnrollmentRow>, LearningStoreError>;

    /// Provisional grades given on `submission_ids`.
    async fn provisional_grades(
        &self,
        shard: ShardId,
        submission_ids: &[SubmissionId],
    ) -> Result<Vec<ProvisionalGradeRow>, LearningStoreError>;

    /// Date overrides for `user` on `targets`.
    async fn overrides(
        &self,
        shard: ShardId,
        user: UserId,
        targets: &[OverrideTarget],
    ) -> Result<Vec<DueDateOverrideRow>, LearningStoreError>;

    /// Quizzes of `course_ids`.
    async fn quizzes(
        &self,
        shard: ShardId,
        course_ids: &[CourseId],
    ) -> Result<Vec<QuizRow>, LearningStoreError>;

    /// Quiz attempts by `user` on `quiz_ids`.
    async fn quiz_submissions(
        &self,
        shard: ShardId,
        user: UserId,
        quiz_ids: &[QuizId],
    ) -> Result<Vec<QuizSubmissionRow>, LearningStoreError>;

    /// Peer review requests matching `query`.
    async fn assessment_requests(
        &self,
        shard: ShardId,
        query: &AssessmentRequestQuery,
    ) -> Result<Vec<AssessmentRequestRow>, LearningStoreError>;

    /// Discussion topics and announcements owned by `contexts`.
    async fn discussion_topics(
        &self,
        shard: ShardId,
        contexts: &[ContextRef],
    ) -> Result<Vec<DiscussionTopicRow>, LearningStoreError>;

    /// Wiki pages owned by `contexts`.
    async fn wiki_pages(
        &self,
        shard: ShardId,
        contexts: &[ContextRef],
    ) -> Result<Vec<WikiPageRow>, LearningStoreError>;

    /// Ignores recorded by `user` for `purpose`; ignores live on the user's shard.
    async fn ignores(
        &self,
        shard: ShardId,
        user: UserId,
        purpose: Purpose,
    ) -> Result<Vec<IgnoreRow>, LearningStoreError>;
}
