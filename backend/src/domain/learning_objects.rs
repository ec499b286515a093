//! Learning object rows and the per-row predicates the needs-queries use.
//!
//! Rows mirror what the persistent store holds on each shard. Predicates that
//! only depend on a single row live here; predicates that join several tables
//! live in [`crate::domain::needs`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{
    AssessmentRequestId, AssignmentId, ContextRef, CourseId, DiscussionTopicId, QuizId,
    SubmissionId, UserId, WikiPageId,
};

/// Assignment workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    /// Not visible to students.
    Unpublished,
    /// Visible to students.
    Published,
    /// Soft-deleted.
    Deleted,
}

/// Ways a student can submit an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionType {
    /// Text typed into the browser.
    OnlineTextEntry,
    /// File upload.
    OnlineUpload,
    /// Website URL.
    OnlineUrl,
    /// Graded quiz.
    OnlineQuiz,
    /// Graded discussion.
    DiscussionTopic,
    /// Audio or video recording.
    MediaRecording,
    /// LTI tool.
    ExternalTool,
    /// Turned in outside the system.
    OnPaper,
    /// No submission.
    None,
    /// Not graded.
    NotGraded,
    /// Wiki page assignment.
    WikiPage,
}

impl SubmissionType {
    /// Whether this type represents work turned in through the system.
    pub const fn expects_submission(self) -> bool {
        !matches!(
            self,
            Self::OnPaper | Self::None | Self::NotGraded | Self::WikiPage
        )
    }
}

/// Due, unlock and lock dates in effect for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EffectiveDates {
    /// Due date.
    pub due_at: Option<DateTime<Utc>>,
    /// Date the object becomes available.
    pub unlock_at: Option<DateTime<Utc>>,
    /// Date the object closes.
    pub lock_at: Option<DateTime<Utc>>,
}

impl EffectiveDates {
    /// Whether the object is locked at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.unlock_at.is_some_and(|unlock| unlock > now)
            || self.lock_at.is_some_and(|lock| lock <= now)
    }
}

/// Assignment (or discussion checkpoint) row stored on its course's shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRow {
    /// Assignment id.
    pub id: AssignmentId,
    /// Owning course.
    pub course_id: CourseId,
    /// Title shown on the list.
    pub title: String,
    /// Workflow state.
    pub workflow_state: AssignmentState,
    /// Accepted submission types.
    #[serde(default)]
    pub submission_types: Vec<SubmissionType>,
    /// Base due date.
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    /// Base unlock date.
    #[serde(default)]
    pub unlock_at: Option<DateTime<Utc>>,
    /// Base lock date.
    #[serde(default)]
    pub lock_at: Option<DateTime<Utc>>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
    /// Students the assignment is assigned to; `None` means everybody.
    #[serde(default)]
    pub visible_to: Option<Vec<UserId>>,
    /// Hidden from to-do lists by the course.
    #[serde(default)]
    pub suppressed: bool,
    /// Moderated grading enabled.
    #[serde(default)]
    pub moderated_grading: bool,
    /// Final grader for moderated assignments.
    #[serde(default)]
    pub final_grader_id: Option<UserId>,
    /// Moderated grades were published.
    #[serde(default)]
    pub grades_published: bool,
    /// Peer reviews enabled.
    #[serde(default)]
    pub peer_reviews: bool,
    /// Parent of checkpoints (sub-assignments).
    #[serde(default)]
    pub has_sub_assignments: bool,
    /// Set for checkpoints; points at the parent assignment.
    #[serde(default)]
    pub parent_assignment_id: Option<AssignmentId>,
}

impl AssignmentRow {
    /// Published.
    pub fn is_published(&self) -> bool {
        self.workflow_state == AssignmentState::Published
    }

    /// Not deleted.
    pub fn is_active(&self) -> bool {
        self.workflow_state != AssignmentState::Deleted
    }

    /// Whether a checkpoint of a discussion assignment.
    pub fn is_sub_assignment(&self) -> bool {
        self.parent_assignment_id.is_some()
    }

    /// Whether students are expected to turn something in.
    pub fn expects_submission(&self) -> bool {
        !self.submission_types.is_empty()
            && self
                .submission_types
                .iter()
                .all(|kind| kind.expects_submission())
    }

    /// Whether `user` is assigned this assignment.
    pub fn is_visible_to(&self, user: UserId) -> bool {
        self.visible_to
            .as_ref()
            .is_none_or(|students| students.contains(&user))
    }

    /// Dates from the assignment itself.
    pub fn base_dates(&self) -> EffectiveDates {
        EffectiveDates {
            due_at: self.due_at,
            unlock_at: self.unlock_at,
            lock_at: self.lock_at,
        }
    }

    /// Moderated assignment whose grades are still provisional.
    pub fn awaits_moderation(&self) -> bool {
        self.moderated_grading && !self.grades_published
    }
}

/// Submission workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    /// Placeholder; nothing turned in.
    Unsubmitted,
    /// Turned in.
    Submitted,
    /// Turned in and waiting for manual review (e.g. quiz essay questions).
    PendingReview,
    /// Graded.
    Graded,
    /// Soft-deleted.
    Deleted,
}

/// Submission row stored on the assignment's shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRow {
    /// Submission id.
    pub id: SubmissionId,
    /// Assignment submitted to.
    pub assignment_id: AssignmentId,
    /// Submitting student.
    pub user_id: UserId,
    /// Workflow state.
    pub workflow_state: SubmissionState,
    /// How the work was turned in; `None` when nothing was turned in.
    #[serde(default)]
    pub submission_type: Option<SubmissionType>,
    /// Excused from the assignment.
    #[serde(default)]
    pub excused: bool,
    /// A score is recorded.
    #[serde(default)]
    pub scored: bool,
    /// The recorded grade belongs to the latest attempt.
    #[serde(default)]
    pub grade_matches_current_submission: bool,
    /// Due date in effect for the student.
    #[serde(default)]
    pub cached_due_date: Option<DateTime<Utc>>,
}

impl SubmissionRow {
    /// Not deleted.
    pub fn is_active(&self) -> bool {
        self.workflow_state != SubmissionState::Deleted
    }

    /// The student turned something in.
    pub fn has_submission(&self) -> bool {
        self.submission_type.is_some()
            && matches!(
                self.workflow_state,
                SubmissionState::Submitted | SubmissionState::PendingReview | SubmissionState::Graded
            )
    }

    /// Work turned in that still needs a (re)grade.
    pub fn needs_grading(&self) -> bool {
        if self.submission_type.is_none() || self.excused {
            return false;
        }
        match self.workflow_state {
            SubmissionState::PendingReview => true,
            SubmissionState::Submitted | SubmissionState::Graded => {
                !self.scored || !self.grade_matches_current_submission
            }
            SubmissionState::Unsubmitted | SubmissionState::Deleted => false,
        }
    }
}

/// Provisional grade given by a moderating grader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionalGradeRow {
    /// Graded submission.
    pub submission_id: SubmissionId,
    /// Grader.
    pub scorer_id: UserId,
}

/// Learning object a due-date override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum OverrideTarget {
    /// Assignment override.
    Assignment(AssignmentId),
    /// Quiz override.
    Quiz(QuizId),
}

/// Dates overridden for a single student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDateOverrideRow {
    /// Overridden object.
    pub target: OverrideTarget,
    /// Student the override applies to.
    pub user_id: UserId,
    /// Dates replacing the object's own dates.
    pub dates: EffectiveDates,
}

/// Quiz workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizState {
    /// Not published.
    Unpublished,
    /// Published.
    Available,
    /// Soft-deleted.
    Deleted,
}

/// Quiz type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
    /// Graded quiz backed by an assignment.
    Assignment,
    /// Practice quiz.
    Practice,
    /// Ungraded survey.
    Survey,
    /// Graded survey backed by an assignment.
    GradedSurvey,
}

impl QuizType {
    /// Quizzes not backed by an assignment; they do not reach assignment lists.
    pub const fn is_ungraded(self) -> bool {
        matches!(self, Self::Practice | Self::Survey)
    }
}

/// Quiz row stored on its course's shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizRow {
    /// Quiz id.
    pub id: QuizId,
    /// Owning course.
    pub course_id: CourseId,
    /// Title.
    pub title: String,
    /// Workflow state.
    pub workflow_state: QuizState,
    /// Quiz type.
    pub quiz_type: QuizType,
    /// Base dates.
    #[serde(default)]
    pub dates: EffectiveDates,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
    /// Students the quiz is assigned to; `None` means everybody.
    #[serde(default)]
    pub visible_to: Option<Vec<UserId>>,
}

impl QuizRow {
    /// Whether `user` is assigned this quiz.
    pub fn is_visible_to(&self, user: UserId) -> bool {
        self.visible_to
            .as_ref()
            .is_none_or(|students| students.contains(&user))
    }
}

/// Quiz attempt by a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSubmissionRow {
    /// Quiz attempted.
    pub quiz_id: QuizId,
    /// Student.
    pub user_id: UserId,
    /// The attempt was turned in.
    pub completed: bool,
}

/// Peer review request workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentRequestState {
    /// Waiting for the reviewer.
    Assigned,
    /// Review done.
    Completed,
}

/// Peer review assigned to a reviewer (the assessor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRequestRow {
    /// Request id.
    pub id: AssessmentRequestId,
    /// Reviewer.
    pub assessor_id: UserId,
    /// Student whose work is reviewed.
    pub user_id: UserId,
    /// Reviewed submission.
    pub submission_id: SubmissionId,
    /// Assignment of the reviewed submission.
    pub assignment_id: AssignmentId,
    /// Course of the assignment.
    pub course_id: CourseId,
    /// Workflow state.
    pub workflow_state: AssessmentRequestState,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

/// Discussion topic workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicState {
    /// Published and open.
    Active,
    /// Published, replies closed.
    Locked,
    /// Scheduled for later posting.
    PostDelayed,
    /// Not published.
    Unpublished,
    /// Soft-deleted.
    Deleted,
}

/// Discussion topic or announcement row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionTopicRow {
    /// Topic id.
    pub id: DiscussionTopicId,
    /// Owning context.
    pub context: ContextRef,
    /// Title.
    pub title: String,
    /// Workflow state.
    pub workflow_state: TopicState,
    /// Announcement rather than discussion.
    #[serde(default)]
    pub is_announcement: bool,
    /// Date the topic should be looked at by.
    #[serde(default)]
    pub todo_date: Option<DateTime<Utc>>,
    /// Lock date.
    #[serde(default)]
    pub lock_at: Option<DateTime<Utc>>,
    /// Users the topic is visible to; `None` means everybody.
    #[serde(default)]
    pub visible_to: Option<Vec<UserId>>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

impl DiscussionTopicRow {
    /// Published and not deleted.
    pub fn is_published(&self) -> bool {
        matches!(self.workflow_state, TopicState::Active | TopicState::Locked)
    }

    /// Announcements drop off to-do lists once their lock date has passed.
    pub fn is_locked_announcement(&self, now: DateTime<Utc>) -> bool {
        self.is_announcement && self.lock_at.is_some_and(|lock| lock <= now)
    }

    /// Whether `user` can see the topic.
    pub fn is_visible_to(&self, user: UserId) -> bool {
        self.visible_to
            .as_ref()
            .is_none_or(|users| users.contains(&user))
    }
}

/// Wiki page workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WikiPageState {
    /// Published.
    Active,
    /// Not published.
    Unpublished,
    /// Soft-deleted.
    Deleted,
}

/// Wiki page row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPageRow {
    /// Page id.
    pub id: WikiPageId,
    /// Owning context.
    pub context: ContextRef,
    /// Title.
    pub title: String,
    /// Workflow state.
    pub workflow_state: WikiPageState,
    /// Date the page should be read by.
    #[serde(default)]
    pub todo_date: Option<DateTime<Utc>>,
    /// Users the page is visible to; `None` means everybody.
    #[serde(default)]
    pub visible_to: Option<Vec<UserId>>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

impl WikiPageRow {
    /// Whether `user` can see the page.
    pub fn is_visible_to(&self, user: UserId) -> bool {
        self.visible_to
            .as_ref()
            .is_none_or(|users| users.contains(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0)
            .single()
            .expect("valid time")
    }

    #[fixture]
    fn submission() -> SubmissionRow {
        SubmissionRow {
            id: SubmissionId::new(1),
            assignment_id: AssignmentId::new(2),
            user_id: UserId::new(3),
            workflow_state: SubmissionState::Submitted,
            submission_type: Some(SubmissionType::OnlineUpload),
            excused: false,
            scored: false,
            grade_matches_current_submission: true,
            cached_due_date: None,
        }
    }

    #[rstest]
    fn unscored_submission_needs_grading(submission: SubmissionRow) {
        assert!(submission.needs_grading());
    }

    #[rstest]
    fn resubmission_after_grading_needs_grading(mut submission: SubmissionRow) {
        submission.workflow_state = SubmissionState::Graded;
        submission.scored = true;
        submission.grade_matches_current_submission = false;
        assert!(submission.needs_grading());
    }

    #[rstest]
    fn excused_submission_does_not_need_grading(mut submission: SubmissionRow) {
        submission.excused = true;
        assert!(!submission.needs_grading());
    }

    #[rstest]
    fn placeholder_submission_does_not_need_grading(mut submission: SubmissionRow) {
        submission.submission_type = None;
        submission.workflow_state = SubmissionState::Unsubmitted;
        assert!(!submission.needs_grading());
        assert!(!submission.has_submission());
    }

    #[rstest]
    #[case(vec![SubmissionType::OnlineUpload], true)]
    #[case(vec![SubmissionType::OnlineUpload, SubmissionType::OnlineUrl], true)]
    #[case(vec![SubmissionType::OnPaper], false)]
    #[case(vec![SubmissionType::NotGraded], false)]
    #[case(vec![], false)]
    fn expecting_submission(#[case] types: Vec<SubmissionType>, #[case] expected: bool) {
        let row = AssignmentRow {
            id: AssignmentId::new(1),
            course_id: CourseId::new(1),
            title: "Essay".to_owned(),
            workflow_state: AssignmentState::Published,
            submission_types: types,
            due_at: None,
            unlock_at: None,
            lock_at: None,
            updated_at: at(0),
            visible_to: None,
            suppressed: false,
            moderated_grading: false,
            final_grader_id: None,
            grades_published: false,
            peer_reviews: false,
            has_sub_assignments: false,
            parent_assignment_id: None,
        };
        assert_eq!(row.expects_submission(), expected);
    }

    #[rstest]
    #[case(Some(11), None, true)]
    #[case(Some(9), None, false)]
    #[case(None, Some(10), true)]
    #[case(None, Some(11), false)]
    fn locking(#[case] unlock: Option<u32>, #[case] lock: Option<u32>, #[case] locked: bool) {
        let dates = EffectiveDates {
            due_at: None,
            unlock_at: unlock.map(at),
            lock_at: lock.map(at),
        };
        assert_eq!(dates.is_locked(at(10)), locked);
    }
}
