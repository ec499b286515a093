//! Row builders with sensible defaults.
//!
//! Every builder returns a row that passes the needs-query filters on its
//! own: published, visible to everyone, expecting a submission. Tests tweak
//! the one field they care about.

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::{
    AccountId, AssessmentRequestId, AssessmentRequestRow, AssessmentRequestState, AssignmentId,
    AssignmentRow, AssignmentState, ContextRef, CourseId, CourseMembership, CourseRow,
    CourseState, DiscussionTopicId, DiscussionTopicRow, EffectiveDates, EnrollmentRole,
    EnrollmentRow, EnrollmentState, GroupId, GroupRow, QuizId, QuizRow, QuizState, QuizType,
    SectionId, SubmissionId, SubmissionRow, SubmissionState, SubmissionType, TopicState, UserId,
    WikiPageId, WikiPageRow, WikiPageState,
};

/// Fixed instant the fixtures are anchored to: 2026-03-02T12:00:00Z.
pub fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_772_452_800, 0).unwrap_or_default()
}

/// `now()` shifted by whole days; negative values go back in time.
pub fn days(offset: i64) -> DateTime<Utc> {
    now() + TimeDelta::days(offset)
}

pub fn course(id: i64) -> CourseRow {
    CourseRow {
        id: CourseId::new(id),
        account_id: AccountId::new(1),
        name: format!("Course {id}"),
        workflow_state: CourseState::Available,
        discussion_checkpoints: false,
    }
}

pub fn group(id: i64, course: Option<i64>) -> GroupRow {
    GroupRow {
        id: GroupId::new(id),
        name: format!("Group {id}"),
        course_id: course.map(CourseId::new),
    }
}

/// Active membership in a running course.
pub fn membership(course: i64, role: EnrollmentRole) -> CourseMembership {
    CourseMembership {
        course_id: CourseId::new(course),
        role,
        workflow_state: EnrollmentState::Active,
        course_concluded: false,
    }
}

/// Active, unrestricted enrollment in section 1 of `course`.
pub fn enrollment(user: i64, course: i64, role: EnrollmentRole) -> EnrollmentRow {
    EnrollmentRow {
        user_id: UserId::new(user),
        course_id: CourseId::new(course),
        section_id: SectionId::new(1),
        role,
        workflow_state: EnrollmentState::Active,
        limit_privileges_to_course_section: false,
    }
}

/// Published online-text assignment without dates, updated a week ago.
pub fn assignment(id: i64, course: i64) -> AssignmentRow {
    AssignmentRow {
        id: AssignmentId::new(id),
        course_id: CourseId::new(course),
        title: format!("Assignment {id}"),
        workflow_state: AssignmentState::Published,
        submission_types: vec![SubmissionType::OnlineTextEntry],
        due_at: None,
        unlock_at: None,
        lock_at: None,
        updated_at: days(-7),
        visible_to: None,
        suppressed: false,
        moderated_grading: false,
        final_grader_id: None,
        grades_published: false,
        peer_reviews: false,
        has_sub_assignments: false,
        parent_assignment_id: None,
    }
}

/// Ungraded submission waiting for a grade.
pub fn submission(id: i64, assignment: i64, user: i64) -> SubmissionRow {
    SubmissionRow {
        id: SubmissionId::new(id),
        assignment_id: AssignmentId::new(assignment),
        user_id: UserId::new(user),
        workflow_state: SubmissionState::Submitted,
        submission_type: Some(SubmissionType::OnlineTextEntry),
        excused: false,
        scored: false,
        grade_matches_current_submission: false,
        cached_due_date: None,
    }
}

/// Available quiz of the given type, without dates.
pub fn quiz(id: i64, course: i64, quiz_type: QuizType) -> QuizRow {
    QuizRow {
        id: QuizId::new(id),
        course_id: CourseId::new(course),
        title: format!("Quiz {id}"),
        workflow_state: QuizState::Available,
        quiz_type,
        dates: EffectiveDates::default(),
        updated_at: days(-7),
        visible_to: None,
    }
}

/// Open peer review of `reviewee`'s submission.
pub fn assessment_request(
    id: i64,
    assessor: i64,
    reviewee: i64,
    submission: &SubmissionRow,
    course: i64,
) -> AssessmentRequestRow {
    AssessmentRequestRow {
        id: AssessmentRequestId::new(id),
        assessor_id: UserId::new(assessor),
        user_id: UserId::new(reviewee),
        submission_id: submission.id,
        assignment_id: submission.assignment_id,
        course_id: CourseId::new(course),
        workflow_state: AssessmentRequestState::Assigned,
        updated_at: days(-2),
    }
}

/// Active discussion topic with a to-do date tomorrow.
pub fn topic(id: i64, context: ContextRef) -> DiscussionTopicRow {
    DiscussionTopicRow {
        id: DiscussionTopicId::new(id),
        context,
        title: format!("Topic {id}"),
        workflow_state: TopicState::Active,
        is_announcement: false,
        todo_date: Some(days(1)),
        lock_at: None,
        visible_to: None,
        updated_at: days(-3),
    }
}

/// Published wiki page with a to-do date tomorrow.
pub fn page(id: i64, context: ContextRef) -> WikiPageRow {
    WikiPageRow {
        id: WikiPageId::new(id),
        context,
        title: format!("Page {id}"),
        workflow_state: WikiPageState::Active,
        todo_date: Some(days(1)),
        visible_to: None,
        updated_at: days(-3),
    }
}
