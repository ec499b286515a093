//! Courses, groups and the memberships that tie users to them.

use serde::{Deserialize, Serialize};

use super::ids::{AccountId, ContextRef, CourseId, GroupId, SectionId, UserId};

/// Course workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseState {
    /// Course shell created but never published.
    Created,
    /// Claimed by an instructor, not yet published.
    Claimed,
    /// Published and running.
    Available,
    /// Concluded.
    Completed,
    /// Soft-deleted.
    Deleted,
}

/// Course record as stored on its shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRow {
    /// Course id.
    pub id: CourseId,
    /// Owning account.
    pub account_id: AccountId,
    /// Display name.
    pub name: String,
    /// Workflow state.
    pub workflow_state: CourseState,
    /// Whether the owning account enables checkpointed discussions.
    #[serde(default)]
    pub discussion_checkpoints: bool,
}

/// Group record as stored on its shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRow {
    /// Group id.
    pub id: GroupId,
    /// Display name.
    pub name: String,
    /// Course the group belongs to, if any.
    #[serde(default)]
    pub course_id: Option<CourseId>,
}

/// Role held by an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentRole {
    /// Enrolled student.
    Student,
    /// Test student created by the "student view" feature.
    StudentView,
    /// Teacher.
    Teacher,
    /// Teaching assistant.
    Ta,
    /// Course designer.
    Designer,
    /// Observer of another student.
    Observer,
}

impl EnrollmentRole {
    /// Whether the role participates as a student.
    pub const fn is_student(self) -> bool {
        matches!(self, Self::Student | Self::StudentView)
    }

    /// Whether the role teaches (and therefore grades) the course.
    pub const fn is_instructor(self) -> bool {
        matches!(self, Self::Teacher | Self::Ta)
    }
}

/// Enrollment workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    /// Active participant.
    Active,
    /// Invitation not yet accepted.
    Invited,
    /// Created by SIS import, awaiting activation.
    CreationPending,
    /// Participation concluded.
    Completed,
    /// Temporarily deactivated.
    Inactive,
    /// Invitation rejected.
    Rejected,
    /// Removed.
    Deleted,
}

impl EnrollmentState {
    /// Whether the enrollment was ended and no longer counts as a participant.
    pub const fn is_terminated(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Inactive | Self::Rejected | Self::Deleted
        )
    }
}

/// Enrollment row stored on the course's shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRow {
    /// Enrolled user.
    pub user_id: UserId,
    /// Course enrolled in.
    pub course_id: CourseId,
    /// Section enrolled in.
    pub section_id: SectionId,
    /// Role.
    pub role: EnrollmentRole,
    /// Workflow state.
    pub workflow_state: EnrollmentState,
    /// Instructors with this flag only see students in their own sections.
    #[serde(default)]
    pub limit_privileges_to_course_section: bool,
}

impl EnrollmentRow {
    /// Whether the enrollment is active.
    pub fn is_active(&self) -> bool {
        self.workflow_state == EnrollmentState::Active
    }
}

/// A user's membership in a course, as reported by the membership directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseMembership {
    /// Course id.
    pub course_id: CourseId,
    /// Role in the course.
    pub role: EnrollmentRole,
    /// Enrollment state.
    pub workflow_state: EnrollmentState,
    /// Whether the course itself has concluded.
    #[serde(default)]
    pub course_concluded: bool,
}

impl CourseMembership {
    /// Active enrollment in a course that has not concluded.
    pub fn is_current(&self) -> bool {
        self.workflow_state == EnrollmentState::Active && !self.course_concluded
    }
}

/// Display data for a context, used when rendering list entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    /// Context reference.
    pub context: ContextRef,
    /// Context name.
    pub name: String,
}
