//! Assignment and sub-assignment queries: submitting and grading.
//!
//! Checkpointed discussions split one assignment into sub-assignments. In a
//! course whose account enables checkpoints, a parent assignment with
//! sub-assignments is listed through its sub-assignments only; everywhere
//! else the plain assignment is listed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{
    NeedsOptions, NeedsQueryBuilder, NeedsScope, SubmittingOptions, TodoOrder, fan_out,
    sort_todos,
};
use crate::domain::ports::{
    AssignmentQuery, EnrollmentQuery, LearningObjectStore, MembershipDirectory, PermissionEngine,
    SubmissionQuery, TodoCache,
};
use crate::domain::{
    AssignmentId, AssignmentRow, AssignmentState, CourseId, EffectiveDates, EnrollmentRow, Error,
    ObjectKind, OverrideTarget, Permission, Purpose, ResolvedScope, ScopePermission, SectionId,
    ShardId, SubmissionId, SubmissionRow, UserId,
};

/// Which half of the checkpoint split a query lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Assignment,
    SubAssignment,
}

impl AssignmentKind {
    /// Object kind used for ignores and cache keys.
    pub const fn object_kind(self) -> ObjectKind {
        match self {
            Self::Assignment => ObjectKind::Assignment,
            Self::SubAssignment => ObjectKind::SubAssignment,
        }
    }

    /// Whether `row` belongs to this kind, given the courses that enable
    /// discussion checkpoints.
    pub fn admits(self, row: &AssignmentRow, checkpoint_courses: &BTreeSet<CourseId>) -> bool {
        let checkpoints = checkpoint_courses.contains(&row.course_id);
        match self {
            Self::Assignment => {
                !row.is_sub_assignment() && !(checkpoints && row.has_sub_assignments)
            }
            Self::SubAssignment => row.is_sub_assignment() && checkpoints,
        }
    }

    fn store_query(self, course_ids: &[CourseId], awaiting_moderation: bool) -> AssignmentQuery {
        AssignmentQuery {
            course_ids: course_ids.to_vec(),
            states: vec![AssignmentState::Published],
            sub_assignments: self == Self::SubAssignment,
            awaiting_moderation,
        }
    }
}

/// An assignment on a to-do list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentTodo {
    pub assignment: AssignmentRow,
    /// Due date for the listed user, overrides applied.
    pub due_at: Option<DateTime<Utc>>,
    /// Submissions waiting for the grader; set on grading lists only.
    pub needs_grading_count: Option<usize>,
}

impl TodoOrder for AssignmentTodo {
    fn sort_key(&self) -> (DateTime<Utc>, i64) {
        (
            self.due_at.unwrap_or(self.assignment.updated_at),
            self.assignment.id.get(),
        )
    }
}

/// Students a grader may see in each course of one shard.
///
/// A grader whose every active enrollment in a course is limited to its
/// sections only sees students enrolled in one of those sections.
pub(super) struct GradingRoster {
    students: BTreeMap<(CourseId, UserId), BTreeSet<SectionId>>,
    grader_sections: BTreeMap<CourseId, Option<BTreeSet<SectionId>>>,
}

impl GradingRoster {
    pub(super) fn new(grader: UserId, enrollments: &[EnrollmentRow]) -> Self {
        let mut students: BTreeMap<(CourseId, UserId), BTreeSet<SectionId>> = BTreeMap::new();
        let mut grader_sections: BTreeMap<CourseId, Option<BTreeSet<SectionId>>> =
            BTreeMap::new();

        for enrollment in enrollments.iter().filter(|e| e.is_active()) {
            if enrollment.user_id == grader {
                let entry = grader_sections
                    .entry(enrollment.course_id)
                    .or_insert_with(|| Some(BTreeSet::new()));
                if !enrollment.limit_privileges_to_course_section {
                    *entry = None;
                } else if let Some(sections) = entry {
                    sections.insert(enrollment.section_id);
                }
            } else if enrollment.role.is_student() {
                students
                    .entry((enrollment.course_id, enrollment.user_id))
                    .or_default()
                    .insert(enrollment.section_id);
            }
        }

        Self {
            students,
            grader_sections,
        }
    }

    pub(super) fn admits(&self, course: CourseId, student: UserId) -> bool {
        let Some(sections) = self.students.get(&(course, student)) else {
            return false;
        };
        match self.grader_sections.get(&course) {
            Some(Some(allowed)) => !allowed.is_disjoint(sections),
            Some(None) | None => true,
        }
    }
}

/// Inputs shared by every shard of one submitting query.
#[derive(Clone, Copy)]
struct SubmittingPass<'q> {
    kind: AssignmentKind,
    user: UserId,
    options: &'q NeedsOptions,
    submitting: SubmittingOptions,
    ignored: &'q BTreeSet<i64>,
    now: DateTime<Utc>,
}

impl<S, D, P, C> NeedsQueryBuilder<S, D, P, C>
where
    S: LearningObjectStore,
    D: MembershipDirectory,
    P: PermissionEngine,
    C: TodoCache,
{
    /// Published assignments `user` still has to submit.
    pub async fn assignments_needing_submitting(
        &self,
        kind: AssignmentKind,
        user: UserId,
        options: &NeedsOptions,
        submitting: SubmittingOptions,
    ) -> Result<Vec<AssignmentTodo>, Error> {
        let scope = self
            .scopes
            .resolve(user, &options.scope_request(ScopePermission::Participate))
            .await?;
        if scope.course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let params = json!({ "options": options, "submitting": submitting });
        self.cached(
            user,
            kind.object_kind(),
            Purpose::Submitting,
            &scope,
            params,
            || async {
                let mut items = self
                    .collect_submitting(kind, user, &scope, options, submitting)
                    .await?;
                options.truncate(&mut items);
                Ok(items)
            },
        )
        .await
    }

    /// Uncached, unlimited form of [`Self::assignments_needing_submitting`].
    pub fn assignments_needing_submitting_scope(
        &self,
        kind: AssignmentKind,
        user: UserId,
        options: NeedsOptions,
        submitting: SubmittingOptions,
    ) -> NeedsScope<'_, AssignmentTodo> {
        NeedsScope::new(async move {
            let scope = self
                .scopes
                .resolve(user, &options.scope_request(ScopePermission::Participate))
                .await?;
            self.collect_submitting(kind, user, &scope, &options, submitting)
                .await
        })
    }

    /// Published assignments with submissions `user` can grade, each with its
    /// needs-grading count.
    pub async fn assignments_needing_grading(
        &self,
        kind: AssignmentKind,
        user: UserId,
        options: &NeedsOptions,
    ) -> Result<Vec<AssignmentTodo>, Error> {
        if self.grading_disabled(user, kind) {
            return Ok(Vec::new());
        }
        let scope = self
            .scopes
            .resolve(user, &options.scope_request(Self::grading_scope()))
            .await?;
        if scope.course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let params = json!({ "options": options });
        self.cached(
            user,
            kind.object_kind(),
            Purpose::Grading,
            &scope,
            params,
            || async {
                let mut items = self.collect_grading(kind, user, &scope, options).await?;
                options.truncate(&mut items);
                Ok(items)
            },
        )
        .await
    }

    /// Uncached, unlimited form of [`Self::assignments_needing_grading`].
    pub fn assignments_needing_grading_scope(
        &self,
        kind: AssignmentKind,
        user: UserId,
        options: NeedsOptions,
    ) -> NeedsScope<'_, AssignmentTodo> {
        if self.grading_disabled(user, kind) {
            return NeedsScope::empty();
        }
        NeedsScope::new(async move {
            let scope = self
                .scopes
                .resolve(user, &options.scope_request(Self::grading_scope()))
                .await?;
            self.collect_grading(kind, user, &scope, &options).await
        })
    }

    fn grading_scope() -> ScopePermission {
        ScopePermission::Grant(Permission::ManageGrades)
    }

    fn grading_disabled(&self, user: UserId, kind: AssignmentKind) -> bool {
        if self.config.disable_grading_queries {
            debug!(user = %user, kind = ?kind, "grading queries disabled");
        }
        self.config.disable_grading_queries
    }

    /// Courses of `course_ids` whose account enables discussion checkpoints.
    pub(super) async fn checkpoint_courses(
        &self,
        shard: ShardId,
        course_ids: &[CourseId],
    ) -> Result<BTreeSet<CourseId>, Error> {
        Ok(self
            .store
            .courses(shard, course_ids)
            .await?
            .into_iter()
            .filter(|course| course.discussion_checkpoints)
            .map(|course| course.id)
            .collect())
    }

    async fn collect_submitting(
        &self,
        kind: AssignmentKind,
        user: UserId,
        scope: &ResolvedScope,
        options: &NeedsOptions,
        submitting: SubmittingOptions,
    ) -> Result<Vec<AssignmentTodo>, Error> {
        let ignored = self
            .ignored(user, kind.object_kind(), Purpose::Submitting, options)
            .await?;
        let pass = &SubmittingPass {
            kind,
            user,
            options,
            submitting,
            ignored: &ignored,
            now: self.now(),
        };
        let mut items = fan_out(&scope.course_ids, |shard, course_ids| {
            self.submitting_on_shard(pass, shard, course_ids)
        })
        .await?;
        sort_todos(&mut items);
        Ok(items)
    }

    async fn submitting_on_shard(
        &self,
        pass: &SubmittingPass<'_>,
        shard: ShardId,
        course_ids: &[CourseId],
    ) -> Result<Vec<AssignmentTodo>, Error> {
        let SubmittingPass {
            kind,
            user,
            options,
            submitting,
            ignored,
            now,
        } = *pass;
        let checkpoints = self.checkpoint_courses(shard, course_ids).await?;
        let candidates: Vec<AssignmentRow> = self
            .store
            .assignments(shard, &kind.store_query(course_ids, false))
            .await?
            .into_iter()
            .filter(|row| kind.admits(row, &checkpoints))
            .filter(|row| row.is_visible_to(user) && !row.suppressed)
            .filter(|row| submitting.include_ungraded || row.expects_submission())
            .filter(|row| !ignored.contains(&row.id.get()))
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let targets: Vec<OverrideTarget> = candidates
            .iter()
            .map(|row| OverrideTarget::Assignment(row.id))
            .collect();
        let overrides: BTreeMap<OverrideTarget, EffectiveDates> = self
            .store
            .overrides(shard, user, &targets)
            .await?
            .into_iter()
            .map(|row| (row.target, row.dates))
            .collect();

        let submitted: BTreeSet<AssignmentId> = self
            .store
            .submissions(
                shard,
                &SubmissionQuery {
                    assignment_ids: candidates.iter().map(|row| row.id).collect(),
                    user_id: Some(user),
                },
            )
            .await?
            .into_iter()
            .filter(|submission| submission.is_active() && submission.has_submission())
            .map(|submission| submission.assignment_id)
            .collect();

        Ok(candidates
            .into_iter()
            .filter_map(|row| {
                let dates = overrides
                    .get(&OverrideTarget::Assignment(row.id))
                    .copied()
                    .unwrap_or_else(|| row.base_dates());
                if !submitting.include_locked && dates.is_locked(now) {
                    return None;
                }
                if !options.within_window(dates.due_at) {
                    return None;
                }
                let due_in_future = dates.due_at.is_some_and(|due| due > now);
                if submitted.contains(&row.id) && !due_in_future {
                    return None;
                }
                Some(AssignmentTodo {
                    assignment: row,
                    due_at: dates.due_at,
                    needs_grading_count: None,
                })
            })
            .collect())
    }

    async fn collect_grading(
        &self,
        kind: AssignmentKind,
        user: UserId,
        scope: &ResolvedScope,
        options: &NeedsOptions,
    ) -> Result<Vec<AssignmentTodo>, Error> {
        let ignored = self
            .ignored(user, kind.object_kind(), Purpose::Grading, options)
            .await?;
        let ignored = &ignored;
        let mut items = fan_out(&scope.course_ids, |shard, course_ids| {
            self.grading_on_shard(kind, user, shard, course_ids, options, ignored)
        })
        .await?;
        sort_todos(&mut items);
        Ok(items)
    }

    async fn grading_on_shard(
        &self,
        kind: AssignmentKind,
        user: UserId,
        shard: ShardId,
        course_ids: &[CourseId],
        options: &NeedsOptions,
        ignored: &BTreeSet<i64>,
    ) -> Result<Vec<AssignmentTodo>, Error> {
        let checkpoints = self.checkpoint_courses(shard, course_ids).await?;
        let candidates: BTreeMap<AssignmentId, AssignmentRow> = self
            .store
            .assignments(shard, &kind.store_query(course_ids, false))
            .await?
            .into_iter()
            .filter(|row| kind.admits(row, &checkpoints) && row.expects_submission())
            .filter(|row| !ignored.contains(&row.id.get()))
            .filter(|row| options.within_window(row.due_at))
            .map(|row| (row.id, row))
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let pending: Vec<SubmissionRow> = self
            .store
            .submissions(
                shard,
                &SubmissionQuery {
                    assignment_ids: candidates.keys().copied().collect(),
                    user_id: None,
                },
            )
            .await?
            .into_iter()
            .filter(|submission| submission.is_active() && submission.needs_grading())
            .collect();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let enrollments = self
            .store
            .enrollments(
                shard,
                &EnrollmentQuery {
                    course_ids: course_ids.to_vec(),
                    user_id: None,
                },
            )
            .await?;
        let roster = GradingRoster::new(user, &enrollments);
        let provisionally_graded = self
            .provisionally_graded_by(user, shard, &candidates, &pending)
            .await?;

        let mut counts: BTreeMap<AssignmentId, usize> = BTreeMap::new();
        for submission in &pending {
            let Some(assignment) = candidates.get(&submission.assignment_id) else {
                continue;
            };
            if !roster.admits(assignment.course_id, submission.user_id) {
                continue;
            }
            if assignment.awaits_moderation() && provisionally_graded.contains(&submission.id) {
                continue;
            }
            *counts.entry(assignment.id).or_default() += 1;
        }

        Ok(candidates
            .into_values()
            .filter_map(|assignment| {
                let count = counts.get(&assignment.id).copied().unwrap_or_default();
                (count > 0).then(|| AssignmentTodo {
                    due_at: assignment.due_at,
                    assignment,
                    needs_grading_count: Some(count),
                })
            })
            .collect())
    }

    /// Submissions of moderated, unpublished assignments that `grader`
    /// already scored provisionally.
    async fn provisionally_graded_by(
        &self,
        grader: UserId,
        shard: ShardId,
        assignments: &BTreeMap<AssignmentId, AssignmentRow>,
        pending: &[SubmissionRow],
    ) -> Result<BTreeSet<SubmissionId>, Error> {
        let moderated: Vec<SubmissionId> = pending
            .iter()
            .filter(|submission| {
                assignments
                    .get(&submission.assignment_id)
                    .is_some_and(AssignmentRow::awaits_moderation)
            })
            .map(|submission| submission.id)
            .collect();
        if moderated.is_empty() {
            return Ok(BTreeSet::new());
        }
        Ok(self
            .store
            .provisional_grades(shard, &moderated)
            .await?
            .into_iter()
            .filter(|grade| grade.scorer_id == grader)
            .map(|grade| grade.submission_id)
            .collect())
    }
}
