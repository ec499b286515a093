//! Moderated assignments waiting for the final grader.
//!
//! Runs in two phases. The store narrows the candidates to published,
//! moderated assignments with unpublished grades where the caller is the
//! final grader and at least one provisional grade sits on a submission that
//! still needs grading. The `select_final_grade` check cannot be pushed into
//! the store, so it runs in memory afterwards, stopping once the limit is
//! reached.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;

use super::{AssignmentTodo, NeedsOptions, NeedsQueryBuilder, NeedsScope, fan_out, sort_todos};
use crate::domain::ports::{
    AssignmentQuery, LearningObjectStore, MembershipDirectory, PermissionEngine, SubmissionQuery,
    TodoCache,
};
use crate::domain::{
    AssignmentId, AssignmentRow, AssignmentState, ContextRef, CourseId, Error, ObjectKind,
    Permission, Purpose, ResolvedScope, ScopePermission, ShardId, SubmissionId, UserId,
};

impl<S, D, P, C> NeedsQueryBuilder<S, D, P, C>
where
    S: LearningObjectStore,
    D: MembershipDirectory,
    P: PermissionEngine,
    C: TodoCache,
{
    /// Moderated assignments whose final grade `user` has to select.
    pub async fn assignments_needing_moderation(
        &self,
        user: UserId,
        options: &NeedsOptions,
    ) -> Result<Vec<AssignmentTodo>, Error> {
        let scope = self
            .scopes
            .resolve(user, &options.scope_request(ScopePermission::Instruct))
            .await?;
        if scope.course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let params = json!({ "options": options });
        self.cached(
            user,
            ObjectKind::Assignment,
            Purpose::Moderation,
            &scope,
            params,
            || self.collect_moderation(user, &scope, options, options.limit),
        )
        .await
    }

    /// Uncached form of [`Self::assignments_needing_moderation`]; the
    /// permission filter runs over every candidate.
    pub fn assignments_needing_moderation_scope(
        &self,
        user: UserId,
        options: NeedsOptions,
    ) -> NeedsScope<'_, AssignmentTodo> {
        NeedsScope::new(async move {
            let scope = self
                .scopes
                .resolve(user, &options.scope_request(ScopePermission::Instruct))
                .await?;
            self.collect_moderation(user, &scope, &options, None).await
        })
    }

    async fn collect_moderation(
        &self,
        user: UserId,
        scope: &ResolvedScope,
        options: &NeedsOptions,
        cap: Option<usize>,
    ) -> Result<Vec<AssignmentTodo>, Error> {
        let ignored = self
            .ignored(user, ObjectKind::Assignment, Purpose::Moderation, options)
            .await?;
        let ignored = &ignored;
        let mut candidates = fan_out(&scope.course_ids, |shard, course_ids| {
            self.moderation_candidates_on_shard(user, shard, course_ids, options, ignored)
        })
        .await?;
        sort_todos(&mut candidates);

        let mut permitted = Vec::new();
        for candidate in candidates {
            if cap.is_some_and(|cap| permitted.len() >= cap) {
                break;
            }
            let context = ContextRef::Course(candidate.assignment.course_id);
            if self
                .permissions
                .grants_right(user, context, Permission::SelectFinalGrade)
                .await?
            {
                permitted.push(candidate);
            }
        }
        Ok(permitted)
    }

    async fn moderation_candidates_on_shard(
        &self,
        user: UserId,
        shard: ShardId,
        course_ids: &[CourseId],
        options: &NeedsOptions,
        ignored: &BTreeSet<i64>,
    ) -> Result<Vec<AssignmentTodo>, Error> {
        let query = AssignmentQuery {
            course_ids: course_ids.to_vec(),
            states: vec![AssignmentState::Published],
            sub_assignments: false,
            awaiting_moderation: true,
        };
        let candidates: BTreeMap<AssignmentId, AssignmentRow> = self
            .store
            .assignments(shard, &query)
            .await?
            .into_iter()
            .filter(|row| row.expects_submission() && row.awaits_moderation())
            .filter(|row| row.final_grader_id == Some(user))
            .filter(|row| !ignored.contains(&row.id.get()))
            .filter(|row| options.within_window(row.due_at))
            .map(|row| (row.id, row))
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let pending: BTreeMap<SubmissionId, AssignmentId> = self
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
            .map(|submission| (submission.id, submission.assignment_id))
            .collect();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let submission_ids: Vec<SubmissionId> = pending.keys().copied().collect();
        let provisionally_graded: BTreeSet<AssignmentId> = self
            .store
            .provisional_grades(shard, &submission_ids)
            .await?
            .into_iter()
            .filter_map(|grade| pending.get(&grade.submission_id).copied())
            .collect();

        Ok(candidates
            .into_values()
            .filter(|row| provisionally_graded.contains(&row.id))
            .map(|row| AssignmentTodo {
                due_at: row.due_at,
                assignment: row,
                needs_grading_count: None,
            })
            .collect())
    }
}
