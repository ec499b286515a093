//! Ungraded (practice and survey) quizzes waiting for a submission.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    NeedsOptions, NeedsQueryBuilder, NeedsScope, QuizOptions, TodoOrder, fan_out, sort_todos,
};
use crate::domain::ports::{LearningObjectStore, MembershipDirectory, PermissionEngine, TodoCache};
use crate::domain::{
    CourseId, EffectiveDates, Error, ObjectKind, OverrideTarget, Purpose, QuizId, QuizRow,
    QuizState, ResolvedScope, ScopePermission, ShardId, UserId,
};

/// A quiz on a to-do list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizTodo {
    pub quiz: QuizRow,
    /// Due date for the listed user, overrides applied.
    pub due_at: Option<DateTime<Utc>>,
}

impl TodoOrder for QuizTodo {
    fn sort_key(&self) -> (DateTime<Utc>, i64) {
        (self.due_at.unwrap_or(self.quiz.updated_at), self.quiz.id.get())
    }
}

#[derive(Clone, Copy)]
struct QuizPass<'q> {
    user: UserId,
    options: &'q NeedsOptions,
    quiz: QuizOptions,
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
    /// Available practice quizzes and surveys `user` can still take.
    pub async fn ungraded_quizzes_needing_submitting(
        &self,
        user: UserId,
        options: &NeedsOptions,
        quiz: QuizOptions,
    ) -> Result<Vec<QuizTodo>, Error> {
        let scope = self
            .scopes
            .resolve(user, &options.scope_request(ScopePermission::Participate))
            .await?;
        if scope.course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let params = json!({ "options": options, "quiz": quiz });
        self.cached(
            user,
            ObjectKind::Quiz,
            Purpose::Submitting,
            &scope,
            params,
            || async {
                let mut items = self.collect_quizzes(user, &scope, options, quiz).await?;
                options.truncate(&mut items);
                Ok(items)
            },
        )
        .await
    }

    /// Uncached, unlimited form of
    /// [`Self::ungraded_quizzes_needing_submitting`].
    pub fn ungraded_quizzes_needing_submitting_scope(
        &self,
        user: UserId,
        options: NeedsOptions,
        quiz: QuizOptions,
    ) -> NeedsScope<'_, QuizTodo> {
        NeedsScope::new(async move {
            let scope = self
                .scopes
                .resolve(user, &options.scope_request(ScopePermission::Participate))
                .await?;
            self.collect_quizzes(user, &scope, &options, quiz).await
        })
    }

    async fn collect_quizzes(
        &self,
        user: UserId,
        scope: &ResolvedScope,
        options: &NeedsOptions,
        quiz: QuizOptions,
    ) -> Result<Vec<QuizTodo>, Error> {
        let ignored = self
            .ignored(user, ObjectKind::Quiz, Purpose::Submitting, options)
            .await?;
        let pass = &QuizPass {
            user,
            options,
            quiz,
            ignored: &ignored,
            now: self.now(),
        };
        let mut items = fan_out(&scope.course_ids, |shard, course_ids| {
            self.quizzes_on_shard(pass, shard, course_ids)
        })
        .await?;
        sort_todos(&mut items);
        Ok(items)
    }

    async fn quizzes_on_shard(
        &self,
        pass: &QuizPass<'_>,
        shard: ShardId,
        course_ids: &[CourseId],
    ) -> Result<Vec<QuizTodo>, Error> {
        let QuizPass {
            user,
            options,
            quiz,
            ignored,
            now,
        } = *pass;
        let candidates: Vec<QuizRow> = self
            .store
            .quizzes(shard, course_ids)
            .await?
            .into_iter()
            .filter(|row| row.workflow_state == QuizState::Available)
            .filter(|row| row.quiz_type.is_ungraded() && row.is_visible_to(user))
            .filter(|row| !ignored.contains(&row.id.get()))
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let targets: Vec<OverrideTarget> = candidates
            .iter()
            .map(|row| OverrideTarget::Quiz(row.id))
            .collect();
        let overrides: BTreeMap<OverrideTarget, EffectiveDates> = self
            .store
            .overrides(shard, user, &targets)
            .await?
            .into_iter()
            .map(|row| (row.target, row.dates))
            .collect();

        let completed: BTreeSet<QuizId> = if quiz.needing_submission_only {
            let ids: Vec<QuizId> = candidates.iter().map(|row| row.id).collect();
            self.store
                .quiz_submissions(shard, user, &ids)
                .await?
                .into_iter()
                .filter(|submission| submission.completed)
                .map(|submission| submission.quiz_id)
                .collect()
        } else {
            BTreeSet::new()
        };

        Ok(candidates
            .into_iter()
            .filter(|row| !completed.contains(&row.id))
            .filter_map(|row| {
                let dates = overrides
                    .get(&OverrideTarget::Quiz(row.id))
                    .copied()
                    .unwrap_or(row.dates);
                if dates.is_locked(now) || !options.within_window(dates.due_at) {
                    return None;
                }
                Some(QuizTodo {
                    due_at: dates.due_at,
                    quiz: row,
                })
            })
            .collect())
    }
}
