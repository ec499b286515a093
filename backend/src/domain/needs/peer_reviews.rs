//! Peer reviews assigned to the user.
//!
//! Join conditions stand in for a full authorisation check: the reviewed
//! submission must be active, its assignment published with peer reviews
//! enabled, and the reviewee still enrolled in the course.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{NeedsOptions, NeedsQueryBuilder, NeedsScope, TodoOrder, fan_out, sort_todos};
use crate::domain::ports::{
    AssessmentRequestQuery, AssignmentQuery, EnrollmentQuery, LearningObjectStore,
    MembershipDirectory, PermissionEngine, SubmissionQuery, TodoCache,
};
use crate::domain::{
    AssessmentRequestRow, AssessmentRequestState, AssignmentId, AssignmentRow, AssignmentState,
    CourseId, Error, ObjectKind, Purpose, ResolvedScope, ScopePermission, ShardId, SubmissionId,
    SubmissionRow, UserId,
};

/// A peer review on a to-do list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerReviewTodo {
    pub request: AssessmentRequestRow,
    pub assignment_title: String,
    /// Reviewee's due date for the reviewed assignment.
    pub due_at: Option<DateTime<Utc>>,
}

impl TodoOrder for PeerReviewTodo {
    fn sort_key(&self) -> (DateTime<Utc>, i64) {
        (
            self.due_at.unwrap_or(self.request.updated_at),
            self.request.id.get(),
        )
    }
}

impl<S, D, P, C> NeedsQueryBuilder<S, D, P, C>
where
    S: LearningObjectStore,
    D: MembershipDirectory,
    P: PermissionEngine,
    C: TodoCache,
{
    /// Incomplete peer reviews `user` has been asked to do.
    pub async fn assessment_requests_needing_review(
        &self,
        user: UserId,
        options: &NeedsOptions,
    ) -> Result<Vec<PeerReviewTodo>, Error> {
        let scope = self
            .scopes
            .resolve(user, &options.scope_request(ScopePermission::Participate))
            .await?;
        if scope.course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let params = json!({ "options": options });
        self.cached(
            user,
            ObjectKind::AssessmentRequest,
            Purpose::Reviewing,
            &scope,
            params,
            || async {
                let mut items = self.collect_reviews(user, &scope, options, true).await?;
                options.truncate(&mut items);
                Ok(items)
            },
        )
        .await
    }

    /// Uncached, unlimited form of
    /// [`Self::assessment_requests_needing_review`]; completed requests are
    /// kept so callers can filter on state themselves.
    pub fn assessment_requests_needing_review_scope(
        &self,
        user: UserId,
        options: NeedsOptions,
    ) -> NeedsScope<'_, PeerReviewTodo> {
        NeedsScope::new(async move {
            let scope = self
                .scopes
                .resolve(user, &options.scope_request(ScopePermission::Participate))
                .await?;
            self.collect_reviews(user, &scope, &options, false).await
        })
    }

    async fn collect_reviews(
        &self,
        user: UserId,
        scope: &ResolvedScope,
        options: &NeedsOptions,
        incomplete_only: bool,
    ) -> Result<Vec<PeerReviewTodo>, Error> {
        let ignored = self
            .ignored(user, ObjectKind::AssessmentRequest, Purpose::Reviewing, options)
            .await?;
        let ignored = &ignored;
        let mut items = fan_out(&scope.course_ids, |shard, course_ids| {
            self.reviews_on_shard(user, shard, course_ids, options, incomplete_only, ignored)
        })
        .await?;
        sort_todos(&mut items);
        Ok(items)
    }

    async fn reviews_on_shard(
        &self,
        user: UserId,
        shard: ShardId,
        course_ids: &[CourseId],
        options: &NeedsOptions,
        incomplete_only: bool,
        ignored: &BTreeSet<i64>,
    ) -> Result<Vec<PeerReviewTodo>, Error> {
        let requests: Vec<AssessmentRequestRow> = self
            .store
            .assessment_requests(
                shard,
                &AssessmentRequestQuery {
                    assessor_id: user,
                    course_ids: course_ids.to_vec(),
                    incomplete_only,
                },
            )
            .await?
            .into_iter()
            .filter(|request| request.assessor_id == user)
            .filter(|request| {
                !incomplete_only || request.workflow_state == AssessmentRequestState::Assigned
            })
            .filter(|request| !ignored.contains(&request.id.get()))
            .collect();
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let assignments: BTreeMap<AssignmentId, AssignmentRow> = self
            .store
            .assignments(
                shard,
                &AssignmentQuery {
                    course_ids: course_ids.to_vec(),
                    states: vec![AssignmentState::Published],
                    sub_assignments: false,
                    awaiting_moderation: false,
                },
            )
            .await?
            .into_iter()
            .filter(|row| row.peer_reviews)
            .map(|row| (row.id, row))
            .collect();

        let submissions: BTreeMap<SubmissionId, SubmissionRow> = self
            .store
            .submissions(
                shard,
                &SubmissionQuery {
                    assignment_ids: assignments.keys().copied().collect(),
                    user_id: None,
                },
            )
            .await?
            .into_iter()
            .filter(SubmissionRow::is_active)
            .map(|submission| (submission.id, submission))
            .collect();

        let enrolled: BTreeSet<(CourseId, UserId)> = self
            .store
            .enrollments(
                shard,
                &EnrollmentQuery {
                    course_ids: course_ids.to_vec(),
                    user_id: None,
                },
            )
            .await?
            .into_iter()
            .filter(|enrollment| !enrollment.workflow_state.is_terminated())
            .map(|enrollment| (enrollment.course_id, enrollment.user_id))
            .collect();

        Ok(requests
            .into_iter()
            .filter_map(|request| {
                let assignment = assignments.get(&request.assignment_id)?;
                let submission = submissions.get(&request.submission_id)?;
                if !enrolled.contains(&(request.course_id, request.user_id)) {
                    return None;
                }
                if !options.within_window(submission.cached_due_date) {
                    return None;
                }
                Some(PeerReviewTodo {
                    assignment_title: assignment.title.clone(),
                    due_at: submission.cached_due_date,
                    request,
                })
            })
            .collect())
    }
}
