//! In-memory shard store.
//!
//! Rows live in one set of tables; every read keeps only the rows whose
//! owning id lives on the requested shard, so a caller that forgets to fan
//! out sees missing rows exactly as it would against real shards.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ports::{
    AssessmentRequestQuery, AssignmentQuery, EnrollmentQuery, IgnoreRepository,
    IgnoreRepositoryError, LearningObjectStore, LearningStoreError, MembershipDirectory,
    MembershipDirectoryError, SubmissionQuery,
};
use crate::domain::{
    AssessmentRequestRow, AssessmentRequestState, AssetRef, AssignmentRow, ContextRef, CourseId,
    CourseMembership, CourseRow, DiscussionTopicRow, DueDateOverrideRow, EnrollmentRow, GroupId,
    GroupRow, IgnoreRow, OverrideTarget, ProvisionalGradeRow, Purpose, QuizId, QuizRow,
    QuizSubmissionRow, ShardId, SubmissionId, SubmissionRow, UserId, WikiPageRow,
};

/// Course and group memberships of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMemberships {
    pub user_id: UserId,
    #[serde(default)]
    pub courses: Vec<CourseMembership>,
    #[serde(default)]
    pub groups: Vec<GroupId>,
}

/// Every table the store serves. Deserialises from the fixture format the
/// snapshot CLI reads; missing tables default to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningTables {
    pub memberships: Vec<UserMemberships>,
    pub courses: Vec<CourseRow>,
    pub groups: Vec<GroupRow>,
    pub assignments: Vec<AssignmentRow>,
    pub submissions: Vec<SubmissionRow>,
    pub enrollments: Vec<EnrollmentRow>,
    pub provisional_grades: Vec<ProvisionalGradeRow>,
    pub overrides: Vec<DueDateOverrideRow>,
    pub quizzes: Vec<QuizRow>,
    pub quiz_submissions: Vec<QuizSubmissionRow>,
    pub assessment_requests: Vec<AssessmentRequestRow>,
    pub discussion_topics: Vec<DiscussionTopicRow>,
    pub wiki_pages: Vec<WikiPageRow>,
    pub ignores: Vec<IgnoreRow>,
}

/// Store, membership directory and ignore repository over [`LearningTables`].
#[derive(Debug, Default)]
pub struct InMemoryLearningStore {
    tables: Mutex<LearningTables>,
    offline: Mutex<BTreeSet<ShardId>>,
    reads: AtomicUsize,
}

impl InMemoryLearningStore {
    pub fn new(tables: LearningTables) -> Self {
        Self {
            tables: Mutex::new(tables),
            ..Self::default()
        }
    }

    /// Parse a JSON fixture into a store.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw).map(Self::new)
    }

    /// Apply `edit` to the tables, e.g. to add a submission mid-test.
    pub fn edit(&self, edit: impl FnOnce(&mut LearningTables)) {
        if let Ok(mut tables) = self.tables.lock() {
            edit(&mut tables);
        }
    }

    /// Make every read against `shard` fail with a connection error.
    pub fn take_offline(&self, shard: ShardId) {
        if let Ok(mut offline) = self.offline.lock() {
            offline.insert(shard);
        }
    }

    /// Number of shard reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn read(&self, shard: ShardId) -> Result<MutexGuard<'_, LearningTables>, LearningStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let offline = self
            .offline
            .lock()
            .map_err(|_| LearningStoreError::query("offline set poisoned"))?
            .contains(&shard);
        if offline {
            return Err(LearningStoreError::connection(shard, "shard offline"));
        }
        self.tables
            .lock()
            .map_err(|_| LearningStoreError::query("tables poisoned"))
    }

    fn write(&self) -> Result<MutexGuard<'_, LearningTables>, IgnoreRepositoryError> {
        self.tables
            .lock()
            .map_err(|_| IgnoreRepositoryError::write("tables poisoned"))
    }

    fn directory(&self) -> Result<MutexGuard<'_, LearningTables>, MembershipDirectoryError> {
        self.tables
            .lock()
            .map_err(|_| MembershipDirectoryError::query("tables poisoned"))
    }
}

fn override_shard(target: OverrideTarget) -> ShardId {
    match target {
        OverrideTarget::Assignment(id) => id.shard(),
        OverrideTarget::Quiz(id) => id.shard(),
    }
}

#[async_trait]
impl LearningObjectStore for InMemoryLearningStore {
    async fn courses(
        &self,
        shard: ShardId,
        ids: &[CourseId],
    ) -> Result<Vec<CourseRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .courses
            .iter()
            .filter(|row| row.id.shard() == shard && ids.contains(&row.id))
            .cloned()
            .collect())
    }

    async fn groups(
        &self,
        shard: ShardId,
        ids: &[GroupId],
    ) -> Result<Vec<GroupRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .groups
            .iter()
            .filter(|row| row.id.shard() == shard && ids.contains(&row.id))
            .cloned()
            .collect())
    }

    async fn assignments(
        &self,
        shard: ShardId,
        query: &AssignmentQuery,
    ) -> Result<Vec<AssignmentRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .assignments
            .iter()
            .filter(|row| row.id.shard() == shard && query.course_ids.contains(&row.course_id))
            .filter(|row| query.states.contains(&row.workflow_state))
            .filter(|row| row.is_sub_assignment() == query.sub_assignments)
            .filter(|row| !query.awaiting_moderation || row.awaits_moderation())
            .cloned()
            .collect())
    }

    async fn submissions(
        &self,
        shard: ShardId,
        query: &SubmissionQuery,
    ) -> Result<Vec<SubmissionRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .submissions
            .iter()
            .filter(|row| row.id.shard() == shard)
            .filter(|row| query.assignment_ids.contains(&row.assignment_id))
            .filter(|row| query.user_id.is_none_or(|user| row.user_id == user))
            .cloned()
            .collect())
    }

    async fn enrollments(
        &self,
        shard: ShardId,
        query: &EnrollmentQuery,
    ) -> Result<Vec<EnrollmentRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .enrollments
            .iter()
            .filter(|row| row.course_id.shard() == shard)
            .filter(|row| query.course_ids.contains(&row.course_id))
            .filter(|row| query.user_id.is_none_or(|user| row.user_id == user))
            .cloned()
            .collect())
    }

    async fn provisional_grades(
        &self,
        shard: ShardId,
        submission_ids: &[SubmissionId],
    ) -> Result<Vec<ProvisionalGradeRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .provisional_grades
            .iter()
            .filter(|row| row.submission_id.shard() == shard)
            .filter(|row| submission_ids.contains(&row.submission_id))
            .cloned()
            .collect())
    }

    async fn overrides(
        &self,
        shard: ShardId,
        user: UserId,
        targets: &[OverrideTarget],
    ) -> Result<Vec<DueDateOverrideRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .overrides
            .iter()
            .filter(|row| override_shard(row.target) == shard)
            .filter(|row| row.user_id == user && targets.contains(&row.target))
            .cloned()
            .collect())
    }

    async fn quizzes(
        &self,
        shard: ShardId,
        course_ids: &[CourseId],
    ) -> Result<Vec<QuizRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .quizzes
            .iter()
            .filter(|row| row.id.shard() == shard && course_ids.contains(&row.course_id))
            .cloned()
            .collect())
    }

    async fn quiz_submissions(
        &self,
        shard: ShardId,
        user: UserId,
        quiz_ids: &[QuizId],
    ) -> Result<Vec<QuizSubmissionRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .quiz_submissions
            .iter()
            .filter(|row| row.quiz_id.shard() == shard)
            .filter(|row| row.user_id == user && quiz_ids.contains(&row.quiz_id))
            .cloned()
            .collect())
    }

    async fn assessment_requests(
        &self,
        shard: ShardId,
        query: &AssessmentRequestQuery,
    ) -> Result<Vec<AssessmentRequestRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .assessment_requests
            .iter()
            .filter(|row| row.id.shard() == shard)
            .filter(|row| {
                row.assessor_id == query.assessor_id && query.course_ids.contains(&row.course_id)
            })
            .filter(|row| {
                !query.incomplete_only
                    || row.workflow_state == AssessmentRequestState::Assigned
            })
            .cloned()
            .collect())
    }

    async fn discussion_topics(
        &self,
        shard: ShardId,
        contexts: &[ContextRef],
    ) -> Result<Vec<DiscussionTopicRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .discussion_topics
            .iter()
            .filter(|row| row.id.shard() == shard && contexts.contains(&row.context))
            .cloned()
            .collect())
    }

    async fn wiki_pages(
        &self,
        shard: ShardId,
        contexts: &[ContextRef],
    ) -> Result<Vec<WikiPageRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .wiki_pages
            .iter()
            .filter(|row| row.id.shard() == shard && contexts.contains(&row.context))
            .cloned()
            .collect())
    }

    async fn ignores(
        &self,
        shard: ShardId,
        user: UserId,
        purpose: Purpose,
    ) -> Result<Vec<IgnoreRow>, LearningStoreError> {
        let tables = self.read(shard)?;
        Ok(tables
            .ignores
            .iter()
            .filter(|row| row.user_id.shard() == shard)
            .filter(|row| row.user_id == user && row.purpose == purpose)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MembershipDirectory for InMemoryLearningStore {
    async fn course_memberships(
        &self,
        user: UserId,
    ) -> Result<Vec<CourseMembership>, MembershipDirectoryError> {
        let tables = self.directory()?;
        Ok(tables
            .memberships
            .iter()
            .filter(|entry| entry.user_id == user)
            .flat_map(|entry| entry.courses.iter().cloned())
            .collect())
    }

    async fn group_ids(&self, user: UserId) -> Result<Vec<GroupId>, MembershipDirectoryError> {
        let tables = self.directory()?;
        Ok(tables
            .memberships
            .iter()
            .filter(|entry| entry.user_id == user)
            .flat_map(|entry| entry.groups.iter().copied())
            .collect())
    }
}

#[async_trait]
impl IgnoreRepository for InMemoryLearningStore {
    async fn upsert(&self, row: &IgnoreRow) -> Result<(), IgnoreRepositoryError> {
        let mut tables = self.write()?;
        match tables
            .ignores
            .iter_mut()
            .find(|existing| existing.same_identity(row))
        {
            Some(existing) => existing.permanent = row.permanent,
            None => tables.ignores.push(row.clone()),
        }
        Ok(())
    }

    async fn delete_transient(
        &self,
        asset: AssetRef,
        purpose: Purpose,
    ) -> Result<Vec<UserId>, IgnoreRepositoryError> {
        let mut tables = self.write()?;
        let mut cleared = Vec::new();
        tables.ignores.retain(|row| {
            let drop = row.asset == asset && row.purpose == purpose && !row.permanent;
            if drop {
                cleared.push(row.user_id);
            }
            !drop
        });
        cleared.sort();
        cleared.dedup();
        Ok(cleared)
    }
}
