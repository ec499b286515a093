//! To-do list presenter: shapes needs-query results for a view layer.
//!
//! One [`TodoListPresenter::build`] call gathers the four categories a user
//! sees on their dashboard, applies the grading permission filter with a
//! single bulk permission lookup and resolves display names for every
//! context. The resulting [`TodoList`] answers the questions a template asks:
//! what to show, how much is hidden and whether context names are needed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ports::{LearningObjectStore, MembershipDirectory, PermissionEngine, TodoCache};
use crate::domain::{
    AssignmentKind, AssignmentTodo, ContextRef, CourseId, Error, GroupId, NeedsOptions,
    NeedsQueryBuilder, ObjectKind, PeerReviewTodo, Permission, PermissionMatrix, Purpose,
    ShardPartition, SubmittingOptions, UserId, sort_todos,
};

/// Items fetched per category.
pub const DEFAULT_FETCH_LIMIT: usize = 100;
/// Items shown per category before the rest is summarised as hidden.
pub const DEFAULT_VISIBLE_LIMIT: usize = 5;

const GRADING_PERMISSIONS: [Permission; 2] = [Permission::ManageGrades, Permission::ViewAllGrades];

/// Dashboard category, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoCategory {
    Grading,
    Moderation,
    Submitting,
    Reviewing,
}

impl TodoCategory {
    pub const ALL: [Self; 4] = [
        Self::Grading,
        Self::Moderation,
        Self::Submitting,
        Self::Reviewing,
    ];

    pub const fn purpose(self) -> Purpose {
        match self {
            Self::Grading => Purpose::Grading,
            Self::Moderation => Purpose::Moderation,
            Self::Submitting => Purpose::Submitting,
            Self::Reviewing => Purpose::Reviewing,
        }
    }
}

/// One row of a rendered to-do list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoEntry {
    pub kind: ObjectKind,
    pub purpose: Purpose,
    pub id: i64,
    pub title: String,
    pub context: ContextRef,
    pub context_name: String,
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_grading_count: Option<usize>,
}

impl TodoEntry {
    fn from_assignment(todo: AssignmentTodo, purpose: Purpose) -> Self {
        let kind = if todo.assignment.is_sub_assignment() {
            ObjectKind::SubAssignment
        } else {
            ObjectKind::Assignment
        };
        Self {
            kind,
            purpose,
            id: todo.assignment.id.get(),
            title: todo.assignment.title,
            context: ContextRef::Course(todo.assignment.course_id),
            context_name: String::new(),
            due_at: todo.due_at,
            needs_grading_count: todo.needs_grading_count,
        }
    }

    fn from_review(todo: PeerReviewTodo) -> Self {
        Self {
            kind: ObjectKind::AssessmentRequest,
            purpose: Purpose::Reviewing,
            id: todo.request.id.get(),
            title: todo.assignment_title,
            context: ContextRef::Course(todo.request.course_id),
            context_name: String::new(),
            due_at: todo.due_at,
            needs_grading_count: None,
        }
    }
}

/// Fetch and display limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenterConfig {
    pub fetch_limit: usize,
    pub visible_limit: usize,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            fetch_limit: DEFAULT_FETCH_LIMIT,
            visible_limit: DEFAULT_VISIBLE_LIMIT,
        }
    }
}

/// A user's categorised to-do lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoList {
    categories: BTreeMap<TodoCategory, Vec<TodoEntry>>,
    visible_limit: usize,
}

impl TodoList {
    fn new(categories: BTreeMap<TodoCategory, Vec<TodoEntry>>, visible_limit: usize) -> Self {
        Self {
            categories,
            visible_limit,
        }
    }

    /// Every fetched entry of `category`, sorted.
    pub fn entries(&self, category: TodoCategory) -> &[TodoEntry] {
        self.categories.get(&category).map_or(&[], Vec::as_slice)
    }

    /// Entries of `category` to render.
    pub fn visible(&self, category: TodoCategory) -> &[TodoEntry] {
        let entries = self.entries(category);
        entries.get(..self.visible_limit).unwrap_or(entries)
    }

    /// Entries of `category` beyond the visible limit.
    ///
    /// ```
    /// # use todo_backend::presenter::{TodoCategory, TodoList};
    /// let list = TodoList::empty(5);
    /// assert_eq!(list.hidden_count_for(TodoCategory::Grading), 0);
    /// ```
    pub fn hidden_count_for(&self, category: TodoCategory) -> usize {
        self.entries(category)
            .len()
            .saturating_sub(self.visible_limit)
    }

    pub fn total_hidden_count(&self) -> usize {
        TodoCategory::ALL
            .into_iter()
            .map(|category| self.hidden_count_for(category))
            .sum()
    }

    pub fn any_items(&self) -> bool {
        self.categories.values().any(|entries| !entries.is_empty())
    }

    /// Whether entries come from more than one context, so each row should
    /// name its context.
    pub fn show_context(&self) -> bool {
        let contexts: BTreeSet<ContextRef> = self
            .categories
            .values()
            .flatten()
            .map(|entry| entry.context)
            .collect();
        contexts.len() > 1
    }

    /// List with no entries.
    pub fn empty(visible_limit: usize) -> Self {
        Self::new(BTreeMap::new(), visible_limit)
    }

    /// Serialisable view of what a template renders.
    pub fn snapshot(&self) -> TodoListSnapshot {
        TodoListSnapshot {
            categories: TodoCategory::ALL
                .into_iter()
                .map(|category| CategorySnapshot {
                    category,
                    visible: self.visible(category).to_vec(),
                    hidden_count: self.hidden_count_for(category),
                })
                .collect(),
            total_hidden_count: self.total_hidden_count(),
            any_items: self.any_items(),
            show_context: self.show_context(),
        }
    }
}

/// Rendered state of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySnapshot {
    pub category: TodoCategory,
    pub visible: Vec<TodoEntry>,
    pub hidden_count: usize,
}

/// Rendered state of a whole [`TodoList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoListSnapshot {
    pub categories: Vec<CategorySnapshot>,
    pub total_hidden_count: usize,
    pub any_items: bool,
    pub show_context: bool,
}

/// Builds [`TodoList`]s from the needs-queries.
pub struct TodoListPresenter<S, D, P, C> {
    needs: Arc<NeedsQueryBuilder<S, D, P, C>>,
    config: PresenterConfig,
}

impl<S, D, P, C> TodoListPresenter<S, D, P, C>
where
    S: LearningObjectStore,
    D: MembershipDirectory,
    P: PermissionEngine,
    C: TodoCache,
{
    pub fn new(needs: Arc<NeedsQueryBuilder<S, D, P, C>>, config: PresenterConfig) -> Self {
        Self { needs, config }
    }

    /// Gather and shape every category for `user`.
    pub async fn build(&self, user: UserId) -> Result<TodoList, Error> {
        let options = NeedsOptions::with_limit(Some(self.config.fetch_limit));

        let mut grading = self.merged_grading(user, &options).await?;
        let moderation = self
            .needs
            .assignments_needing_moderation(user, &options)
            .await?;
        let submitting = self.merged_submitting(user, &options).await?;
        let reviewing = self
            .needs
            .assessment_requests_needing_review(user, &options)
            .await?;

        let contexts: Vec<ContextRef> = grading
            .iter()
            .chain(&moderation)
            .chain(&submitting)
            .map(|todo| ContextRef::Course(todo.assignment.course_id))
            .chain(
                reviewing
                    .iter()
                    .map(|todo| ContextRef::Course(todo.request.course_id)),
            )
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let permissions = if contexts.is_empty() {
            PermissionMatrix::new()
        } else {
            self.needs
                .permissions()
                .precalculate_permissions(user, &contexts, &GRADING_PERMISSIONS)
                .await?
        };
        grading.retain(|todo| {
            permissions.allows_any(
                ContextRef::Course(todo.assignment.course_id),
                &GRADING_PERMISSIONS,
            )
        });

        let names = self.context_names(&contexts).await?;
        let named = |mut entry: TodoEntry| {
            entry.context_name = names
                .get(&entry.context)
                .cloned()
                .unwrap_or_else(|| entry.context.asset_string());
            entry
        };
        let assignments = |category: TodoCategory, todos: Vec<AssignmentTodo>| {
            let entries: Vec<TodoEntry> = todos
                .into_iter()
                .map(|todo| named(TodoEntry::from_assignment(todo, category.purpose())))
                .collect();
            (category, entries)
        };

        let categories = BTreeMap::from([
            assignments(TodoCategory::Grading, grading),
            assignments(TodoCategory::Moderation, moderation),
            assignments(TodoCategory::Submitting, submitting),
            (
                TodoCategory::Reviewing,
                reviewing
                    .into_iter()
                    .map(|todo| named(TodoEntry::from_review(todo)))
                    .collect(),
            ),
        ]);
        let list = TodoList::new(categories, self.config.visible_limit);
        debug!(
            user = %user,
            contexts = contexts.len(),
            hidden = list.total_hidden_count(),
            "built to-do list"
        );
        Ok(list)
    }

    async fn merged_grading(
        &self,
        user: UserId,
        options: &NeedsOptions,
    ) -> Result<Vec<AssignmentTodo>, Error> {
        let mut merged = self
            .needs
            .assignments_needing_grading(AssignmentKind::Assignment, user, options)
            .await?;
        merged.extend(
            self.needs
                .assignments_needing_grading(AssignmentKind::SubAssignment, user, options)
                .await?,
        );
        sort_todos(&mut merged);
        options.truncate(&mut merged);
        Ok(merged)
    }

    async fn merged_submitting(
        &self,
        user: UserId,
        options: &NeedsOptions,
    ) -> Result<Vec<AssignmentTodo>, Error> {
        let submitting = SubmittingOptions::default();
        let mut merged = self
            .needs
            .assignments_needing_submitting(AssignmentKind::Assignment, user, options, submitting)
            .await?;
        merged.extend(
            self.needs
                .assignments_needing_submitting(
                    AssignmentKind::SubAssignment,
                    user,
                    options,
                    submitting,
                )
                .await?,
        );
        sort_todos(&mut merged);
        options.truncate(&mut merged);
        Ok(merged)
    }

    /// Display names of `contexts`, read shard by shard.
    async fn context_names(
        &self,
        contexts: &[ContextRef],
    ) -> Result<BTreeMap<ContextRef, String>, Error> {
        let partition: ShardPartition<ContextRef> = contexts.iter().copied().collect();
        let mut names = BTreeMap::new();
        for (shard, contexts) in partition.iter() {
            let course_ids: Vec<CourseId> = contexts
                .iter()
                .filter_map(|context| context.as_course())
                .collect();
            let group_ids: Vec<GroupId> = contexts
                .iter()
                .filter_map(|context| context.as_group())
                .collect();
            if !course_ids.is_empty() {
                for course in self.needs.store().courses(shard, &course_ids).await? {
                    names.insert(ContextRef::Course(course.id), course.name);
                }
            }
            if !group_ids.is_empty() {
                for group in self.needs.store().groups(shard, &group_ids).await? {
                    names.insert(ContextRef::Group(group.id), group.name);
                }
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    //! List shaping; end-to-end presenter behaviour lives in `tests/`.
    use super::*;
    use rstest::rstest;

    fn entry(id: i64, course: i64) -> TodoEntry {
        TodoEntry {
            kind: ObjectKind::Assignment,
            purpose: Purpose::Grading,
            id,
            title: format!("Assignment {id}"),
            context: ContextRef::Course(CourseId::new(course)),
            context_name: format!("Course {course}"),
            due_at: None,
            needs_grading_count: Some(1),
        }
    }

    fn list_with(category: TodoCategory, count: usize, courses: i64) -> TodoList {
        let entries = (0..count)
            .map(|index| {
                let id = i64::try_from(index).unwrap_or_default();
                entry(id, id % courses)
            })
            .collect();
        TodoList::new(BTreeMap::from([(category, entries)]), DEFAULT_VISIBLE_LIMIT)
    }

    #[rstest]
    #[case(0, 0)]
    #[case(3, 0)]
    #[case(5, 0)]
    #[case(8, 3)]
    #[case(100, 95)]
    fn hidden_count_is_overflow_past_visible_limit(#[case] count: usize, #[case] hidden: usize) {
        let list = list_with(TodoCategory::Submitting, count, 1);

        assert_eq!(list.hidden_count_for(TodoCategory::Submitting), hidden);
        assert_eq!(
            list.visible(TodoCategory::Submitting).len(),
            count.min(DEFAULT_VISIBLE_LIMIT)
        );
        assert_eq!(list.any_items(), count > 0);
    }

    #[rstest]
    fn total_hidden_count_sums_every_category() {
        let grading = (0..8).map(|id| entry(id, 1)).collect();
        let reviewing = (0..7).map(|id| entry(100 + id, 1)).collect();
        let list = TodoList::new(
            BTreeMap::from([
                (TodoCategory::Grading, grading),
                (TodoCategory::Reviewing, reviewing),
            ]),
            DEFAULT_VISIBLE_LIMIT,
        );

        assert_eq!(list.total_hidden_count(), 5);
        assert_eq!(list.hidden_count_for(TodoCategory::Moderation), 0);
    }

    #[rstest]
    #[case(1, false)]
    #[case(2, true)]
    fn context_names_shown_only_for_several_contexts(
        #[case] courses: i64,
        #[case] shown: bool,
    ) {
        let list = list_with(TodoCategory::Grading, 4, courses);
        assert_eq!(list.show_context(), shown);
    }

    #[rstest]
    fn snapshot_serialises_camel_case_fields() {
        let list = list_with(TodoCategory::Grading, 6, 1);

        let json = serde_json::to_value(list.snapshot()).expect("serialise");

        assert_eq!(json["totalHiddenCount"], 1);
        assert_eq!(json["categories"][0]["category"], "grading");
        assert_eq!(json["categories"][0]["hiddenCount"], 1);
        assert_eq!(
            json["categories"][0]["visible"][0]["needsGradingCount"],
            1
        );
        assert_eq!(
            json["categories"][0]["visible"][0]["contextName"],
            "Course 0"
        );
    }
}
