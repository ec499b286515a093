//! Options accepted by the needs-queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ContextRef, CourseId, GroupId, ScopePermission, ScopeRequest};

/// Number of items a needs-query returns unless told otherwise.
pub const DEFAULT_LIMIT: usize = 15;

/// Options shared by every needs-query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedsOptions {
    /// Truncate results to this many items; `None` returns everything.
    pub limit: Option<usize>,
    /// Only objects due at or after this instant.
    pub due_after: Option<DateTime<Utc>>,
    /// Only objects due at or before this instant.
    pub due_before: Option<DateTime<Utc>>,
    /// Keep objects the user has ignored.
    pub include_ignored: bool,
    /// Resolve the scope from every course membership, concluded ones
    /// included.
    pub include_concluded: bool,
    pub course_ids: Option<Vec<CourseId>>,
    pub group_ids: Option<Vec<GroupId>>,
    pub contexts: Option<Vec<ContextRef>>,
}

impl Default for NeedsOptions {
    fn default() -> Self {
        Self {
            limit: Some(DEFAULT_LIMIT),
            due_after: None,
            due_before: None,
            include_ignored: false,
            include_concluded: false,
            course_ids: None,
            group_ids: None,
            contexts: None,
        }
    }
}

impl NeedsOptions {
    /// Default options with a different limit.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Scope request carrying the explicit filters of these options.
    pub fn scope_request(&self, permission: ScopePermission) -> ScopeRequest {
        ScopeRequest {
            permission,
            course_ids: self.course_ids.clone(),
            group_ids: self.group_ids.clone(),
            contexts: self.contexts.clone(),
            include_concluded: self.include_concluded,
        }
    }

    /// Whether `due_at` falls inside the due window. Objects without a due
    /// date only pass when no window bound is set.
    pub fn within_window(&self, due_at: Option<DateTime<Utc>>) -> bool {
        if self.due_after.is_none() && self.due_before.is_none() {
            return true;
        }
        let Some(due_at) = due_at else {
            return false;
        };
        self.due_after.is_none_or(|after| due_at >= after)
            && self.due_before.is_none_or(|before| due_at <= before)
    }

    /// Apply the limit to `items`.
    pub fn truncate<T>(&self, items: &mut Vec<T>) {
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
    }
}

/// Extra options of the submitting queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittingOptions {
    /// Drop the expecting-a-submission filter.
    pub include_ungraded: bool,
    /// Keep assignments that are locked for the user.
    pub include_locked: bool,
}

/// Extra options of the ungraded quiz query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOptions {
    /// Only quizzes the user has not completed yet.
    pub needing_submission_only: bool,
}
