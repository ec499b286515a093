//! Purposes a learning object can appear on a to-do list for, and the kinds
//! of learning object the lists are built from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a learning object needs the user's attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// Submissions wait for the user's grade.
    Grading,
    /// Provisional grades wait for the user's final grade selection.
    Moderation,
    /// The user still has to submit.
    Submitting,
    /// A peer review is assigned to the user.
    Reviewing,
    /// Content the user should look at before a todo date.
    Viewing,
    /// The user's own submissions.
    Submitted,
}

impl Purpose {
    /// All purposes in their fixed enumeration order.
    pub const ALL: [Self; 6] = [
        Self::Grading,
        Self::Moderation,
        Self::Submitting,
        Self::Reviewing,
        Self::Viewing,
        Self::Submitted,
    ];

    /// Stable string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grading => "grading",
            Self::Moderation => "moderation",
            Self::Submitting => "submitting",
            Self::Reviewing => "reviewing",
            Self::Viewing => "viewing",
            Self::Submitted => "submitted",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown purpose or object kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseTodoTermError {
    /// The purpose string is not recognised.
    #[error("unknown to-do purpose: {0}")]
    Purpose(String),
    /// The object kind string is not recognised.
    #[error("unsupported learning object kind: {0}")]
    ObjectKind(String),
}

impl FromStr for Purpose {
    type Err = ParseTodoTermError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|purpose| purpose.as_str() == s)
            .ok_or_else(|| ParseTodoTermError::Purpose(s.to_owned()))
    }
}

/// Kind of learning object a needs-query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Plain assignment.
    Assignment,
    /// Checkpoint of a discussion assignment.
    SubAssignment,
    /// Quiz.
    Quiz,
    /// Discussion topic or announcement.
    DiscussionTopic,
    /// Wiki page.
    WikiPage,
    /// Peer review request.
    AssessmentRequest,
}

impl ObjectKind {
    /// All kinds.
    pub const ALL: [Self; 6] = [
        Self::Assignment,
        Self::SubAssignment,
        Self::Quiz,
        Self::DiscussionTopic,
        Self::WikiPage,
        Self::AssessmentRequest,
    ];

    /// Stable string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assignment => "assignment",
            Self::SubAssignment => "sub_assignment",
            Self::Quiz => "quiz",
            Self::DiscussionTopic => "discussion_topic",
            Self::WikiPage => "wiki_page",
            Self::AssessmentRequest => "assessment_request",
        }
    }

    /// Cache namespace for this kind and purpose, e.g. `assignment_grading`.
    pub fn cache_namespace(self, purpose: Purpose) -> String {
        format!("{}_{}", self.as_str(), purpose.as_str())
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = ParseTodoTermError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseTodoTermError::ObjectKind(s.to_owned()))
    }
}
