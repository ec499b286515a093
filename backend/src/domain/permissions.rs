//! Permissions consulted while building to-do lists.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::ids::ContextRef;

/// Context-level permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Enter and change grades.
    ManageGrades,
    /// Read every student's grades.
    ViewAllGrades,
    /// Pick the final grade of a moderated assignment.
    SelectFinalGrade,
}

/// Result of a bulk permission pre-fetch: granted permissions per context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionMatrix(BTreeMap<ContextRef, BTreeSet<Permission>>);

impl PermissionMatrix {
    /// Empty matrix; grants nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `permission` is granted on `context`.
    pub fn grant(&mut self, context: ContextRef, permission: Permission) {
        self.0.entry(context).or_default().insert(permission);
    }

    /// Whether `permission` is granted on `context`.
    pub fn allows(&self, context: ContextRef, permission: Permission) -> bool {
        self.0
            .get(&context)
            .is_some_and(|granted| granted.contains(&permission))
    }

    /// Whether any of `permissions` is granted on `context`.
    pub fn allows_any(&self, context: ContextRef, permissions: &[Permission]) -> bool {
        permissions
            .iter()
            .any(|permission| self.allows(context, *permission))
    }
}

impl FromIterator<(ContextRef, Permission)> for PermissionMatrix {
    fn from_iter<T: IntoIterator<Item = (ContextRef, Permission)>>(iter: T) -> Self {
        let mut matrix = Self::new();
        for (context, permission) in iter {
            matrix.grant(context, permission);
        }
        matrix
    }
}
