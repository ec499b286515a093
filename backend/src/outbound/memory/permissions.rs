//! Permission engine backed by a fixed grant list.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ports::{PermissionEngine, PermissionEngineError};
use crate::domain::{ContextRef, Permission, PermissionMatrix, UserId};

/// One granted `(user, context, permission)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub user_id: UserId,
    pub context: ContextRef,
    pub permission: Permission,
}

/// Answers from a grant list; anything not listed is denied.
#[derive(Debug, Default)]
pub struct StaticPermissionEngine {
    grants: BTreeSet<PermissionGrant>,
    single_checks: AtomicUsize,
    bulk_checks: AtomicUsize,
}

impl StaticPermissionEngine {
    pub fn new(grants: impl IntoIterator<Item = PermissionGrant>) -> Self {
        Self {
            grants: grants.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Number of `grants_right` calls answered.
    pub fn single_checks(&self) -> usize {
        self.single_checks.load(Ordering::SeqCst)
    }

    /// Number of `precalculate_permissions` calls answered.
    pub fn bulk_checks(&self) -> usize {
        self.bulk_checks.load(Ordering::SeqCst)
    }

    fn allows(&self, user_id: UserId, context: ContextRef, permission: Permission) -> bool {
        self.grants.contains(&PermissionGrant {
            user_id,
            context,
            permission,
        })
    }
}

#[async_trait]
impl PermissionEngine for StaticPermissionEngine {
    async fn grants_right(
        &self,
        actor: UserId,
        context: ContextRef,
        permission: Permission,
    ) -> Result<bool, PermissionEngineError> {
        self.single_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.allows(actor, context, permission))
    }

    async fn precalculate_permissions(
        &self,
        actor: UserId,
        contexts: &[ContextRef],
        permissions: &[Permission],
    ) -> Result<PermissionMatrix, PermissionEngineError> {
        self.bulk_checks.fetch_add(1, Ordering::SeqCst);
        Ok(contexts
            .iter()
            .flat_map(|context| permissions.iter().map(move |permission| (*context, *permission)))
            .filter(|(context, permission)| self.allows(actor, *context, *permission))
            .collect())
    }
}
