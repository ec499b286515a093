//! In-memory deployment shared by the behaviour tests.
//!
//! Course 1 lives on shard 0 and course `remote(1)` on shard 1; tests add
//! rows to [`LearningTables`] before building a [`World`].
#![allow(dead_code)]

use std::sync::Arc;

use todo_backend::domain::{
    ContextRef, CourseId, EnrollmentRole, IDS_PER_SHARD, IgnoreLedger, NeedsConfig,
    NeedsQueryBuilder, Permission, UserId,
};
use todo_backend::outbound::memory::{
    InMemoryLearningStore, InMemoryTodoCache, LearningTables, PermissionGrant,
    StaticPermissionEngine, UserMemberships,
};
use todo_backend::presenter::{PresenterConfig, TodoListPresenter};
use todo_backend::test_support::MutableClock;
use todo_backend::test_support::fixtures::{membership, now};

pub type Needs = NeedsQueryBuilder<
    InMemoryLearningStore,
    InMemoryLearningStore,
    StaticPermissionEngine,
    InMemoryTodoCache,
>;

/// Global id of local id `id` on shard 1.
pub fn remote(id: i64) -> i64 {
    IDS_PER_SHARD + id
}

pub fn memberships(user: UserId, courses: &[(i64, EnrollmentRole)]) -> UserMemberships {
    UserMemberships {
        user_id: user,
        courses: courses
            .iter()
            .map(|(id, role)| membership(*id, *role))
            .collect(),
        groups: Vec::new(),
    }
}

pub fn grant(user: UserId, course: i64, permission: Permission) -> PermissionGrant {
    PermissionGrant {
        user_id: user,
        context: ContextRef::Course(CourseId::new(course)),
        permission,
    }
}

pub struct World {
    pub store: Arc<InMemoryLearningStore>,
    pub permissions: Arc<StaticPermissionEngine>,
    pub cache: Arc<InMemoryTodoCache>,
    pub clock: Arc<MutableClock>,
    pub needs: Arc<Needs>,
}

impl World {
    pub fn new(tables: LearningTables, grants: Vec<PermissionGrant>) -> Self {
        let store = Arc::new(InMemoryLearningStore::new(tables));
        let permissions = Arc::new(StaticPermissionEngine::new(grants));
        let clock = Arc::new(MutableClock::new(now()));
        let cache = Arc::new(InMemoryTodoCache::new(clock.clone()));
        let needs = Arc::new(NeedsQueryBuilder::new(
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::clone(&permissions),
            Arc::clone(&cache),
            clock.clone(),
            NeedsConfig::default(),
        ));
        Self {
            store,
            permissions,
            cache,
            clock,
            needs,
        }
    }

    pub fn presenter(
        &self,
        config: PresenterConfig,
    ) -> TodoListPresenter<
        InMemoryLearningStore,
        InMemoryLearningStore,
        StaticPermissionEngine,
        InMemoryTodoCache,
    > {
        TodoListPresenter::new(Arc::clone(&self.needs), config)
    }

    pub fn ledger(&self) -> IgnoreLedger<InMemoryLearningStore, InMemoryTodoCache> {
        IgnoreLedger::new(Arc::clone(&self.store), Arc::clone(&self.cache))
    }
}
