//! Scope resolution: which courses and groups a to-do query covers.
//!
//! The resolver starts from the user's default context set (derived from
//! memberships and, optionally, a permission), intersects it with whatever
//! explicit filters the caller supplied and partitions the survivors by the
//! shard that owns each id. Downstream queries fan out over that partition.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::domain::ports::{MembershipDirectory, PermissionEngine};
use crate::domain::{ContextRef, CourseId, Error, GroupId, Permission, ShardId, Sharded, UserId};

/// Ids grouped by owning shard, sorted and deduplicated within each shard.
///
/// Iteration is in ascending shard order, so fan-out over a partition is
/// deterministic.
///
/// # Examples
/// ```
/// use todo_backend::domain::{CourseId, IDS_PER_SHARD, ShardPartition};
///
/// let partition: ShardPartition<CourseId> = [
///     CourseId::new(IDS_PER_SHARD + 2),
///     CourseId::new(7),
///     CourseId::new(IDS_PER_SHARD + 2),
/// ]
/// .into_iter()
/// .collect();
///
/// assert_eq!(partition.shard_count(), 2);
/// assert_eq!(partition.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPartition<T>(BTreeMap<ShardId, Vec<T>>);

impl<T> Default for ShardPartition<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T> ShardPartition<T>
where
    T: Sharded + Ord + Copy,
{
    /// Empty partition.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether no id is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of ids across all shards.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Number of shards holding at least one id.
    pub fn shard_count(&self) -> usize {
        self.0.len()
    }

    /// Ids owned by `shard`.
    pub fn get(&self, shard: ShardId) -> &[T] {
        self.0.get(&shard).map_or(&[], Vec::as_slice)
    }

    /// Whether `id` is part of the partition.
    pub fn contains(&self, id: T) -> bool {
        self.get(id.shard()).binary_search(&id).is_ok()
    }

    /// `(shard, ids)` pairs in ascending shard order.
    pub fn iter(&self) -> impl Iterator<Item = (ShardId, &[T])> {
        self.0.iter().map(|(shard, ids)| (*shard, ids.as_slice()))
    }

    /// Every id, shard by shard.
    pub fn ids(&self) -> impl Iterator<Item = T> + '_ {
        self.0.values().flatten().copied()
    }

    /// Keep only the ids matching `keep`, dropping shards left empty.
    pub fn retain(&mut self, mut keep: impl FnMut(T) -> bool) {
        self.0.retain(|_, ids| {
            ids.retain(|id| keep(*id));
            !ids.is_empty()
        });
    }
}

impl<T> FromIterator<T> for ShardPartition<T>
where
    T: Sharded + Ord + Copy,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut grouped: BTreeMap<ShardId, BTreeSet<T>> = BTreeMap::new();
        for id in iter {
            grouped.entry(id.shard()).or_default().insert(id);
        }
        Self(
            grouped
                .into_iter()
                .map(|(shard, ids)| (shard, ids.into_iter().collect()))
                .collect(),
        )
    }
}

/// Which memberships make up the default course set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePermission {
    /// Active student enrollments.
    Participate,
    /// Active teacher or TA enrollments.
    Instruct,
    /// Active enrollments in courses where the permission engine grants the
    /// permission.
    Grant(Permission),
}

/// Input to [`ScopeResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRequest {
    pub permission: ScopePermission,
    /// Explicit course filter. `Some(vec![])` resolves to no courses.
    pub course_ids: Option<Vec<CourseId>>,
    /// Explicit group filter. `Some(vec![])` resolves to no groups.
    pub group_ids: Option<Vec<GroupId>>,
    /// Explicit contexts; courses filter the course side and groups the
    /// group side.
    pub contexts: Option<Vec<ContextRef>>,
    /// Use every course membership, concluded ones included.
    pub include_concluded: bool,
}

impl ScopeRequest {
    /// Request with no explicit filters.
    pub fn new(permission: ScopePermission) -> Self {
        Self {
            permission,
            course_ids: None,
            group_ids: None,
            contexts: None,
            include_concluded: false,
        }
    }

    fn course_filter(&self) -> Option<BTreeSet<CourseId>> {
        explicit_filter(
            self.course_ids.as_deref(),
            self.contexts
                .as_ref()
                .map(|contexts| contexts.iter().filter_map(|c| c.as_course()).collect()),
        )
    }

    fn group_filter(&self) -> Option<BTreeSet<GroupId>> {
        explicit_filter(
            self.group_ids.as_deref(),
            self.contexts
                .as_ref()
                .map(|contexts| contexts.iter().filter_map(|c| c.as_group()).collect()),
        )
    }
}

fn explicit_filter<T: Ord + Copy>(
    ids: Option<&[T]>,
    from_contexts: Option<BTreeSet<T>>,
) -> Option<BTreeSet<T>> {
    match (ids, from_contexts) {
        (None, None) => None,
        (Some(ids), None) => Some(ids.iter().copied().collect()),
        (None, Some(from_contexts)) => Some(from_contexts),
        (Some(ids), Some(from_contexts)) => Some(
            ids.iter()
                .copied()
                .filter(|id| from_contexts.contains(id))
                .collect(),
        ),
    }
}

/// Courses and groups a query covers, partitioned by shard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedScope {
    pub course_ids: ShardPartition<CourseId>,
    pub group_ids: ShardPartition<GroupId>,
}

impl ResolvedScope {
    /// Whether neither side holds an id.
    pub fn is_empty(&self) -> bool {
        self.course_ids.is_empty() && self.group_ids.is_empty()
    }

    /// Every context in the scope, courses first.
    pub fn contexts(&self) -> Vec<ContextRef> {
        self.course_ids
            .ids()
            .map(ContextRef::Course)
            .chain(self.group_ids.ids().map(ContextRef::Group))
            .collect()
    }

    /// Contexts grouped by shard.
    pub fn context_partition(&self) -> ShardPartition<ContextRef> {
        self.contexts().into_iter().collect()
    }
}

/// Resolves the contexts relevant to a to-do query.
#[derive(Clone)]
pub struct ScopeResolver<D, P> {
    directory: Arc<D>,
    permissions: Arc<P>,
}

impl<D, P> ScopeResolver<D, P> {
    /// Create a resolver over the given directory and permission engine.
    pub fn new(directory: Arc<D>, permissions: Arc<P>) -> Self {
        Self {
            directory,
            permissions,
        }
    }
}

impl<D, P> ScopeResolver<D, P>
where
    D: MembershipDirectory,
    P: PermissionEngine,
{
    /// Resolve `request` for `user`.
    ///
    /// Explicit filters that are present but empty short-circuit their side
    /// without consulting the directory.
    pub async fn resolve(
        &self,
        user: UserId,
        request: &ScopeRequest,
    ) -> Result<ResolvedScope, Error> {
        let course_ids = match request.course_filter() {
            Some(filter) if filter.is_empty() => ShardPartition::empty(),
            filter => {
                let defaults = self.default_courses(user, request).await?;
                intersect(defaults, filter.as_ref())
            }
        };

        let group_ids = match request.group_filter() {
            Some(filter) if filter.is_empty() => ShardPartition::empty(),
            filter => {
                let defaults = self.directory.group_ids(user).await?;
                intersect(defaults, filter.as_ref())
            }
        };

        debug!(
            user = %user,
            courses = course_ids.len(),
            groups = group_ids.len(),
            shards = course_ids.shard_count().max(group_ids.shard_count()),
            "resolved to-do scope"
        );
        Ok(ResolvedScope {
            course_ids,
            group_ids,
        })
    }

    async fn default_courses(
        &self,
        user: UserId,
        request: &ScopeRequest,
    ) -> Result<Vec<CourseId>, Error> {
        let memberships = self.directory.course_memberships(user).await?;
        if request.include_concluded {
            return Ok(memberships.iter().map(|m| m.course_id).collect());
        }

        let current = memberships.iter().filter(|m| m.is_current());
        match request.permission {
            ScopePermission::Participate => Ok(current
                .filter(|m| m.role.is_student())
                .map(|m| m.course_id)
                .collect()),
            ScopePermission::Instruct => Ok(current
                .filter(|m| m.role.is_instructor())
                .map(|m| m.course_id)
                .collect()),
            ScopePermission::Grant(permission) => {
                let candidates: Vec<CourseId> = current.map(|m| m.course_id).collect();
                self.granted_courses(user, candidates, permission).await
            }
        }
    }

    async fn granted_courses(
        &self,
        user: UserId,
        candidates: Vec<CourseId>,
        permission: Permission,
    ) -> Result<Vec<CourseId>, Error> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let contexts: Vec<ContextRef> = candidates.iter().copied().map(ContextRef::Course).collect();
        let matrix = self
            .permissions
            .precalculate_permissions(user, &contexts, &[permission])
            .await?;
        Ok(candidates
            .into_iter()
            .filter(|id| matrix.allows(ContextRef::Course(*id), permission))
            .collect())
    }
}

fn intersect<T>(defaults: Vec<T>, filter: Option<&BTreeSet<T>>) -> ShardPartition<T>
where
    T: Sharded + Ord + Copy,
{
    defaults
        .into_iter()
        .filter(|id| filter.is_none_or(|filter| filter.contains(id)))
        .collect()
}
