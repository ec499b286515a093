//! Discussion topics and wiki pages with a to-do date.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::{NeedsOptions, NeedsQueryBuilder, NeedsScope, TodoOrder, fan_out, sort_todos};
use crate::domain::ports::{LearningObjectStore, MembershipDirectory, PermissionEngine, TodoCache};
use crate::domain::{
    ContextRef, DiscussionTopicRow, Error, ObjectKind, Purpose, ResolvedScope, ScopePermission,
    ShardId, UserId, WikiPageRow, WikiPageState,
};

impl TodoOrder for DiscussionTopicRow {
    fn sort_key(&self) -> (DateTime<Utc>, i64) {
        (self.todo_date.unwrap_or(self.updated_at), self.id.get())
    }
}

impl TodoOrder for WikiPageRow {
    fn sort_key(&self) -> (DateTime<Utc>, i64) {
        (self.todo_date.unwrap_or(self.updated_at), self.id.get())
    }
}

impl<S, D, P, C> NeedsQueryBuilder<S, D, P, C>
where
    S: LearningObjectStore,
    D: MembershipDirectory,
    P: PermissionEngine,
    C: TodoCache,
{
    /// Published discussion topics with a to-do date in the window.
    pub async fn discussion_topics_needing_viewing(
        &self,
        user: UserId,
        options: &NeedsOptions,
    ) -> Result<Vec<DiscussionTopicRow>, Error> {
        let scope = self.viewing_scope(user, options).await?;
        if scope.is_empty() {
            return Ok(Vec::new());
        }
        let params = json!({ "options": options });
        self.cached(
            user,
            ObjectKind::DiscussionTopic,
            Purpose::Viewing,
            &scope,
            params,
            || async {
                let mut items = self.collect_topics(user, &scope, options).await?;
                options.truncate(&mut items);
                Ok(items)
            },
        )
        .await
    }

    /// Uncached, unlimited form of
    /// [`Self::discussion_topics_needing_viewing`].
    pub fn discussion_topics_needing_viewing_scope(
        &self,
        user: UserId,
        options: NeedsOptions,
    ) -> NeedsScope<'_, DiscussionTopicRow> {
        NeedsScope::new(async move {
            let scope = self.viewing_scope(user, &options).await?;
            self.collect_topics(user, &scope, &options).await
        })
    }

    /// Published wiki pages with a to-do date in the window.
    pub async fn wiki_pages_needing_viewing(
        &self,
        user: UserId,
        options: &NeedsOptions,
    ) -> Result<Vec<WikiPageRow>, Error> {
        let scope = self.viewing_scope(user, options).await?;
        if scope.is_empty() {
            return Ok(Vec::new());
        }
        let params = json!({ "options": options });
        self.cached(
            user,
            ObjectKind::WikiPage,
            Purpose::Viewing,
            &scope,
            params,
            || async {
                let mut items = self.collect_pages(user, &scope, options).await?;
                options.truncate(&mut items);
                Ok(items)
            },
        )
        .await
    }

    /// Uncached, unlimited form of [`Self::wiki_pages_needing_viewing`].
    pub fn wiki_pages_needing_viewing_scope(
        &self,
        user: UserId,
        options: NeedsOptions,
    ) -> NeedsScope<'_, WikiPageRow> {
        NeedsScope::new(async move {
            let scope = self.viewing_scope(user, &options).await?;
            self.collect_pages(user, &scope, &options).await
        })
    }

    async fn viewing_scope(
        &self,
        user: UserId,
        options: &NeedsOptions,
    ) -> Result<ResolvedScope, Error> {
        self.scopes
            .resolve(user, &options.scope_request(ScopePermission::Participate))
            .await
    }

    async fn collect_topics(
        &self,
        user: UserId,
        scope: &ResolvedScope,
        options: &NeedsOptions,
    ) -> Result<Vec<DiscussionTopicRow>, Error> {
        let ignored = self
            .ignored(user, ObjectKind::DiscussionTopic, Purpose::Viewing, options)
            .await?;
        let ignored = &ignored;
        let now = self.now();
        let contexts = scope.context_partition();
        let mut items = fan_out(&contexts, |shard, contexts| {
            self.topics_on_shard(user, shard, contexts, options, ignored, now)
        })
        .await?;
        sort_todos(&mut items);
        Ok(items)
    }

    async fn topics_on_shard(
        &self,
        user: UserId,
        shard: ShardId,
        contexts: &[ContextRef],
        options: &NeedsOptions,
        ignored: &BTreeSet<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DiscussionTopicRow>, Error> {
        Ok(self
            .store
            .discussion_topics(shard, contexts)
            .await?
            .into_iter()
            .filter(|topic| topic.is_published() && topic.is_visible_to(user))
            .filter(|topic| topic.todo_date.is_some() && options.within_window(topic.todo_date))
            .filter(|topic| !topic.is_locked_announcement(now))
            .filter(|topic| !ignored.contains(&topic.id.get()))
            .collect())
    }

    async fn collect_pages(
        &self,
        user: UserId,
        scope: &ResolvedScope,
        options: &NeedsOptions,
    ) -> Result<Vec<WikiPageRow>, Error> {
        let ignored = self
            .ignored(user, ObjectKind::WikiPage, Purpose::Viewing, options)
            .await?;
        let ignored = &ignored;
        let contexts = scope.context_partition();
        let mut items = fan_out(&contexts, |shard, contexts| {
            self.pages_on_shard(user, shard, contexts, options, ignored)
        })
        .await?;
        sort_todos(&mut items);
        Ok(items)
    }

    async fn pages_on_shard(
        &self,
        user: UserId,
        shard: ShardId,
        contexts: &[ContextRef],
        options: &NeedsOptions,
        ignored: &BTreeSet<i64>,
    ) -> Result<Vec<WikiPageRow>, Error> {
        Ok(self
            .store
            .wiki_pages(shard, contexts)
            .await?
            .into_iter()
            .filter(|page| page.workflow_state == WikiPageState::Active)
            .filter(|page| page.is_visible_to(user))
            .filter(|page| page.todo_date.is_some() && options.within_window(page.todo_date))
            .filter(|page| !ignored.contains(&page.id.get()))
            .collect())
    }
}
