//! Aggregation cache behaviour observed through the needs-queries.

#[path = "support/world.rs"]
mod in_memory;

use std::time::Duration;

use rstest::{fixture, rstest};
use todo_backend::domain::{
    AssignmentKind, AssignmentTodo, DEFAULT_CACHE_TTL, EnrollmentRole, NeedsOptions,
    SubmittingOptions, UserId,
};
use todo_backend::outbound::memory::LearningTables;
use todo_backend::test_support::fixtures::{assignment, course};
use in_memory::{World, memberships, remote};

const STUDENT: UserId = UserId::new(1);

#[fixture]
fn world() -> World {
    let tables = LearningTables {
        memberships: vec![memberships(
            STUDENT,
            &[
                (1, EnrollmentRole::Student),
                (remote(1), EnrollmentRole::Student),
            ],
        )],
        courses: vec![course(1), course(remote(1))],
        assignments: vec![assignment(10, 1), assignment(remote(10), remote(1))],
        ..LearningTables::default()
    };
    World::new(tables, Vec::new())
}

async fn submitting(world: &World, options: &NeedsOptions) -> Vec<AssignmentTodo> {
    world
        .needs
        .assignments_needing_submitting(
            AssignmentKind::Assignment,
            STUDENT,
            options,
            SubmittingOptions::default(),
        )
        .await
        .expect("submitting query succeeds")
}

#[rstest]
#[tokio::test]
async fn repeated_queries_are_served_from_the_cache(world: World) {
    let first = submitting(&world, &NeedsOptions::default()).await;
    let reads = world.store.read_count();

    let second = submitting(&world, &NeedsOptions::default()).await;

    assert_eq!(first, second);
    assert_eq!(world.store.read_count(), reads);
    assert_eq!(world.cache.write_count(), 1);
}

#[rstest]
#[tokio::test]
async fn different_options_are_cached_separately(world: World) {
    let all = submitting(&world, &NeedsOptions::default()).await;
    let one = submitting(&world, &NeedsOptions::with_limit(Some(1))).await;

    assert_eq!(all.len(), 2);
    assert_eq!(one.len(), 1);
    assert_eq!(world.cache.write_count(), 2);
}

#[rstest]
#[tokio::test]
async fn expired_entries_are_recomputed(world: World) {
    submitting(&world, &NeedsOptions::default()).await;
    world
        .clock
        .advance(DEFAULT_CACHE_TTL - Duration::from_secs(1));
    submitting(&world, &NeedsOptions::default()).await;
    assert_eq!(world.cache.write_count(), 1);

    world.clock.advance(Duration::from_secs(2));
    submitting(&world, &NeedsOptions::default()).await;

    assert_eq!(world.cache.write_count(), 2);
}

#[rstest]
#[tokio::test]
async fn touching_a_user_invalidates_only_their_entries(world: World) {
    let other = UserId::new(7);
    world.store.edit(|tables| {
        tables.memberships.push(memberships(other, &[(1, EnrollmentRole::Student)]));
    });
    submitting(&world, &NeedsOptions::default()).await;
    world
        .needs
        .assignments_needing_submitting(
            AssignmentKind::Assignment,
            other,
            &NeedsOptions::default(),
            SubmittingOptions::default(),
        )
        .await
        .expect("submitting query succeeds");
    assert_eq!(world.cache.write_count(), 2);

    world.needs.cache().touch(STUDENT).await.expect("touch succeeds");
    submitting(&world, &NeedsOptions::default()).await;
    world
        .needs
        .assignments_needing_submitting(
            AssignmentKind::Assignment,
            other,
            &NeedsOptions::default(),
            SubmittingOptions::default(),
        )
        .await
        .expect("submitting query succeeds");

    assert_eq!(world.cache.write_count(), 3);
}
