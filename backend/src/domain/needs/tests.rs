//! Needs-query behaviour against the in-memory adapters.

use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::domain::{
    AssetRef, AssignmentId, AssessmentRequestId, ContextRef, CourseId, DiscussionTopicId,
    DueDateOverrideRow, EffectiveDates, EnrollmentRole, EnrollmentState, ErrorCode, GroupId,
    IDS_PER_SHARD, IgnoreLedger, IgnoreRow, OverrideTarget, Permission, ProvisionalGradeRow,
    QuizId, QuizSubmissionRow, QuizType, SectionId, SubmissionId, WikiPageId, WikiPageState,
};
use crate::outbound::memory::{
    InMemoryLearningStore, InMemoryTodoCache, LearningTables, PermissionGrant,
    StaticPermissionEngine, UserMemberships,
};
use crate::test_support::MutableClock;
use crate::test_support::fixtures::{
    assessment_request, assignment, course, days, enrollment, membership, now, page, quiz,
    submission, topic,
};

const STUDENT: UserId = UserId::new(1);
const TEACHER: UserId = UserId::new(2);

type TestBuilder = NeedsQueryBuilder<
    InMemoryLearningStore,
    InMemoryLearningStore,
    StaticPermissionEngine,
    InMemoryTodoCache,
>;

/// Global id of local id `id` on shard 1.
fn remote(id: i64) -> i64 {
    IDS_PER_SHARD + id
}

struct World {
    store: Arc<InMemoryLearningStore>,
    permissions: Arc<StaticPermissionEngine>,
    cache: Arc<InMemoryTodoCache>,
    clock: Arc<MutableClock>,
    needs: TestBuilder,
}

fn world(tables: LearningTables, grants: Vec<PermissionGrant>) -> World {
    world_with_config(tables, grants, NeedsConfig::default())
}

fn world_with_config(
    tables: LearningTables,
    grants: Vec<PermissionGrant>,
    config: NeedsConfig,
) -> World {
    let store = Arc::new(InMemoryLearningStore::new(tables));
    let permissions = Arc::new(StaticPermissionEngine::new(grants));
    let clock = Arc::new(MutableClock::new(now()));
    let cache = Arc::new(InMemoryTodoCache::new(clock.clone()));
    let needs = NeedsQueryBuilder::new(
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&permissions),
        Arc::clone(&cache),
        clock.clone(),
        config,
    );
    World {
        store,
        permissions,
        cache,
        clock,
        needs,
    }
}

fn memberships(user: UserId, courses: &[(i64, EnrollmentRole)]) -> UserMemberships {
    UserMemberships {
        user_id: user,
        courses: courses
            .iter()
            .map(|(id, role)| membership(*id, *role))
            .collect(),
        groups: Vec::new(),
    }
}

/// Student enrolled in course 1 on shard 0 and its twin on shard 1.
fn student_tables() -> LearningTables {
    LearningTables {
        memberships: vec![memberships(
            STUDENT,
            &[
                (1, EnrollmentRole::Student),
                (remote(1), EnrollmentRole::Student),
            ],
        )],
        courses: vec![course(1), course(remote(1))],
        ..LearningTables::default()
    }
}

fn grant(user: UserId, course: i64, permission: Permission) -> PermissionGrant {
    PermissionGrant {
        user_id: user,
        context: ContextRef::Course(CourseId::new(course)),
        permission,
    }
}

fn assignment_ids(items: &[AssignmentTodo]) -> Vec<i64> {
    items.iter().map(|todo| todo.assignment.id.get()).collect()
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
async fn submitting_fans_out_across_shards_and_sorts_by_due_date() {
    let mut tables = student_tables();
    let mut later = assignment(10, 1);
    later.due_at = Some(days(3));
    let mut sooner = assignment(remote(10), remote(1));
    sooner.due_at = Some(days(2));
    tables.assignments = vec![later, sooner, assignment(11, 1)];
    let world = world(tables, Vec::new());

    let items = submitting(&world, &NeedsOptions::default()).await;

    assert_eq!(assignment_ids(&items), vec![11, remote(10), 10]);
}

#[rstest]
#[tokio::test]
async fn submitting_applies_overrides_locks_and_existing_submissions() {
    let mut tables = student_tables();
    let mut overdue_submitted = assignment(10, 1);
    overdue_submitted.due_at = Some(days(-1));
    let mut upcoming_submitted = assignment(11, 1);
    upcoming_submitted.due_at = Some(days(2));
    let mut locked = assignment(13, 1);
    locked.lock_at = Some(days(-1));
    tables.assignments = vec![
        overdue_submitted,
        upcoming_submitted,
        assignment(12, 1),
        locked,
    ];
    tables.submissions = vec![submission(100, 10, 1), submission(101, 11, 1)];
    tables.overrides = vec![DueDateOverrideRow {
        target: OverrideTarget::Assignment(AssignmentId::new(12)),
        user_id: STUDENT,
        dates: EffectiveDates {
            due_at: Some(days(5)),
            ..EffectiveDates::default()
        },
    }];
    let world = world(tables, Vec::new());

    let items = submitting(&world, &NeedsOptions::default()).await;
    assert_eq!(assignment_ids(&items), vec![11, 12]);
    assert_eq!(items[1].due_at, Some(days(5)));

    let with_locked = world
        .needs
        .assignments_needing_submitting_scope(
            AssignmentKind::Assignment,
            STUDENT,
            NeedsOptions::default(),
            SubmittingOptions {
                include_locked: true,
                ..SubmittingOptions::default()
            },
        )
        .load(None)
        .await
        .expect("scope loads");
    assert_eq!(assignment_ids(&with_locked), vec![13, 11, 12]);
}

#[rstest]
#[tokio::test]
async fn due_window_is_inclusive_and_drops_undated_assignments() {
    let mut tables = student_tables();
    let mut inside = assignment(10, 1);
    inside.due_at = Some(days(1));
    let mut outside = assignment(12, 1);
    outside.due_at = Some(days(4));
    tables.assignments = vec![inside, assignment(11, 1), outside];
    let world = world(tables, Vec::new());
    let options = NeedsOptions {
        due_after: Some(days(1)),
        due_before: Some(days(3)),
        ..NeedsOptions::default()
    };

    let items = submitting(&world, &options).await;

    assert_eq!(assignment_ids(&items), vec![10]);
}

#[rstest]
#[tokio::test]
async fn explicit_course_filter_narrows_the_scope() {
    let mut tables = student_tables();
    tables.assignments = vec![assignment(10, 1), assignment(remote(10), remote(1))];
    let world = world(tables, Vec::new());
    let options = NeedsOptions {
        course_ids: Some(vec![CourseId::new(remote(1))]),
        ..NeedsOptions::default()
    };

    let items = submitting(&world, &options).await;

    assert_eq!(assignment_ids(&items), vec![remote(10)]);
}

#[rstest]
#[tokio::test]
async fn limit_applies_to_materialised_results_only() {
    let mut tables = student_tables();
    tables.assignments = (10..30).map(|id| assignment(id, 1)).collect();
    let world = world(tables, Vec::new());

    let limited = submitting(&world, &NeedsOptions::default()).await;
    let all = world
        .needs
        .assignments_needing_submitting_scope(
            AssignmentKind::Assignment,
            STUDENT,
            NeedsOptions::default(),
            SubmittingOptions::default(),
        )
        .load(None)
        .await
        .expect("scope loads");

    assert_eq!(limited.len(), DEFAULT_LIMIT);
    assert_eq!(all.len(), 20);
}

fn grading_tables() -> LearningTables {
    let mut graded = submission(103, 10, 6);
    graded.scored = true;
    graded.grade_matches_current_submission = true;
    LearningTables {
        memberships: vec![memberships(
            TEACHER,
            &[
                (1, EnrollmentRole::Teacher),
                (remote(1), EnrollmentRole::Teacher),
                (3, EnrollmentRole::Teacher),
            ],
        )],
        courses: vec![course(1), course(remote(1)), course(3)],
        enrollments: vec![
            enrollment(2, 1, EnrollmentRole::Teacher),
            enrollment(3, 1, EnrollmentRole::Student),
            enrollment(4, 1, EnrollmentRole::Student),
            enrollment(6, 1, EnrollmentRole::Student),
            enrollment(2, remote(1), EnrollmentRole::Teacher),
            enrollment(5, remote(1), EnrollmentRole::Student),
            enrollment(2, 3, EnrollmentRole::Teacher),
            enrollment(7, 3, EnrollmentRole::Student),
        ],
        assignments: vec![
            assignment(10, 1),
            assignment(remote(10), remote(1)),
            assignment(30, 3),
        ],
        submissions: vec![
            submission(100, 10, 3),
            submission(101, 10, 4),
            graded,
            submission(remote(100), remote(10), 5),
            submission(300, 30, 7),
        ],
        ..LearningTables::default()
    }
}

fn grading_grants() -> Vec<PermissionGrant> {
    vec![
        grant(TEACHER, 1, Permission::ManageGrades),
        grant(TEACHER, remote(1), Permission::ManageGrades),
    ]
}

#[rstest]
#[tokio::test]
async fn grading_counts_submissions_in_granted_courses() {
    let world = world(grading_tables(), grading_grants());

    let items = world
        .needs
        .assignments_needing_grading(AssignmentKind::Assignment, TEACHER, &NeedsOptions::default())
        .await
        .expect("grading query succeeds");

    assert_eq!(assignment_ids(&items), vec![10, remote(10)]);
    let counts: Vec<Option<usize>> = items.iter().map(|todo| todo.needs_grading_count).collect();
    assert_eq!(counts, vec![Some(2), Some(1)]);
    assert_eq!(world.permissions.bulk_checks(), 1);
}

#[rstest]
#[tokio::test]
async fn section_limited_grader_only_counts_own_sections() {
    let mut tables = grading_tables();
    for row in &mut tables.enrollments {
        if row.user_id == TEACHER && row.course_id == CourseId::new(1) {
            row.limit_privileges_to_course_section = true;
        }
        if row.user_id == UserId::new(4) {
            row.section_id = SectionId::new(2);
        }
    }
    let world = world(tables, grading_grants());

    let items = world
        .needs
        .assignments_needing_grading(AssignmentKind::Assignment, TEACHER, &NeedsOptions::default())
        .await
        .expect("grading query succeeds");

    assert_eq!(items[0].needs_grading_count, Some(1));
}

#[rstest]
#[tokio::test]
async fn grading_kill_switch_skips_every_port() {
    let config = NeedsConfig {
        disable_grading_queries: true,
        ..NeedsConfig::default()
    };
    let world = world_with_config(grading_tables(), grading_grants(), config);

    let cached = world
        .needs
        .assignments_needing_grading(AssignmentKind::Assignment, TEACHER, &NeedsOptions::default())
        .await
        .expect("grading query succeeds");
    let exists = world
        .needs
        .assignments_needing_grading_scope(
            AssignmentKind::Assignment,
            TEACHER,
            NeedsOptions::default(),
        )
        .exists()
        .await
        .expect("scope runs");

    assert!(cached.is_empty());
    assert!(!exists);
    assert_eq!(world.store.read_count(), 0);
    assert_eq!(world.permissions.bulk_checks(), 0);
    assert_eq!(world.cache.write_count(), 0);
}

#[rstest]
#[case(AssignmentKind::Assignment, vec![remote(10)])]
#[case(AssignmentKind::SubAssignment, vec![11])]
#[tokio::test]
async fn checkpointed_parents_list_through_their_sub_assignments(
    #[case] kind: AssignmentKind,
    #[case] expected: Vec<i64>,
) {
    let mut tables = student_tables();
    let mut checkpoint_course = course(1);
    checkpoint_course.discussion_checkpoints = true;
    tables.courses = vec![checkpoint_course, course(remote(1))];
    let mut parent = assignment(10, 1);
    parent.has_sub_assignments = true;
    let mut checkpoint = assignment(11, 1);
    checkpoint.parent_assignment_id = Some(AssignmentId::new(10));
    let mut remote_parent = assignment(remote(10), remote(1));
    remote_parent.has_sub_assignments = true;
    tables.assignments = vec![parent, checkpoint, remote_parent];
    let world = world(tables, Vec::new());

    let items = world
        .needs
        .assignments_needing_submitting(
            kind,
            STUDENT,
            &NeedsOptions::default(),
            SubmittingOptions::default(),
        )
        .await
        .expect("submitting query succeeds");

    assert_eq!(assignment_ids(&items), expected);
}

#[rstest]
#[case(AssignmentKind::Assignment, vec![(remote(10), Some(1))])]
#[case(AssignmentKind::SubAssignment, vec![(11, Some(1))])]
#[tokio::test]
async fn grading_lists_checkpointed_parents_through_their_sub_assignments(
    #[case] kind: AssignmentKind,
    #[case] expected: Vec<(i64, Option<usize>)>,
) {
    let mut tables = grading_tables();
    for row in &mut tables.courses {
        if row.id == CourseId::new(1) {
            row.discussion_checkpoints = true;
        }
    }
    for row in &mut tables.assignments {
        if row.id == AssignmentId::new(10) {
            row.has_sub_assignments = true;
        }
    }
    let mut checkpoint = assignment(11, 1);
    checkpoint.parent_assignment_id = Some(AssignmentId::new(10));
    tables.assignments.push(checkpoint);
    tables.submissions.push(submission(110, 11, 3));
    let world = world(tables, grading_grants());

    let items = world
        .needs
        .assignments_needing_grading(kind, TEACHER, &NeedsOptions::default())
        .await
        .expect("grading query succeeds");

    let counts: Vec<(i64, Option<usize>)> = items
        .iter()
        .map(|todo| (todo.assignment.id.get(), todo.needs_grading_count))
        .collect();
    assert_eq!(counts, expected);
}

#[rstest]
#[tokio::test]
async fn moderation_lists_provisionally_graded_assignments_the_user_may_finalise() {
    let moderated = |id: i64, course: i64| {
        let mut row = assignment(id, course);
        row.moderated_grading = true;
        row.final_grader_id = Some(TEACHER);
        row
    };
    let tables = LearningTables {
        memberships: vec![memberships(
            TEACHER,
            &[(1, EnrollmentRole::Teacher), (2, EnrollmentRole::Ta)],
        )],
        courses: vec![course(1), course(2)],
        assignments: vec![moderated(10, 1), moderated(20, 2), moderated(11, 1)],
        submissions: vec![
            submission(100, 10, 3),
            submission(200, 20, 3),
            submission(110, 11, 3),
        ],
        provisional_grades: vec![
            ProvisionalGradeRow {
                submission_id: SubmissionId::new(100),
                scorer_id: UserId::new(8),
            },
            ProvisionalGradeRow {
                submission_id: SubmissionId::new(200),
                scorer_id: UserId::new(8),
            },
        ],
        ..LearningTables::default()
    };
    let world = world(tables, vec![grant(TEACHER, 1, Permission::SelectFinalGrade)]);

    let items = world
        .needs
        .assignments_needing_moderation(TEACHER, &NeedsOptions::default())
        .await
        .expect("moderation query succeeds");

    assert_eq!(assignment_ids(&items), vec![10]);
    assert_eq!(world.permissions.single_checks(), 2);
}

#[rstest]
#[case(false, vec![30, 32])]
#[case(true, vec![30])]
#[tokio::test]
async fn ungraded_quizzes_skip_graded_and_completed_quizzes(
    #[case] needing_submission_only: bool,
    #[case] expected: Vec<i64>,
) {
    let mut tables = student_tables();
    tables.quizzes = vec![
        quiz(30, 1, QuizType::Practice),
        quiz(31, 1, QuizType::Assignment),
        quiz(32, 1, QuizType::Survey),
    ];
    tables.quiz_submissions = vec![QuizSubmissionRow {
        quiz_id: QuizId::new(32),
        user_id: STUDENT,
        completed: true,
    }];
    let world = world(tables, Vec::new());

    let items = world
        .needs
        .ungraded_quizzes_needing_submitting(
            STUDENT,
            &NeedsOptions::default(),
            QuizOptions {
                needing_submission_only,
            },
        )
        .await
        .expect("quiz query succeeds");

    let ids: Vec<i64> = items.iter().map(|todo| todo.quiz.id.get()).collect();
    assert_eq!(ids, expected);
}

#[rstest]
#[tokio::test]
async fn peer_reviews_require_an_enrolled_reviewee() {
    let mut tables = student_tables();
    let mut reviewed = assignment(10, 1);
    reviewed.peer_reviews = true;
    tables.assignments = vec![reviewed];
    let mut current = submission(100, 10, 3);
    current.cached_due_date = Some(days(2));
    let departed = submission(101, 10, 4);
    let mut dropped = enrollment(4, 1, EnrollmentRole::Student);
    dropped.workflow_state = EnrollmentState::Deleted;
    tables.enrollments = vec![enrollment(3, 1, EnrollmentRole::Student), dropped];
    tables.assessment_requests = vec![
        assessment_request(200, 1, 3, &current, 1),
        assessment_request(201, 1, 4, &departed, 1),
    ];
    tables.submissions = vec![current, departed];
    let world = world(tables, Vec::new());

    let items = world
        .needs
        .assessment_requests_needing_review(STUDENT, &NeedsOptions::default())
        .await
        .expect("review query succeeds");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].request.id, AssessmentRequestId::new(200));
    assert_eq!(items[0].assignment_title, "Assignment 10");
    assert_eq!(items[0].due_at, Some(days(2)));
}

#[rstest]
#[tokio::test]
async fn viewables_need_a_todo_date_and_skip_locked_announcements() {
    let mut tables = student_tables();
    tables.memberships[0].groups = vec![GroupId::new(60)];
    let course_context = ContextRef::Course(CourseId::new(1));
    let group_context = ContextRef::Group(GroupId::new(60));
    let mut announcement = topic(41, course_context);
    announcement.is_announcement = true;
    announcement.lock_at = Some(days(-1));
    let mut undated = topic(42, course_context);
    undated.todo_date = None;
    tables.discussion_topics = vec![topic(40, course_context), announcement, undated];
    let mut unpublished = page(51, course_context);
    unpublished.workflow_state = WikiPageState::Unpublished;
    tables.wiki_pages = vec![page(50, group_context), unpublished];
    let world = world(tables, Vec::new());

    let topics = world
        .needs
        .discussion_topics_needing_viewing(STUDENT, &NeedsOptions::default())
        .await
        .expect("topic query succeeds");
    let pages = world
        .needs
        .wiki_pages_needing_viewing(STUDENT, &NeedsOptions::default())
        .await
        .expect("page query succeeds");

    let topic_ids: Vec<DiscussionTopicId> = topics.iter().map(|row| row.id).collect();
    let page_ids: Vec<WikiPageId> = pages.iter().map(|row| row.id).collect();
    assert_eq!(topic_ids, vec![DiscussionTopicId::new(40)]);
    assert_eq!(page_ids, vec![WikiPageId::new(50)]);
}

#[rstest]
#[case(false, vec![11])]
#[case(true, vec![10, 11])]
#[tokio::test]
async fn ignored_assignments_drop_off_their_purpose_only(
    #[case] include_ignored: bool,
    #[case] expected: Vec<i64>,
) {
    let mut tables = student_tables();
    tables.assignments = vec![assignment(10, 1), assignment(11, 1)];
    tables.ignores = vec![
        IgnoreRow {
            user_id: STUDENT,
            asset: AssetRef::new(ObjectKind::Assignment, 10),
            purpose: Purpose::Submitting,
            permanent: false,
        },
        IgnoreRow {
            user_id: STUDENT,
            asset: AssetRef::new(ObjectKind::Assignment, 11),
            purpose: Purpose::Grading,
            permanent: true,
        },
    ];
    let world = world(tables, Vec::new());
    let options = NeedsOptions {
        include_ignored,
        ..NeedsOptions::default()
    };

    let items = submitting(&world, &options).await;

    assert_eq!(assignment_ids(&items), expected);
}

#[rstest]
#[tokio::test]
async fn cached_results_are_reused_until_the_user_is_touched() {
    let mut tables = student_tables();
    tables.assignments = vec![assignment(10, 1)];
    let world = world(tables, Vec::new());

    let first = submitting(&world, &NeedsOptions::default()).await;
    let reads = world.store.read_count();
    let second = submitting(&world, &NeedsOptions::default()).await;

    assert_eq!(first, second);
    assert_eq!(world.store.read_count(), reads);

    let ledger = IgnoreLedger::new(Arc::clone(&world.store), Arc::clone(&world.cache));
    ledger
        .ignore(
            STUDENT,
            AssetRef::new(ObjectKind::Assignment, 10),
            Purpose::Submitting,
            false,
        )
        .await
        .expect("ignore recorded");

    let third = submitting(&world, &NeedsOptions::default()).await;
    assert!(third.is_empty());
    assert!(world.store.read_count() > reads);
}

#[rstest]
#[tokio::test]
async fn cached_results_expire_after_the_ttl() {
    let mut tables = student_tables();
    tables.assignments = vec![assignment(10, 1)];
    let world = world(tables, Vec::new());

    submitting(&world, &NeedsOptions::default()).await;
    world
        .store
        .edit(|tables| tables.assignments.push(assignment(11, 1)));

    let stale = submitting(&world, &NeedsOptions::default()).await;
    assert_eq!(assignment_ids(&stale), vec![10]);

    world
        .clock
        .advance(DEFAULT_CACHE_TTL + Duration::from_secs(1));
    let fresh = submitting(&world, &NeedsOptions::default()).await;
    assert_eq!(assignment_ids(&fresh), vec![10, 11]);
}

#[rstest]
#[tokio::test]
async fn scopes_stay_lazy_until_loaded() {
    let mut tables = student_tables();
    tables.assignments = vec![assignment(10, 1), assignment(11, 1)];
    let world = world(tables, Vec::new());

    let scope = world
        .needs
        .assignments_needing_submitting_scope(
            AssignmentKind::Assignment,
            STUDENT,
            NeedsOptions::default(),
            SubmittingOptions::default(),
        )
        .filter(|todo| todo.assignment.id == AssignmentId::new(11));
    assert_eq!(world.store.read_count(), 0);

    let items = scope.load(None).await.expect("scope loads");
    assert_eq!(assignment_ids(&items), vec![11]);
    assert_eq!(world.cache.write_count(), 0);
}

#[rstest]
#[tokio::test]
async fn offline_shard_surfaces_as_service_unavailable() {
    let mut tables = student_tables();
    tables.assignments = vec![assignment(10, 1), assignment(remote(10), remote(1))];
    let world = world(tables, Vec::new());
    world.store.take_offline(ShardId::new(1));

    let err = world
        .needs
        .assignments_needing_submitting(
            AssignmentKind::Assignment,
            STUDENT,
            &NeedsOptions::default(),
            SubmittingOptions::default(),
        )
        .await
        .expect_err("offline shard fails the query");

    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    assert_eq!(err.details(), Some(&serde_json::json!({ "shard": 1 })));
    assert_eq!(world.cache.write_count(), 0);
}

#[rstest]
#[tokio::test]
async fn user_without_memberships_gets_empty_lists_without_store_reads() {
    let world = world(student_tables(), Vec::new());
    let stranger = UserId::new(99);
    let options = NeedsOptions::default();

    let assignments = world
        .needs
        .assignments_needing_submitting(
            AssignmentKind::Assignment,
            stranger,
            &options,
            SubmittingOptions::default(),
        )
        .await
        .expect("submitting query succeeds");
    let topics = world
        .needs
        .discussion_topics_needing_viewing(stranger, &options)
        .await
        .expect("topic query succeeds");
    let reviews = world
        .needs
        .assessment_requests_needing_review(stranger, &options)
        .await
        .expect("review query succeeds");
    assert!(assignments.is_empty() && topics.is_empty() && reviews.is_empty());
    assert_eq!(world.store.read_count(), 0);

    let any_quiz = world
        .needs
        .ungraded_quizzes_needing_submitting_scope(stranger, options, QuizOptions::default())
        .exists()
        .await
        .expect("scope runs");

    assert!(!any_quiz);
}
