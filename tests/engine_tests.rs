//! Integration tests for the task lifecycle.
//!
//! Tests creation defaults, history, list ordering, the overdue sweep, and
//! persistence across reopen.

mod common;

use chrono::Duration;
use common::TestEnv;
use tether::{NewTask, Priority, Status, Store, TaskPatch, sweep_once};

// =============================================================================
// Creation Tests
// =============================================================================

#[test]
fn test_new_task_defaults() {
    let env = TestEnv::new();
    let task = env.create_task("Fresh task");

    assert!(task.id.starts_with("tt-"));
    assert_eq!(task.status, Status::Pending);
    assert_eq!(task.priority, Priority::Medium);
    assert!(task.depends_on.is_empty());
    assert_eq!(task.history.len(), 1);
    assert_eq!(task.history[0].status, Status::Pending);
    assert_eq!(task.history[0].at, task.created_at);
}

#[test]
fn test_title_is_trimmed() {
    let env = TestEnv::new();

    let task = env
        .store
        .create(NewTask {
            title: "   Padded title   ".to_string(),
            description: None,
            priority: None,
            start_at: env.now(),
            due_at: env.now() + Duration::days(1),
            depends_on: vec![],
        })
        .unwrap();

    assert_eq!(task.title, "Padded title");
    assert_eq!(env.reload(&task).title, "Padded title");
}

#[test]
fn test_create_due_before_start_fails() {
    let env = TestEnv::new();

    let result = env.store.create(NewTask {
        title: "Backwards window".to_string(),
        description: None,
        priority: None,
        start_at: env.now() + Duration::days(2),
        due_at: env.now() + Duration::days(1),
        depends_on: vec![],
    });
    assert!(result.is_err());
    assert_eq!(env.total_count(), 0);
}

#[test]
fn test_create_due_equal_to_start_is_allowed() {
    let env = TestEnv::new();
    let instant = env.now() + Duration::days(1);

    let task = env
        .store
        .create(NewTask {
            title: "Zero-length window".to_string(),
            description: None,
            priority: None,
            start_at: instant,
            due_at: instant,
            depends_on: vec![],
        })
        .unwrap();

    assert_eq!(task.start_at, task.due_at);
}

#[test]
fn test_ids_are_unique() {
    let env = TestEnv::new();

    let first = env.create_task("Same title");
    let second = env.create_task("Same title");

    assert_ne!(first.id, second.id);
}

// =============================================================================
// History Tests
// =============================================================================

#[test]
fn test_each_status_change_appends_exactly_one_entry() {
    let env = TestEnv::new();
    let task = env.create_task("Tracked task");

    env.set_status(&task, Status::InProgress);
    env.set_status(&task, Status::Completed);

    assert_eq!(
        env.history_statuses(&task),
        vec![Status::Pending, Status::InProgress, Status::Completed]
    );
}

#[test]
fn test_field_updates_do_not_touch_history() {
    let env = TestEnv::new();
    let task = env.create_task("Tracked task");

    env.store
        .update(&task.id, TaskPatch { title: Some("Renamed task".to_string()), ..Default::default() })
        .unwrap();
    env.store
        .update(&task.id, TaskPatch { priority: Some(Priority::High), ..Default::default() })
        .unwrap();

    assert_eq!(env.history_statuses(&task), vec![Status::Pending]);
}

#[test]
fn test_setting_same_status_appends_nothing() {
    let env = TestEnv::new();
    let task = env.create_task("Tracked task");

    env.set_status(&task, Status::Pending);

    assert_eq!(env.history_statuses(&task), vec![Status::Pending]);
}

#[test]
fn test_status_can_move_backwards() {
    let env = TestEnv::new();
    let task = env.create_task("Flexible task");

    env.set_status(&task, Status::Completed);
    let reverted = env.set_status(&task, Status::Pending);

    assert_eq!(reverted.status, Status::Pending);
    assert_eq!(
        env.history_statuses(&task),
        vec![Status::Pending, Status::Completed, Status::Pending]
    );
}

// =============================================================================
// List Ordering Tests
// =============================================================================

#[test]
fn test_list_returns_creation_order() {
    let env = TestEnv::new();

    let first = env.create_task("First");
    env.advance(Duration::seconds(1));
    let second = env.create_task("Second");
    env.advance(Duration::seconds(1));
    let third = env.create_task("Third");

    let listed = env.store.list(None).unwrap();
    let ids: Vec<&str> = listed.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec![first.id.as_str(), second.id.as_str(), third.id.as_str()]);
}

#[test]
fn test_list_filters_by_status() {
    let env = TestEnv::new();

    let pending = env.create_task("Still pending");
    let started = env.create_task("Being worked");
    env.set_status(&started, Status::InProgress);

    assert_eq!(env.count_by_status(Status::Pending), 1);
    assert_eq!(env.count_by_status(Status::InProgress), 1);
    assert_eq!(env.count_by_status(Status::Completed), 0);

    let listed = env.store.list(Some(Status::Pending)).unwrap();
    assert_eq!(listed[0].id, pending.id);
}

#[test]
fn test_priority_listing_orders_high_to_low_then_due() {
    let env = TestEnv::new();
    let now = env.now();

    let make = |title: &str, priority: Priority, due_in_hours: i64| {
        env.store
            .create(NewTask {
                title: title.to_string(),
                description: None,
                priority: Some(priority),
                start_at: now,
                due_at: now + Duration::hours(due_in_hours),
                depends_on: vec![],
            })
            .unwrap()
    };

    let low = make("Low priority", Priority::Low, 1);
    let medium = make("Medium priority", Priority::Medium, 2);
    let high_late = make("High, due later", Priority::High, 48);
    let high_soon = make("High, due soon", Priority::High, 12);

    let listed = env.store.list_by_priority().unwrap();
    let ids: Vec<&str> = listed.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            high_soon.id.as_str(),
            high_late.id.as_str(),
            medium.id.as_str(),
            low.id.as_str()
        ]
    );
}

// =============================================================================
// Overdue Query Tests
// =============================================================================

#[test]
fn test_overdue_listing_spans_unmarked_and_marked() {
    let env = TestEnv::new();
    let now = env.now();

    let late_pending = env.create_task_due("Late and pending", now - Duration::hours(2));
    let late_completed = env.create_task_due("Late but completed", now - Duration::hours(3));
    env.complete(&late_completed);
    let future = env.create_task_due("Due tomorrow", now + Duration::days(1));

    // Before any sweep, the unswept late task already shows up
    let overdue = env.store.list_overdue(now).unwrap();
    let ids: Vec<&str> = overdue.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec![late_pending.id.as_str()]);

    // After the sweep it is still listed, now with overdue status
    env.store.mark_overdue(now).unwrap();
    let overdue = env.store.list_overdue(now).unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].status, Status::Overdue);

    assert_eq!(env.reload(&future).status, Status::Pending);
}

// =============================================================================
// Sweep Tests
// =============================================================================

#[test]
fn test_sweep_marks_only_past_due_incomplete_tasks() {
    let env = TestEnv::new();
    let now = env.now();

    let late_pending = env.create_task_due("Late and pending", now - Duration::hours(4));
    let late_started = env.create_task_due("Late and started", now - Duration::hours(3));
    env.set_status(&late_started, Status::InProgress);
    let late_completed = env.create_task_due("Late but completed", now - Duration::hours(2));
    env.complete(&late_completed);
    let future = env.create_task_due("Due tomorrow", now + Duration::days(1));

    let marked = env.store.mark_overdue(now).unwrap();

    // Ordered by due time, oldest first
    let ids: Vec<&str> = marked.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec![late_pending.id.as_str(), late_started.id.as_str()]);

    assert_eq!(env.reload(&late_pending).status, Status::Overdue);
    assert_eq!(env.reload(&late_started).status, Status::Overdue);
    assert_eq!(env.reload(&late_completed).status, Status::Completed);
    assert_eq!(env.reload(&future).status, Status::Pending);
}

#[test]
fn test_sweep_is_idempotent_for_a_fixed_instant() {
    let env = TestEnv::new();
    let now = env.now();

    let late = env.create_task_due("Late task", now - Duration::hours(1));

    assert_eq!(env.store.mark_overdue(now).unwrap().len(), 1);
    assert!(env.store.mark_overdue(now).unwrap().is_empty());

    // Exactly one overdue entry despite two sweeps
    assert_eq!(
        env.history_statuses(&late),
        vec![Status::Pending, Status::Overdue]
    );
}

#[test]
fn test_sweep_picks_up_newly_due_tasks_as_time_moves() {
    let env = TestEnv::new();

    let soon = env.create_task_due("Due in an hour", env.now() + Duration::hours(1));
    assert!(env.store.mark_overdue(env.now()).unwrap().is_empty());

    env.advance(Duration::hours(2));
    let marked = env.store.mark_overdue(env.now()).unwrap();
    assert_eq!(marked.len(), 1);
    assert_eq!(marked[0].id, soon.id);
}

#[test]
fn test_sweep_records_the_sweep_instant() {
    let env = TestEnv::new();
    let task = env.create_task_due("Late task", env.now() - Duration::hours(1));

    env.advance(Duration::minutes(30));
    let sweep_instant = env.now();
    env.store.mark_overdue(sweep_instant).unwrap();

    let reloaded = env.reload(&task);
    assert_eq!(reloaded.updated_at, sweep_instant);
    assert_eq!(reloaded.history.last().unwrap().at, sweep_instant);
}

#[test]
fn test_sweep_once_reports_count() {
    let env = TestEnv::new();
    let now = env.now();

    env.create_task_due("Late one", now - Duration::hours(2));
    env.create_task_due("Late two", now - Duration::hours(1));
    env.create_task_due("Due tomorrow", now + Duration::days(1));

    assert_eq!(sweep_once(&env.store).unwrap(), 2);
    assert_eq!(sweep_once(&env.store).unwrap(), 0);
    assert_eq!(env.count_by_status(Status::Overdue), 2);
}

// =============================================================================
// Update Tests
// =============================================================================

#[test]
fn test_update_patches_only_given_fields() {
    let env = TestEnv::new();
    let task = env.create_task("Original title");

    let updated = env
        .store
        .update(
            &task.id,
            TaskPatch {
                description: Some("Filled in later".to_string()),
                priority: Some(Priority::High),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(updated.title, "Original title");
    assert_eq!(updated.description.as_deref(), Some("Filled in later"));
    assert_eq!(updated.priority, Priority::High);
    assert_eq!(updated.status, Status::Pending);
    assert_eq!(updated.start_at, task.start_at);
    assert_eq!(updated.due_at, task.due_at);
}

#[test]
fn test_update_validates_effective_time_range() {
    let env = TestEnv::new();
    let task = env.create_task("Windowed task");

    // Moving due below the stored start fails
    let result = env.store.update(
        &task.id,
        TaskPatch { due_at: Some(task.start_at - Duration::hours(1)), ..Default::default() },
    );
    assert!(result.is_err());

    // Moving both together to a consistent window succeeds
    let start = task.due_at + Duration::days(1);
    let due = start + Duration::hours(4);
    let updated = env
        .store
        .update(
            &task.id,
            TaskPatch { start_at: Some(start), due_at: Some(due), ..Default::default() },
        )
        .unwrap();
    assert_eq!(updated.start_at, start);
    assert_eq!(updated.due_at, due);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_init_creates_tether_directory() {
    let temp = tempfile::TempDir::new().unwrap();
    Store::init(temp.path()).unwrap();

    assert!(temp.path().join(".tether").exists());
    assert!(temp.path().join(".tether/tether.db").exists());
}

#[test]
fn test_open_nonexistent_store_fails() {
    let temp = tempfile::TempDir::new().unwrap();
    let result = Store::open(temp.path());
    assert!(result.is_err());
}

#[test]
fn test_reopen_preserves_tasks_history_and_deps() {
    let temp = tempfile::TempDir::new().unwrap();
    let (upstream_id, downstream_id);

    {
        let store = Store::init(temp.path()).unwrap();
        let now = chrono::Utc::now();
        let upstream = store
            .create(NewTask {
                title: "Upstream task".to_string(),
                description: Some("carried across reopen".to_string()),
                priority: Some(Priority::High),
                start_at: now,
                due_at: now + Duration::days(1),
                depends_on: vec![],
            })
            .unwrap();
        let downstream = store
            .create(NewTask {
                title: "Downstream task".to_string(),
                description: None,
                priority: None,
                start_at: now,
                due_at: now + Duration::days(2),
                depends_on: vec![upstream.id.clone()],
            })
            .unwrap();
        store
            .update(&upstream.id, TaskPatch { status: Some(Status::Completed), ..Default::default() })
            .unwrap();
        upstream_id = upstream.id;
        downstream_id = downstream.id;
    }

    let store = Store::open(temp.path()).unwrap();

    let upstream = store.get(&upstream_id).unwrap().unwrap();
    assert_eq!(upstream.title, "Upstream task");
    assert_eq!(upstream.description.as_deref(), Some("carried across reopen"));
    assert_eq!(upstream.priority, Priority::High);
    assert_eq!(upstream.status, Status::Completed);
    let statuses: Vec<Status> = upstream.history.iter().map(|h| h.status).collect();
    assert_eq!(statuses, vec![Status::Pending, Status::Completed]);

    let downstream = store.get(&downstream_id).unwrap().unwrap();
    assert_eq!(downstream.depends_on.len(), 1);
    assert_eq!(downstream.depends_on[0].id, upstream_id);
    assert_eq!(downstream.depends_on[0].status, Status::Completed);
    assert!(store.can_start(&downstream_id).unwrap());
}
