//! Direct-library tests for the braided scheduler's named properties
//! (spec §8: fair braiding, URGENT preemption, crash recovery, no
//! double-claim). These exercise `taskbroker::scheduler` and
//! `taskbroker::store` straight from a tempdir'd SQLite file rather than
//! shelling out to the CLI binary, since seeding a stale lease or a
//! specific pointer position has no CLI surface.

use std::collections::HashSet;

use tempfile::TempDir;

use taskbroker::models::{Archetype, ExecClass, Lane, NewTask, Risk, TaskStatus};
use taskbroker::scheduler::{self, PickOutcome};
use taskbroker::store::{self, config_repo, plan_repo, state_writer, task_repo};

struct TestStore {
    _dir: TempDir,
}

impl TestStore {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        std::env::set_var("TASKBROKER_DB", dir.path().join("taskbroker.db"));
        std::env::set_var("TASKBROKER_STATE_DIR", dir.path().join("state"));
        store::init_db().expect("init db");
        Self { _dir: dir }
    }
}

fn seed_plan(conn: &rusqlite::Connection, name: &str) -> String {
    let plan = plan_repo::insert_plan(conn, name, name, None, &format!("hash-{name}")).expect("insert plan");
    plan.id
}

fn seed_task(conn: &rusqlite::Connection, plan_id: &str, seq: i64, lane: Lane, priority: i32) -> taskbroker::models::Task {
    let new_task = NewTask {
        lane,
        title: format!("{} task {seq}", lane.as_str()),
        description: None,
        priority,
        exec_class: ExecClass::Parallel,
        archetype: Archetype::Generic,
        risk: Risk::Low,
        source_ids: Vec::new(),
        agent: None,
    };
    let signature = format!("sig-{plan_id}-{seq}");
    task_repo::insert_task(conn, plan_id, seq, &format!("hash-for-{plan_id}"), &signature, &new_task).expect("insert task")
}

#[test]
fn fair_braiding_touches_every_lane_within_first_pass() {
    let _store = TestStore::new();
    let conn = store::open_db().unwrap();
    let plan_id = seed_plan(&conn, "braid");

    let lanes = [Lane::Backend, Lane::Frontend, Lane::Qa, Lane::Ops, Lane::Docs];
    let mut seq = 0;
    for _ in 0..5 {
        for lane in &lanes {
            seq += 1;
            seed_task(&conn, &plan_id, seq, *lane, 10);
        }
    }

    let mut picked_lanes = Vec::new();
    for i in 0..10 {
        let outcome = scheduler::pick_next(&conn, &plan_id, &format!("w{i}"), None, &[]).unwrap();
        match outcome {
            PickOutcome::Picked { task, .. } => picked_lanes.push(task.lane.as_str().to_string()),
            PickOutcome::NoWork { .. } => panic!("expected work at pick {i}"),
        }
    }

    let distinct: HashSet<_> = picked_lanes.iter().take(10).collect();
    assert!(distinct.len() >= 3, "expected >=3 distinct lanes in 10 picks, got {picked_lanes:?}");

    let first_five: HashSet<_> = picked_lanes.iter().take(5).collect();
    assert_eq!(first_five.len(), 5, "expected first 5 picks to touch all 5 lanes, got {picked_lanes:?}");
}

#[test]
fn urgent_priority_preempts_rotation_order() {
    let _store = TestStore::new();
    let conn = store::open_db().unwrap();
    let plan_id = seed_plan(&conn, "preempt");

    seed_task(&conn, &plan_id, 1, Lane::Backend, 10);
    seed_task(&conn, &plan_id, 2, Lane::Frontend, 20);
    let docs_task = seed_task(&conn, &plan_id, 3, Lane::Docs, 0);

    config_repo::set_lane_pointer(&conn, 0, "backend").unwrap();

    let outcome = scheduler::pick_next(&conn, &plan_id, "w1", None, &[]).unwrap();
    match outcome {
        PickOutcome::Picked { task, preempted, .. } => {
            assert_eq!(task.id, docs_task.id);
            assert!(preempted, "URGENT task should be flagged as preempted");
        }
        PickOutcome::NoWork { .. } => panic!("expected a pick"),
    }
}

#[test]
fn stale_lease_is_reaped_and_reclaimed_by_fresh_worker() {
    let _store = TestStore::new();
    let conn = store::open_db().unwrap();
    let plan_id = seed_plan(&conn, "crash");
    let task = seed_task(&conn, &plan_id, 1, Lane::Backend, 10);

    // Simulate a crashed worker: claim it directly with an expired lease.
    let stale_lease = "stale-lease-token";
    state_writer::update_task_state(
        &conn,
        &task.id,
        TaskStatus::InProgress,
        state_writer::StateMutation {
            worker_id: Some(Some("dead-worker")),
            lease_id: Some(stale_lease),
            lease_expires_at: Some(1), // long past
            retry_count_delta: 0,
            review_decision: None,
            review_notes: None,
        },
    )
    .unwrap();

    let outcome = scheduler::pick_next(&conn, &plan_id, "fresh-worker", None, &[]).unwrap();
    match outcome {
        PickOutcome::Picked { task: picked, lease_id, .. } => {
            assert_eq!(picked.id, task.id);
            assert_ne!(lease_id, stale_lease);
            assert_eq!(picked.worker_id.as_deref(), Some("fresh-worker"));
            assert_eq!(picked.retry_count, 1, "reap should have incremented retry_count");
        }
        PickOutcome::NoWork { .. } => panic!("expected the reaped task to be reclaimed"),
    }
}

#[test]
fn concurrent_pick_next_never_double_claims() {
    let _store = TestStore::new();
    let conn = store::open_db().unwrap();
    let plan_id = seed_plan(&conn, "race");
    seed_task(&conn, &plan_id, 1, Lane::Backend, 10);

    let plan_id_a = plan_id.clone();
    let plan_id_b = plan_id.clone();

    let handle_a = std::thread::spawn(move || {
        let conn = store::open_db().unwrap();
        scheduler::pick_next(&conn, &plan_id_a, "worker-a", None, &[]).unwrap()
    });
    let handle_b = std::thread::spawn(move || {
        let conn = store::open_db().unwrap();
        scheduler::pick_next(&conn, &plan_id_b, "worker-b", None, &[]).unwrap()
    });

    let outcome_a = handle_a.join().unwrap();
    let outcome_b = handle_b.join().unwrap();

    let picked_count = [&outcome_a, &outcome_b]
        .iter()
        .filter(|o| matches!(o, PickOutcome::Picked { .. }))
        .count();
    assert_eq!(picked_count, 1, "exactly one of two concurrent claimants should win the single pending task");

    let tasks = task_repo::list_tasks_for_plan(&conn, &plan_id).unwrap();
    let in_progress_count = tasks.iter().filter(|t| t.status == TaskStatus::InProgress).count();
    assert_eq!(in_progress_count, 1);
}

#[test]
fn worker_type_exclusion_yields_no_work() {
    let _store = TestStore::new();
    let conn = store::open_db().unwrap();
    let plan_id = seed_plan(&conn, "excluded");
    seed_task(&conn, &plan_id, 1, Lane::Docs, 10);

    // A "backend" worker may only claim {backend, qa, ops}; docs is excluded.
    let outcome = scheduler::pick_next(&conn, &plan_id, "w1", Some("backend"), &[]).unwrap();
    assert!(matches!(outcome, PickOutcome::NoWork { .. }));
}
