//! Read-only projection of current scheduler/lane/worker state for
//! observers. Grounded in the original `snapshot.py` tool's discipline:
//! all I/O happens in one place, every field is optional-safe, and a
//! per-section query failure yields an empty/null section rather than
//! failing the whole call.

use std::path::Path;
use std::time::{Duration, Instant};

use rusqlite::Connection;
use serde::Serialize;

use crate::models::{Lane, Task, TaskStatus, LANE_ORDER};
use crate::readiness::get_context_readiness;
use crate::store::{config_repo, ledger_repo, plan_repo, worker_repo};

const SOFT_BUDGET: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default, Serialize)]
pub struct LaneCounts {
    pub pending: i64,
    pub active: i64,
    pub done: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub kind: String,
    pub severity: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ExecSnapshot {
    pub plan: Option<serde_json::Value>,
    pub lanes: std::collections::BTreeMap<String, LaneCounts>,
    pub active_tasks: Vec<Task>,
    pub workers: Vec<crate::models::Worker>,
    pub scheduler: Option<serde_json::Value>,
    pub readiness: Option<serde_json::Value>,
    pub alerts: Vec<Alert>,
    pub partial: bool,
}

fn lane_counts(conn: &Connection, plan_id: &str) -> Option<std::collections::BTreeMap<String, LaneCounts>> {
    let mut map = std::collections::BTreeMap::new();
    for lane_name in LANE_ORDER {
        let mut counts = LaneCounts::default();
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM tasks WHERE plan_id = ?1 AND lane = ?2 GROUP BY status")
            .ok()?;
        let rows = stmt
            .query_map(rusqlite::params![plan_id, lane_name], |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((status, count))
            })
            .ok()?;
        for row in rows.flatten() {
            let (status, count) = row;
            counts.total += count;
            match TaskStatus::from_str(&status) {
                Some(TaskStatus::Pending) | Some(TaskStatus::Blocked) => counts.pending += count,
                Some(TaskStatus::InProgress) | Some(TaskStatus::Reviewing) => counts.active += count,
                Some(TaskStatus::Completed) => counts.done += count,
                _ => {}
            }
        }
        map.insert(lane_name.to_string(), counts);
    }
    Some(map)
}

fn active_tasks(conn: &Connection, plan_id: &str) -> Option<Vec<Task>> {
    crate::store::task_repo::list_tasks_for_plan(conn, plan_id)
        .ok()
        .map(|tasks| tasks.into_iter().filter(|t| t.status == TaskStatus::InProgress).collect())
}

fn lanes_with_unknown_deps(conn: &Connection, plan_id: &str) -> Vec<String> {
    let mut stmt = match conn.prepare(
        "SELECT DISTINCT t.lane FROM tasks t
         JOIN task_dependencies d ON d.task_id = t.id
         WHERE t.plan_id = ?1 AND d.dep_token IS NOT NULL",
    ) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    stmt.query_map(rusqlite::params![plan_id], |row| row.get::<_, String>(0))
        .map(|rows| rows.flatten().collect())
        .unwrap_or_default()
}

fn compute_alerts(conn: &Connection, plan_id: Option<&str>, active: &[Task]) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(plan_id) = plan_id {
        let blocked_lanes = lanes_with_unknown_deps(conn, plan_id);
        if !blocked_lanes.is_empty() {
            alerts.push(Alert {
                kind: "TASKS_BLOCKED".to_string(),
                severity: "warn".to_string(),
                message: format!("lanes with unresolved UNKNOWN_DEPS: {}", blocked_lanes.join(", ")),
            });
        }
    }

    for task in active {
        let now = chrono::Utc::now().timestamp();
        if task.lease_expires_at > 0 && task.lease_expires_at < now {
            alerts.push(Alert {
                kind: "STALE_LEASE".to_string(),
                severity: "warn".to_string(),
                message: format!("task {} has an expired lease awaiting reap", task.id),
            });
        }
    }

    if let Ok(rejects) = ledger_repo::recent_rejects(conn, 5) {
        if !rejects.is_empty() {
            alerts.push(Alert {
                kind: "RED_DECISION".to_string(),
                severity: "error".to_string(),
                message: format!("{} recent REJECT decision(s)", rejects.len()),
            });
        }
    }

    alerts
}

pub fn get_exec_snapshot(conn: &Connection, docs_dir: &Path) -> ExecSnapshot {
    let started = Instant::now();
    let mut snapshot = ExecSnapshot::default();

    let plan = plan_repo::get_active_plan(conn).ok();
    snapshot.plan = plan.as_ref().map(|p| {
        serde_json::json!({ "id": p.id, "name": p.name, "hash": p.plan_hash, "status": p.status.as_str() })
    });

    if let Some(plan) = &plan {
        if started.elapsed() < SOFT_BUDGET {
            if let Some(lanes) = lane_counts(conn, &plan.id) {
                snapshot.lanes = lanes;
            } else {
                snapshot.partial = true;
            }
        }

        if started.elapsed() < SOFT_BUDGET {
            if let Some(active) = active_tasks(conn, &plan.id) {
                snapshot.active_tasks = active;
            } else {
                snapshot.partial = true;
            }
        }
    }

    if started.elapsed() < SOFT_BUDGET {
        snapshot.workers = worker_repo::list_workers(conn).unwrap_or_else(|_| {
            snapshot.partial = true;
            Vec::new()
        });
    }

    if started.elapsed() < SOFT_BUDGET {
        let pointer = config_repo::get_lane_pointer(conn).unwrap_or(0);
        let last_decision = config_repo::get_last_decision(conn).unwrap_or(None);
        snapshot.scheduler = Some(serde_json::json!({
            "lane_pointer": pointer,
            "lane_pointer_name": Lane::from_rank(pointer).map(|l| l.as_str()),
            "last_decision": last_decision,
        }));
    }

    let readiness = get_context_readiness(docs_dir);
    snapshot.readiness = Some(serde_json::json!({
        "status": readiness.status,
        "blocking_files": readiness.blocking_files,
    }));

    snapshot.alerts = compute_alerts(conn, plan.as_ref().map(|p| p.id.as_str()), &snapshot.active_tasks);

    if started.elapsed() >= SOFT_BUDGET {
        tracing::warn!("exec snapshot exceeded soft time budget, returning partial data");
        snapshot.partial = true;
    }

    snapshot
}
