use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::BrokerError;
use crate::models::{Archetype, ExecClass, Lane, NewTask, Risk, Task, TaskStatus};

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    let lane_str: String = row.get("lane")?;
    let status_str: String = row.get("status")?;
    let exec_class_str: String = row.get("exec_class")?;
    let archetype_str: String = row.get("archetype")?;
    let risk_str: String = row.get("risk")?;
    let source_ids_json: String = row.get("source_ids")?;

    Ok(Task {
        id: row.get("id")?,
        plan_id: row.get("plan_id")?,
        seq: row.get("seq")?,
        lane: Lane::from_str(&lane_str).unwrap_or(Lane::Backend),
        lane_rank: row.get("lane_rank")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: TaskStatus::from_str(&status_str).unwrap_or(TaskStatus::Pending),
        priority: row.get("priority")?,
        exec_class: ExecClass::from_str(&exec_class_str).unwrap_or(ExecClass::Parallel),
        archetype: Archetype::from_str(&archetype_str).unwrap_or(Archetype::Generic),
        risk: Risk::from_str(&risk_str).unwrap_or(Risk::Low),
        source_ids: serde_json::from_str(&source_ids_json).unwrap_or_default(),
        source_plan_hash: row.get("source_plan_hash")?,
        task_signature: row.get("task_signature")?,
        agent: row.get("agent")?,
        worker_id: row.get("worker_id")?,
        lease_id: row.get("lease_id")?,
        lease_expires_at: row.get("lease_expires_at")?,
        retry_count: row.get("retry_count")?,
        review_decision: row.get("review_decision")?,
        review_notes: row.get("review_notes")?,
        override_justification: row.get("override_justification")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
        heartbeat_at: row.get("heartbeat_at")?,
    })
}

const SELECT_COLUMNS: &str = "id, plan_id, seq, lane, lane_rank, title, description, status,
    priority, exec_class, archetype, risk, source_ids, source_plan_hash, task_signature,
    agent, worker_id, lease_id, lease_expires_at, retry_count, review_decision, review_notes,
    override_justification, created_at, updated_at, started_at, completed_at, heartbeat_at";

pub fn get_task_by_id(conn: &Connection, task_id: &str) -> Result<Task, BrokerError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE id = ?1");
    conn.query_row(&sql, params![task_id], row_to_task)
        .optional()?
        .ok_or_else(|| BrokerError::task_not_found(task_id))
}

/// Resolves a user-supplied reference (full ULID, unique prefix, or `seq`)
/// to a single task.
pub fn resolve_task_ref(conn: &Connection, plan_id: &str, reference: &str) -> Result<Task, BrokerError> {
    if let Ok(seq) = reference.parse::<i64>() {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE plan_id = ?1 AND seq = ?2");
        if let Some(t) = conn
            .query_row(&sql, params![plan_id, seq], row_to_task)
            .optional()?
        {
            return Ok(t);
        }
    }

    let sql = format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE plan_id = ?1 AND id LIKE ?2 || '%'");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![plan_id, reference], row_to_task)?;

    let first = match rows.next() {
        Some(r) => r?,
        None => return Err(BrokerError::task_not_found(reference)),
    };
    if let Some(second) = rows.next() {
        let second = second?;
        let mut candidates = vec![first.id, second.id];
        for r in rows {
            candidates.push(r?.id);
        }
        return Err(BrokerError::ambiguous_ref(reference, &candidates));
    }
    Ok(first)
}

pub fn insert_task(
    conn: &Connection,
    plan_id: &str,
    seq: i64,
    source_plan_hash: &str,
    task_signature: &str,
    new_task: &NewTask,
) -> Result<Task, BrokerError> {
    let id = ulid::Ulid::new().to_string();
    let source_ids_json = serde_json::to_string(&new_task.source_ids).unwrap_or_else(|_| "[]".to_string());

    conn.execute(
        "INSERT INTO tasks (
            id, plan_id, seq, lane, lane_rank, type, title, description, status,
            priority, exec_class, archetype, risk, source_ids, source_plan_hash,
            task_signature, agent
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?4, ?6, ?7, 'pending',
            ?8, ?9, ?10, ?11, ?12, ?13,
            ?14, ?15
        )",
        params![
            id,
            plan_id,
            seq,
            new_task.lane.as_str(),
            new_task.lane.rank(),
            new_task.title,
            new_task.description,
            new_task.priority,
            new_task.exec_class.as_str(),
            new_task.archetype.as_str(),
            new_task.risk.as_str(),
            source_ids_json,
            source_plan_hash,
            task_signature,
            new_task.agent,
        ],
    )?;

    get_task_by_id(conn, &id)
}

pub fn signature_exists(conn: &Connection, source_plan_hash: &str, task_signature: &str) -> Result<bool, BrokerError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE source_plan_hash = ?1 AND task_signature = ?2",
        params![source_plan_hash, task_signature],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

pub fn plan_hash_exists(conn: &Connection, source_plan_hash: &str) -> Result<bool, BrokerError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE source_plan_hash = ?1",
        params![source_plan_hash],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

pub fn next_seq(conn: &Connection, plan_id: &str) -> Result<i64, BrokerError> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(seq) FROM tasks WHERE plan_id = ?1",
        params![plan_id],
        |r| r.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

pub fn list_tasks_for_plan(conn: &Connection, plan_id: &str) -> Result<Vec<Task>, BrokerError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE plan_id = ?1 ORDER BY seq ASC");
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params![plan_id], row_to_task)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

pub fn list_pending_for_lanes(conn: &Connection, plan_id: &str, lanes: &[&str]) -> Result<Vec<Task>, BrokerError> {
    if lanes.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = lanes.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM tasks
         WHERE plan_id = ? AND status = 'pending' AND lane IN ({placeholders})
         ORDER BY priority ASC, created_at ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut bound: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(lanes.len() + 1);
    bound.push(&plan_id);
    for lane in lanes {
        bound.push(lane);
    }
    let tasks = stmt
        .query_map(bound.as_slice(), row_to_task)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

pub fn list_expired_leases(conn: &Connection, now: i64) -> Result<Vec<Task>, BrokerError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM tasks
         WHERE status = 'in_progress' AND lease_expires_at > 0 AND lease_expires_at < ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params![now], row_to_task)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

/// Hard-delete a task and everything that references it (dependencies,
/// messages, review packet, ledger entries cascade via `ON DELETE CASCADE`).
/// The only way a task ever leaves the store, per the distilled spec's
/// "destroyed only by explicit admin purge" lifecycle rule.
pub fn delete_task(conn: &Connection, task_id: &str) -> Result<(), BrokerError> {
    let affected = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
    if affected == 0 {
        return Err(BrokerError::task_not_found(task_id));
    }
    Ok(())
}

pub fn unresolved_dependency_summary(conn: &Connection, task_id: &str) -> Result<(bool, bool), BrokerError> {
    let incomplete: i64 = conn.query_row(
        "SELECT COUNT(*) FROM task_dependencies d
         JOIN tasks t ON t.id = d.dependency_id
         WHERE d.task_id = ?1 AND d.dependency_id IS NOT NULL AND t.status != 'completed'",
        params![task_id],
        |r| r.get(0),
    )?;
    let unknown: i64 = conn.query_row(
        "SELECT COUNT(*) FROM task_dependencies WHERE task_id = ?1 AND dep_token IS NOT NULL",
        params![task_id],
        |r| r.get(0),
    )?;
    Ok((incomplete > 0, unknown > 0))
}
