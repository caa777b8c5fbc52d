use rusqlite::{params, Connection};

use crate::error::BrokerError;
use crate::models::TaskDependency;

pub fn insert_dependency(conn: &Connection, task_id: &str, dependency_id: &str) -> Result<(), BrokerError> {
    if task_id == dependency_id {
        return Err(BrokerError::validation("a task cannot depend on itself"));
    }
    conn.execute(
        "INSERT INTO task_dependencies (task_id, dependency_id, dep_token) VALUES (?1, ?2, NULL)",
        params![task_id, dependency_id],
    )?;
    Ok(())
}

pub fn insert_unknown_dependency(conn: &Connection, task_id: &str, dep_token: &str) -> Result<(), BrokerError> {
    conn.execute(
        "INSERT INTO task_dependencies (task_id, dependency_id, dep_token) VALUES (?1, NULL, ?2)",
        params![task_id, dep_token],
    )?;
    Ok(())
}

pub fn list_dependencies(conn: &Connection, task_id: &str) -> Result<Vec<TaskDependency>, BrokerError> {
    let mut stmt = conn.prepare(
        "SELECT task_id, dependency_id, dep_token FROM task_dependencies WHERE task_id = ?1",
    )?;
    let deps = stmt
        .query_map(params![task_id], |row| {
            Ok(TaskDependency {
                task_id: row.get(0)?,
                dependency_id: row.get(1)?,
                dep_token: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(deps)
}

/// All dependency edges within a plan, used for cycle detection at plan
/// acceptance time.
pub fn list_edges_for_plan(conn: &Connection, plan_id: &str) -> Result<Vec<(String, String)>, BrokerError> {
    let mut stmt = conn.prepare(
        "SELECT d.task_id, d.dependency_id
         FROM task_dependencies d
         JOIN tasks t ON t.id = d.task_id
         WHERE t.plan_id = ?1 AND d.dependency_id IS NOT NULL",
    )?;
    let edges = stmt
        .query_map(params![plan_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(edges)
}
