use rusqlite::{params, Connection, OptionalExtension};

use crate::error::BrokerError;
use crate::models::Worker;

pub fn upsert_worker(
    conn: &Connection,
    worker_id: &str,
    worker_type: Option<&str>,
    allowed_lanes: &[String],
    now: i64,
    task_ids: &[String],
) -> Result<(), BrokerError> {
    let lanes_json = serde_json::to_string(allowed_lanes).unwrap_or_else(|_| "[]".to_string());
    let tasks_json = serde_json::to_string(task_ids).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO workers (worker_id, worker_type, allowed_lanes, last_seen, task_ids)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(worker_id) DO UPDATE SET
            worker_type = excluded.worker_type,
            allowed_lanes = excluded.allowed_lanes,
            last_seen = excluded.last_seen,
            task_ids = excluded.task_ids",
        params![worker_id, worker_type, lanes_json, now, tasks_json],
    )?;
    Ok(())
}

pub fn get_worker(conn: &Connection, worker_id: &str) -> Result<Option<Worker>, BrokerError> {
    let worker = conn
        .query_row(
            "SELECT worker_id, worker_type, allowed_lanes, last_seen, task_ids FROM workers WHERE worker_id = ?1",
            params![worker_id],
            |row| {
                let lanes_json: String = row.get(2)?;
                let tasks_json: String = row.get(4)?;
                Ok(Worker {
                    worker_id: row.get(0)?,
                    worker_type: row.get(1)?,
                    allowed_lanes: serde_json::from_str(&lanes_json).unwrap_or_default(),
                    last_seen: row.get(3)?,
                    task_ids: serde_json::from_str(&tasks_json).unwrap_or_default(),
                })
            },
        )
        .optional()?;
    Ok(worker)
}

pub fn list_workers(conn: &Connection) -> Result<Vec<Worker>, BrokerError> {
    let mut stmt = conn.prepare("SELECT worker_id, worker_type, allowed_lanes, last_seen, task_ids FROM workers ORDER BY last_seen DESC")?;
    let workers = stmt
        .query_map([], |row| {
            let lanes_json: String = row.get(2)?;
            let tasks_json: String = row.get(4)?;
            Ok(Worker {
                worker_id: row.get(0)?,
                worker_type: row.get(1)?,
                allowed_lanes: serde_json::from_str(&lanes_json).unwrap_or_default(),
                last_seen: row.get(3)?,
                task_ids: serde_json::from_str(&tasks_json).unwrap_or_default(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(workers)
}
