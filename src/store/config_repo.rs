use rusqlite::{params, Connection, OptionalExtension};

use crate::error::BrokerError;

pub fn get(conn: &Connection, key: &str) -> Result<Option<String>, BrokerError> {
    Ok(conn
        .query_row("SELECT value FROM config WHERE key = ?1", params![key], |r| r.get(0))
        .optional()?)
}

pub fn set(conn: &Connection, key: &str, value: &str) -> Result<(), BrokerError> {
    conn.execute(
        "INSERT INTO config (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub const SCHEDULER_LANE_POINTER: &str = "scheduler_lane_pointer";
pub const SCHEDULER_LAST_DECISION: &str = "scheduler_last_decision";

pub fn get_lane_pointer(conn: &Connection) -> Result<i32, BrokerError> {
    match get(conn, SCHEDULER_LANE_POINTER)? {
        Some(raw) => {
            let value: serde_json::Value = serde_json::from_str(&raw).unwrap_or_default();
            Ok(value.get("index").and_then(|v| v.as_i64()).unwrap_or(0) as i32)
        }
        None => Ok(0),
    }
}

pub fn set_lane_pointer(conn: &Connection, index: i32, lane: &str) -> Result<(), BrokerError> {
    let value = serde_json::json!({ "index": index, "lane": lane });
    set(conn, SCHEDULER_LANE_POINTER, &value.to_string())
}

pub fn set_last_decision(conn: &Connection, decision: &serde_json::Value) -> Result<(), BrokerError> {
    set(conn, SCHEDULER_LAST_DECISION, &decision.to_string())
}

pub fn get_last_decision(conn: &Connection) -> Result<Option<serde_json::Value>, BrokerError> {
    Ok(get(conn, SCHEDULER_LAST_DECISION)?.and_then(|raw| serde_json::from_str(&raw).ok()))
}
