use rusqlite::{params, Connection};

use crate::error::BrokerError;
use crate::models::{Actor, LedgerEntry, ReviewDecision};

/// Append-only: no UPDATE/DELETE path exists anywhere in this crate.
pub fn append(
    conn: &Connection,
    task_id: &str,
    decision: ReviewDecision,
    actor: Actor,
    snapshot_hash: &str,
    notes: Option<&str>,
) -> Result<LedgerEntry, BrokerError> {
    let id = ulid::Ulid::new().to_string();
    conn.execute(
        "INSERT INTO ledger (id, task_id, decision, actor, snapshot_hash, notes) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, task_id, decision.as_str(), actor.as_str(), snapshot_hash, notes],
    )?;
    conn.query_row(
        "SELECT id, task_id, decision, actor, snapshot_hash, notes, created_at FROM ledger WHERE id = ?1",
        params![id],
        |row| {
            let decision_str: String = row.get(2)?;
            let actor_str: String = row.get(3)?;
            Ok(LedgerEntry {
                id: row.get(0)?,
                task_id: row.get(1)?,
                decision: ReviewDecision::from_str(&decision_str).unwrap_or(ReviewDecision::Kickback),
                actor: Actor::from_str(&actor_str).unwrap_or(Actor::Human),
                snapshot_hash: row.get(4)?,
                notes: row.get(5)?,
                created_at: row.get(6)?,
            })
        },
    )
    .map_err(BrokerError::from)
}

pub fn latest_for_task(conn: &Connection, task_id: &str) -> Result<Option<LedgerEntry>, BrokerError> {
    use rusqlite::OptionalExtension;
    let entry = conn
        .query_row(
            "SELECT id, task_id, decision, actor, snapshot_hash, notes, created_at
             FROM ledger WHERE task_id = ?1 ORDER BY created_at DESC LIMIT 1",
            params![task_id],
            |row| {
                let decision_str: String = row.get(2)?;
                let actor_str: String = row.get(3)?;
                Ok(LedgerEntry {
                    id: row.get(0)?,
                    task_id: row.get(1)?,
                    decision: ReviewDecision::from_str(&decision_str).unwrap_or(ReviewDecision::Kickback),
                    actor: Actor::from_str(&actor_str).unwrap_or(Actor::Human),
                    snapshot_hash: row.get(4)?,
                    notes: row.get(5)?,
                    created_at: row.get(6)?,
                })
            },
        )
        .optional()?;
    Ok(entry)
}

/// Most recent REJECT decisions across all tasks, for the snapshot's
/// `RED_DECISION` alert.
pub fn recent_rejects(conn: &Connection, limit: i64) -> Result<Vec<LedgerEntry>, BrokerError> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, decision, actor, snapshot_hash, notes, created_at
         FROM ledger WHERE decision = 'REJECT' ORDER BY created_at DESC LIMIT ?1",
    )?;
    let entries = stmt
        .query_map(params![limit], |row| {
            let decision_str: String = row.get(2)?;
            let actor_str: String = row.get(3)?;
            Ok(LedgerEntry {
                id: row.get(0)?,
                task_id: row.get(1)?,
                decision: ReviewDecision::from_str(&decision_str).unwrap_or(ReviewDecision::Kickback),
                actor: Actor::from_str(&actor_str).unwrap_or(Actor::Human),
                snapshot_hash: row.get(4)?,
                notes: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

/// Append the entry's JSON form to the out-of-band `ledger.jsonl` mirror.
/// Best-effort: a write failure here never fails the caller's transaction,
/// it is a convenience export, not the source of truth.
pub fn mirror_to_jsonl(state_dir: &std::path::Path, entry: &LedgerEntry) {
    use std::io::Write;
    let path = state_dir.join("ledger.jsonl");
    let line = match serde_json::to_string(entry) {
        Ok(l) => l,
        Err(_) => return,
    };
    if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{line}");
    }
}
