use rusqlite::{params, Connection, OptionalExtension};

use crate::error::BrokerError;
use crate::models::ReviewPacket;

/// Insert-only: a second call for the same task id fails the PRIMARY KEY
/// constraint, since `review_packets` is immutable once submitted.
pub fn insert_review_packet(
    conn: &Connection,
    task_id: &str,
    claims: &str,
    evidence: &[String],
    gatekeeper_summary: Option<&str>,
) -> Result<ReviewPacket, BrokerError> {
    let evidence_json = serde_json::to_string(evidence).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO review_packets (task_id, claims, evidence, gatekeeper_summary) VALUES (?1, ?2, ?3, ?4)",
        params![task_id, claims, evidence_json, gatekeeper_summary],
    )?;
    get_review_packet(conn, task_id)?.ok_or_else(|| BrokerError::task_not_found(task_id))
}

pub fn get_review_packet(conn: &Connection, task_id: &str) -> Result<Option<ReviewPacket>, BrokerError> {
    let packet = conn
        .query_row(
            "SELECT task_id, claims, evidence, gatekeeper_summary, submitted_at FROM review_packets WHERE task_id = ?1",
            params![task_id],
            |row| {
                let evidence_json: String = row.get(2)?;
                Ok(ReviewPacket {
                    task_id: row.get(0)?,
                    claims: row.get(1)?,
                    evidence: serde_json::from_str(&evidence_json).unwrap_or_default(),
                    gatekeeper_summary: row.get(3)?,
                    submitted_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(packet)
}
