//! Lease issuance, heartbeat, and completion. `claim` happens only inside
//! `pick_next`'s commit step; the rest of this module is reachable directly
//! by the CLI's `heartbeat`/`complete` subcommands.

use rand::RngCore;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BrokerError;
use crate::models::{MessageRole, Task, TaskStatus};
use crate::store::{self, message_repo, review_packet_repo, task_repo, worker_repo};

use super::now_unix;

const LEASE_TTL_SECS: i64 = 600;

pub fn generate_lease_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResult {
    pub output: Option<String>,
    pub evidence: Vec<String>,
    pub ok: bool,
}

/// Upsert the worker row and extend leases for every task id the worker
/// claims to own (silently ignoring ids it no longer owns; a worker may
/// heartbeat stale ids after a reap raced it).
pub fn heartbeat(
    conn: &Connection,
    worker_id: &str,
    worker_type: Option<&str>,
    allowed_lanes: &[String],
    task_ids: &[String],
) -> Result<u32, BrokerError> {
    store::transaction(conn, |tx| {
        let now = now_unix();
        worker_repo::upsert_worker(tx, worker_id, worker_type, allowed_lanes, now, task_ids)?;

        let mut extended = 0;
        for task_id in task_ids {
            let task = match task_repo::get_task_by_id(tx, task_id) {
                Ok(t) => t,
                Err(_) => {
                    debug!(task_id = %task_id, worker_id = %worker_id, "heartbeat ignored for unknown task");
                    continue;
                }
            };
            if task.worker_id.as_deref() != Some(worker_id) || task.status != TaskStatus::InProgress {
                debug!(task_id = %task_id, worker_id = %worker_id, "heartbeat ignored for unowned task");
                continue;
            }
            tx.execute(
                "UPDATE tasks SET lease_expires_at = ?1, heartbeat_at = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![now + LEASE_TTL_SECS, task_id],
            )?;
            extended += 1;
        }
        Ok(extended)
    })
}

/// Transition a task from `in_progress` to `reviewing`, recording the
/// worker's output and evidence as an immutable review packet.
pub fn complete(
    conn: &Connection,
    task_id: &str,
    worker_id: &str,
    lease_id: &str,
    result: CompleteResult,
) -> Result<Task, BrokerError> {
    store::transaction(conn, |tx| {
        let task = task_repo::get_task_by_id(tx, task_id)?;
        if task.worker_id.as_deref() != Some(worker_id) || task.lease_id != lease_id {
            return Err(BrokerError::lease_mismatch(task_id));
        }

        let updated = store::state_writer::update_task_state(
            tx,
            task_id,
            TaskStatus::Reviewing,
            store::state_writer::StateMutation::default(),
        )?;

        let claims = result.output.clone().unwrap_or_default();
        review_packet_repo::insert_review_packet(tx, task_id, &claims, &result.evidence, None)?;

        message_repo::insert_message(
            tx,
            task_id,
            MessageRole::Worker,
            if result.ok { "complete_ok" } else { "complete_failed" },
            &claims,
        )?;

        Ok(updated)
    })
}

/// Standalone reap sweep, exposed for a periodic caller (an interval task
/// in a long-lived embedding, or an external cron invocation for the CLI).
pub fn reap_stale(conn: &Connection) -> Result<u32, BrokerError> {
    store::transaction(conn, |tx| super::reap(tx, now_unix()))
}
