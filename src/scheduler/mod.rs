//! Braided round-robin scheduler with priority preemption.

pub mod lease;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::BrokerError;
use crate::models::{Lane, Task, LANE_ORDER};
use crate::store::{self, config_repo, task_repo};

const MAX_RETRIES: i32 = 5;
const LEASE_TTL_SECS: i64 = 600;
/// Priorities at or below this are treated as HIGH/URGENT and eligible to preempt rotation.
const PREEMPT_PRIORITY_CEILING: i32 = 5;
const COMMIT_RETRIES: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct BlockedLaneInfo {
    pub blocked_reason: String,
    pub unknown_tokens: bool,
}

#[derive(Debug, Clone, Serialize)]
pub enum PickOutcome {
    Picked {
        task: Task,
        preempted: bool,
        lease_id: String,
    },
    NoWork {
        pending_total: i64,
        blocked_lanes: std::collections::BTreeMap<String, BlockedLaneInfo>,
    },
}

fn allowed_lanes_for_worker_type(worker_type: Option<&str>) -> Vec<&'static str> {
    match worker_type {
        Some("backend") => vec!["backend", "qa", "ops"],
        Some("frontend") => vec!["frontend", "docs"],
        _ => LANE_ORDER.to_vec(),
    }
}

fn is_schedulable(conn: &Connection, task_id: &str) -> Result<bool, BrokerError> {
    let (incomplete, unknown) = task_repo::unresolved_dependency_summary(conn, task_id)?;
    Ok(!incomplete && !unknown)
}

/// Reap `in_progress` tasks whose lease has expired, re-queuing them or
/// dead-lettering them past `MAX_RETRIES`. Runs as step 1 of `pick_next`
/// and is also exposed standalone via `lease::reap_stale`.
pub(crate) fn reap(conn: &Connection, now: i64) -> Result<u32, BrokerError> {
    let expired = task_repo::list_expired_leases(conn, now)?;
    let mut reaped = 0;
    for task in expired {
        if task.retry_count + 1 > MAX_RETRIES {
            store::state_writer::update_task_state(
                conn,
                &task.id,
                crate::models::TaskStatus::DeadLetter,
                store::state_writer::StateMutation::default(),
            )?;
            warn!(task_id = %task.id, retry_count = task.retry_count, "task exceeded max retries, dead-lettered");
        } else {
            store::state_writer::update_task_state(
                conn,
                &task.id,
                crate::models::TaskStatus::Pending,
                store::state_writer::StateMutation {
                    retry_count_delta: 1,
                    ..Default::default()
                },
            )?;
            warn!(task_id = %task.id, "lease expired, task re-queued");
        }
        store::message_repo::insert_message(
            conn,
            &task.id,
            crate::models::MessageRole::System,
            "lease_reaped",
            &format!("lease for worker {:?} expired at {}", task.worker_id, task.lease_expires_at),
        )?;
        reaped += 1;
    }
    Ok(reaped)
}

pub fn pick_next(
    conn: &Connection,
    plan_id: &str,
    worker_id: &str,
    worker_type: Option<&str>,
    blocked_lanes: &[String],
) -> Result<PickOutcome, BrokerError> {
    store::transaction(conn, |tx| {
        let now = now_unix();
        reap(tx, now)?;

        let allowed: Vec<&str> = allowed_lanes_for_worker_type(worker_type)
            .into_iter()
            .filter(|l| !blocked_lanes.iter().any(|b| b == l))
            .collect();

        for attempt in 0..COMMIT_RETRIES {
            let pointer = config_repo::get_lane_pointer(tx)?;
            let candidates = task_repo::list_pending_for_lanes(tx, plan_id, &allowed)?;

            let mut schedulable = Vec::new();
            let mut blocked_info: std::collections::BTreeMap<String, BlockedLaneInfo> = Default::default();
            for t in &candidates {
                if is_schedulable(tx, &t.id)? {
                    schedulable.push(t.clone());
                } else {
                    let (incomplete, unknown) = task_repo::unresolved_dependency_summary(tx, &t.id)?;
                    let reason = if unknown { "UNKNOWN_DEPS" } else if incomplete { "INCOMPLETE_DEPS" } else { "" };
                    blocked_info.insert(
                        t.lane.as_str().to_string(),
                        BlockedLaneInfo { blocked_reason: reason.to_string(), unknown_tokens: unknown },
                    );
                }
            }

            if schedulable.is_empty() {
                let pending_total: i64 = candidates.len() as i64;
                return Ok(PickOutcome::NoWork { pending_total, blocked_lanes: blocked_info });
            }

            // Preemption scan: lowest-priority row overall, if it qualifies as HIGH/URGENT.
            let mut preempt_candidate = schedulable.clone();
            preempt_candidate.sort_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(a.lane_rank.cmp(&b.lane_rank))
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            });
            let best_preempt = preempt_candidate.first().cloned();

            // Rotation scan: walk lane order starting at pointer.
            let mut rotation_pick: Option<Task> = None;
            for offset in 0..LANE_ORDER.len() {
                let idx = (pointer as usize + offset) % LANE_ORDER.len();
                let lane_name = LANE_ORDER[idx];
                if !allowed.contains(&lane_name) {
                    continue;
                }
                let mut lane_tasks: Vec<&Task> = schedulable.iter().filter(|t| t.lane.as_str() == lane_name).collect();
                lane_tasks.sort_by(|a, b| {
                    a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)).then(a.id.cmp(&b.id))
                });
                if let Some(t) = lane_tasks.first() {
                    rotation_pick = Some((*t).clone());
                    break;
                }
            }

            let (picked, preempted) = match (&best_preempt, &rotation_pick) {
                (Some(p), Some(r)) if p.priority <= PREEMPT_PRIORITY_CEILING && p.id != r.id && p.priority < r.priority => {
                    (p.clone(), true)
                }
                (_, Some(r)) => (r.clone(), false),
                (Some(p), None) => (p.clone(), false),
                (None, None) => {
                    return Ok(PickOutcome::NoWork {
                        pending_total: candidates.len() as i64,
                        blocked_lanes: blocked_info,
                    })
                }
            };

            let lease_id = lease::generate_lease_id();
            let lease_expires_at = now + LEASE_TTL_SECS;

            let claimed = store::state_writer::claim_task(tx, &picked.id, worker_id, &lease_id, lease_expires_at)?;

            if !claimed {
                // Lost the race to another claimant; retry the scan.
                continue;
            }

            let picked_lane_rank = picked.lane_rank;
            let new_pointer = (picked_lane_rank + 1) % LANE_ORDER.len() as i32;
            config_repo::set_lane_pointer(tx, new_pointer, picked.lane.as_str())?;
            config_repo::set_last_decision(
                tx,
                &serde_json::json!({
                    "lane": picked.lane.as_str(),
                    "task_id": picked.id,
                    "reason": if preempted { "preempt" } else { "rotation" },
                    "pointer_before": pointer,
                    "pointer_after": new_pointer,
                }),
            )?;

            info!(task_id = %picked.id, lane = %picked.lane.as_str(), preempted, attempt, "scheduler picked task");

            let picked_refreshed = task_repo::get_task_by_id(tx, &picked.id)?;
            return Ok(PickOutcome::Picked {
                task: picked_refreshed,
                preempted,
                lease_id,
            });
        }

        Ok(PickOutcome::NoWork {
            pending_total: 0,
            blocked_lanes: Default::default(),
        })
    })
}

pub(crate) fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_order_is_canonical() {
        assert_eq!(LANE_ORDER, ["backend", "frontend", "qa", "ops", "docs"]);
    }

    #[test]
    fn allowed_lanes_backend_worker() {
        assert_eq!(allowed_lanes_for_worker_type(Some("backend")), vec!["backend", "qa", "ops"]);
    }

    #[test]
    fn allowed_lanes_frontend_worker() {
        assert_eq!(allowed_lanes_for_worker_type(Some("frontend")), vec!["frontend", "docs"]);
    }

    #[test]
    fn allowed_lanes_unset_is_all() {
        assert_eq!(allowed_lanes_for_worker_type(None), LANE_ORDER.to_vec());
    }

    #[test]
    fn lane_rank_matches_position() {
        assert_eq!(Lane::Backend.rank(), 0);
        assert_eq!(Lane::Docs.rank(), 4);
    }
}
