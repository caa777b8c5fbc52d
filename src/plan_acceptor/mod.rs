//! Parses plan artifacts, runs the readiness gate, and inserts tasks
//! idempotently by content hash.

mod input;
mod preview;

pub use input::{PlanInput, TaskInput};

use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::error::BrokerError;
use crate::gavel::has_cycle;
use crate::models::{Archetype, ExecClass, Lane, NewTask, Risk, Task};
use crate::readiness::{get_context_readiness, ReadinessStatus};
use crate::store::{self, dependency_repo, plan_repo, task_repo};

#[derive(Debug, Clone, Serialize)]
pub enum AcceptOutcome {
    Created { plan_id: String, tasks: Vec<Task>, plan_hash: String },
    AlreadyAccepted { plan_hash: String },
    BlockedBootstrap { blocking_files: Vec<String> },
}

fn canonicalize(content: &str) -> String {
    content
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn normalize_description(description: &str) -> String {
    description.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

fn plan_hash_of(content: &str) -> String {
    blake3::hash(canonicalize(content).as_bytes()).to_hex().to_string()
}

fn task_signature_of(lane: &str, description: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(lane.as_bytes());
    hasher.update(b"\0");
    hasher.update(normalize_description(description).as_bytes());
    hasher.finalize().to_hex().to_string()
}

pub fn accept_plan(conn: &Connection, docs_dir: &Path, raw_path: &Path) -> Result<AcceptOutcome, BrokerError> {
    let readiness = get_context_readiness(docs_dir);
    if readiness.status != ReadinessStatus::Execution {
        return Ok(AcceptOutcome::BlockedBootstrap { blocking_files: readiness.blocking_files });
    }

    let raw = std::fs::read_to_string(raw_path)?;
    let plan_hash = plan_hash_of(&raw);

    if task_repo::plan_hash_exists(conn, &plan_hash)? {
        return Ok(AcceptOutcome::AlreadyAccepted { plan_hash });
    }

    let input = input::parse_plan(&raw)?;

    store::transaction(conn, |tx| {
        let plan = plan_repo::insert_plan(tx, &input.name, &input.title, input.description.as_deref(), &plan_hash)?;

        let mut seen_signatures = std::collections::HashSet::new();
        let mut inserted = Vec::new();
        let mut id_to_db_id: std::collections::HashMap<String, String> = std::collections::HashMap::new();

        for task_input in &input.tasks {
            let lane = Lane::from_str(&task_input.lane)
                .ok_or_else(|| BrokerError::validation(format!("unknown lane: {}", task_input.lane)))?;
            let description = task_input.description.clone().unwrap_or_default();
            let signature = task_signature_of(lane.as_str(), &description);

            if !seen_signatures.insert(signature.clone()) {
                continue; // duplicate within this plan, keep first occurrence
            }
            if task_repo::signature_exists(tx, &plan_hash, &signature)? {
                continue;
            }

            let new_task = NewTask {
                lane,
                title: task_input.title.clone(),
                description: task_input.description.clone(),
                priority: task_input.priority.unwrap_or(10),
                exec_class: ExecClass::Parallel,
                archetype: task_input
                    .archetype
                    .as_deref()
                    .and_then(Archetype::from_str)
                    .unwrap_or(Archetype::Generic),
                risk: task_input.risk.as_deref().and_then(Risk::from_str).unwrap_or(Risk::Low),
                source_ids: task_input.source_ids.clone().unwrap_or_default(),
                agent: task_input.agent.clone(),
            };

            let seq = task_repo::next_seq(tx, &plan.id)?;
            let task = task_repo::insert_task(tx, &plan.id, seq, &plan_hash, &signature, &new_task)?;
            id_to_db_id.insert(task_input.id.clone(), task.id.clone());
            inserted.push((task_input.clone(), task));
        }

        let mut edges = Vec::new();
        for (task_input, task) in &inserted {
            for after in task_input.after.iter().flatten() {
                if let Some(dep_db_id) = id_to_db_id.get(after) {
                    dependency_repo::insert_dependency(tx, &task.id, dep_db_id)?;
                    edges.push((task.id.clone(), dep_db_id.clone()));
                } else {
                    // Unresolvable reference: either a `lane:token` opaque
                    // dependency or a reference to a task outside this plan.
                    dependency_repo::insert_unknown_dependency(tx, &task.id, after)?;
                }
            }
        }

        if has_cycle(&edges) {
            return Err(BrokerError::cycle_detected());
        }

        preview::render(tx, &plan.id)?;

        info!(plan_id = %plan.id, task_count = inserted.len(), "plan accepted");

        Ok(AcceptOutcome::Created {
            plan_id: plan.id,
            tasks: inserted.into_iter().map(|(_, t)| t).collect(),
            plan_hash,
        })
    })
}
