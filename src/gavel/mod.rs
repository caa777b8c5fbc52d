//! Review engine: gates a task's `reviewing -> {completed, pending, dead_letter}`
//! transition behind evidence, test-pairing, entropy, confidence, and
//! auto-approve-safety checks.

mod registry;

pub use registry::{cached as cached_registry, Authority, SourceRegistry};

use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::error::{BrokerError, ErrorCode};
use crate::models::{Actor, Archetype, MessageRole, ReviewDecision, Task, TaskStatus};
use crate::store::{self, ledger_repo, message_repo, provenance_repo, review_packet_repo, task_repo};

#[derive(Debug, Clone, Serialize)]
pub struct GavelOutcome {
    pub decision: ReviewDecision,
    pub task: Task,
}

fn parse_actor(raw: &str) -> Result<Actor, BrokerError> {
    Actor::from_str(raw).ok_or_else(|| BrokerError::validation(format!("unknown actor: {raw}")))
}

fn evidence_gate(conn: &Connection, registry: &SourceRegistry, task: &Task) -> Result<(), BrokerError> {
    if review_packet_repo::get_review_packet(conn, &task.id)?.is_none() {
        return Err(BrokerError::new(
            ErrorCode::MissingEvidence,
            format!("task {} has no review packet on file", task.id),
        ));
    }

    let authority = registry.resolve_worst_authority(&task.source_ids);
    match authority {
        Authority::Mandatory => {
            let missing = provenance_repo::missing_evidence(conn, &task.source_ids)?;
            if !missing.is_empty() {
                return Err(BrokerError::new(
                    ErrorCode::MissingEvidence,
                    format!("MISSING EVIDENCE for mandatory sources: {}", missing.join(", ")),
                ));
            }
        }
        Authority::Strong => {
            let missing = provenance_repo::missing_evidence(conn, &task.source_ids)?;
            let has_override = task
                .override_justification
                .as_deref()
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false);
            if !missing.is_empty() && !has_override {
                return Err(BrokerError::new(
                    ErrorCode::MissingEvidence,
                    format!("MISSING EVIDENCE for strong sources: {}", missing.join(", ")),
                ));
            }
        }
        Authority::Default => {}
    }
    Ok(())
}

fn test_pairing_gate(conn: &Connection, task: &Task) -> Result<(), BrokerError> {
    if !task.archetype.is_risky() {
        return Ok(());
    }
    let siblings = task_repo::list_tasks_for_plan(conn, &task.plan_id)?;
    let has_pair = siblings.iter().any(|s| {
        s.archetype == Archetype::Test
            && s.description.as_deref().unwrap_or("").contains(task.id.as_str())
    });
    if !has_pair {
        return Err(BrokerError::new(
            ErrorCode::MissingTestPair,
            format!("task {} ({:?}) has no paired TEST task referencing it", task.id, task.archetype),
        ));
    }
    Ok(())
}

fn entropy_gate(notes: &str) -> Result<(), BrokerError> {
    const MARKERS: [&str; 3] = ["Entropy Check: Passed", "OPTIMIZATION WAIVED:", "CAPTAIN_OVERRIDE: ENTROPY"];
    if MARKERS.iter().any(|m| notes.contains(m)) {
        Ok(())
    } else {
        Err(BrokerError::new(
            ErrorCode::MissingEntropyProof,
            "review notes contain no entropy check marker",
        ))
    }
}

fn extract_confidence(notes: &str) -> Option<u32> {
    let idx = notes.find("Verify:")?;
    let rest = &notes[idx + "Verify:".len()..];
    let digits: String = rest.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn confidence_gate(task: &Task, notes: &str) -> Result<(), BrokerError> {
    let floor = match task.risk.confidence_floor() {
        Some(f) => f,
        None => return Ok(()),
    };
    if notes.contains("CAPTAIN_OVERRIDE: CONFIDENCE") {
        return Ok(());
    }
    match extract_confidence(notes) {
        None => Err(BrokerError::new(
            ErrorCode::MissingConfidenceProof,
            format!("review notes contain no 'Verify: N/100' marker (risk={:?} requires >= {floor})", task.risk),
        )),
        Some(n) if n < floor => Err(BrokerError::new(
            ErrorCode::InsufficientConfidence,
            format!("confidence {n} below required floor {floor} for risk={:?}", task.risk),
        )),
        Some(_) => Ok(()),
    }
}

fn auto_approve_safety_gate(registry: &SourceRegistry, actor: Actor, task: &Task) -> Result<(), BrokerError> {
    if actor != Actor::Auto {
        return Ok(());
    }
    let authority = registry.resolve_worst_authority(&task.source_ids);
    let risky_archetype = task.archetype.is_risky() || task.archetype == Archetype::Sec;
    if authority != Authority::Default || risky_archetype {
        return Err(BrokerError::new(
            ErrorCode::UnauthorizedAuto,
            "AUTO actor may only approve DEFAULT-authority, non-risky tasks",
        ));
    }
    Ok(())
}

pub fn submit_review_decision(
    conn: &Connection,
    registry: &SourceRegistry,
    state_dir: &Path,
    task_id: &str,
    decision_raw: &str,
    notes: &str,
    actor_raw: &str,
) -> Result<GavelOutcome, BrokerError> {
    let actor = parse_actor(actor_raw)?;
    let decision = ReviewDecision::from_str(decision_raw)
        .ok_or_else(|| BrokerError::validation(format!("unknown decision: {decision_raw}")))?;

    store::transaction(conn, |tx| {
        let task = task_repo::get_task_by_id(tx, task_id)?;
        if task.status != TaskStatus::Reviewing {
            return Err(BrokerError::illegal_transition(task.status.as_str(), "review"));
        }

        if decision == ReviewDecision::Approve {
            provenance_repo::ensure_loaded(tx, state_dir)?;
            evidence_gate(tx, registry, &task)?;
            test_pairing_gate(tx, &task)?;
            entropy_gate(notes)?;
            confidence_gate(&task, notes)?;
            auto_approve_safety_gate(registry, actor, &task)?;
        }

        let (new_status, mutation) = match decision {
            ReviewDecision::Approve => (
                TaskStatus::Completed,
                store::state_writer::StateMutation {
                    review_decision: Some(decision_raw),
                    review_notes: Some(notes),
                    ..Default::default()
                },
            ),
            ReviewDecision::Kickback => (
                TaskStatus::Pending,
                store::state_writer::StateMutation {
                    retry_count_delta: 1,
                    review_decision: Some(decision_raw),
                    review_notes: Some(notes),
                    ..Default::default()
                },
            ),
            ReviewDecision::Reject => (
                TaskStatus::DeadLetter,
                store::state_writer::StateMutation {
                    review_decision: Some(decision_raw),
                    review_notes: Some(notes),
                    ..Default::default()
                },
            ),
        };

        let updated = store::state_writer::update_task_state(tx, task_id, new_status, mutation)?;

        let snapshot_hash = blake3::hash(format!("{}:{}:{}", task_id, decision.as_str(), notes).as_bytes())
            .to_hex()
            .to_string();
        let entry = ledger_repo::append(tx, task_id, decision, actor, &snapshot_hash, Some(notes))?;

        message_repo::insert_message(tx, task_id, MessageRole::Auditor, "review_decision", notes)?;

        if let Ok(dir) = store::state_dir() {
            ledger_repo::mirror_to_jsonl(&dir, &entry);
        }

        info!(task_id = %task_id, decision = %decision.as_str(), actor = %actor.as_str(), "gavel decision recorded");

        Ok(GavelOutcome { decision, task: updated })
    })
}

/// Dependency-graph cycle check used by the plan acceptor; lives here
/// because it shares the "deny before anything mutates" shape with the
/// gates above, though it has nothing to do with review.
pub fn has_cycle(edges: &[(String, String)]) -> bool {
    use std::collections::HashMap;

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for (task, dep) in edges {
        adjacency.entry(task.as_str()).or_default().push(dep.as_str());
    }

    #[derive(PartialEq, Clone, Copy)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> bool {
        match marks.get(node) {
            Some(Mark::Done) => return false,
            Some(Mark::Visiting) => return true,
            None => {}
        }
        marks.insert(node, Mark::Visiting);
        if let Some(children) = adjacency.get(node) {
            for child in children {
                if visit(child, adjacency, marks) {
                    return true;
                }
            }
        }
        marks.insert(node, Mark::Done);
        false
    }

    let mut marks = HashMap::new();
    for node in adjacency.keys() {
        if visit(node, &adjacency, &mut marks) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_simple_cycle() {
        let edges = vec![("a".to_string(), "b".to_string()), ("b".to_string(), "a".to_string())];
        assert!(has_cycle(&edges));
    }

    #[test]
    fn allows_dag() {
        let edges = vec![("a".to_string(), "b".to_string()), ("b".to_string(), "c".to_string())];
        assert!(!has_cycle(&edges));
    }

    #[test]
    fn entropy_gate_accepts_waiver() {
        assert!(entropy_gate("OPTIMIZATION WAIVED: not applicable").is_ok());
        assert!(entropy_gate("no marker here").is_err());
    }

    #[test]
    fn confidence_extraction_parses_score() {
        assert_eq!(extract_confidence("notes Verify: 97/100 done"), Some(97));
        assert_eq!(extract_confidence("no score"), None);
    }
}
