use serde::{Deserialize, Serialize};

/// Materialized by a worker before `complete_task`; immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPacket {
    pub task_id: String,
    pub claims: String,
    pub evidence: Vec<String>,
    pub gatekeeper_summary: Option<String>,
    pub submitted_at: String,
}
