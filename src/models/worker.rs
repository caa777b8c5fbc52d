use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: String,
    pub worker_type: Option<String>,
    pub allowed_lanes: Vec<String>,
    pub last_seen: i64,
    pub task_ids: Vec<String>,
}
