use serde::{Deserialize, Serialize};

/// A dependency edge. `dependency_id` is set for a known task; `dep_token`
/// is set for an opaque token the resolver does not understand (e.g.
/// `"docs:missing_key"`). Exactly one of the two is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: String,
    pub dependency_id: Option<String>,
    pub dep_token: Option<String>,
}

impl TaskDependency {
    pub fn is_unknown(&self) -> bool {
        self.dep_token.is_some()
    }
}
