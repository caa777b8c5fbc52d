use serde::{Deserialize, Serialize};

/// Canonical lane order. The scheduler rotates through this exact sequence.
pub const LANE_ORDER: [&str; 5] = ["backend", "frontend", "qa", "ops", "docs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Backend,
    Frontend,
    Qa,
    Ops,
    Docs,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Frontend => "frontend",
            Self::Qa => "qa",
            Self::Ops => "ops",
            Self::Docs => "docs",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        // Normalize common aliases (e.g. "back-end", "front_end") before matching.
        let normalized = s.to_ascii_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "backend" => Some(Self::Backend),
            "frontend" => Some(Self::Frontend),
            "qa" => Some(Self::Qa),
            "ops" => Some(Self::Ops),
            "docs" => Some(Self::Docs),
            _ => None,
        }
    }

    /// Position of this lane in the canonical rotation order.
    pub fn rank(&self) -> i32 {
        LANE_ORDER.iter().position(|l| *l == self.as_str()).unwrap_or(LANE_ORDER.len()) as i32
    }

    pub fn from_rank(rank: i32) -> Option<Self> {
        LANE_ORDER.get(rank as usize).and_then(|s| Self::from_str(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Reviewing,
    Completed,
    Blocked,
    DeadLetter,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Reviewing => "reviewing",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::DeadLetter => "dead_letter",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "reviewing" => Some(Self::Reviewing),
            "completed" => Some(Self::Completed),
            "blocked" => Some(Self::Blocked),
            "dead_letter" => Some(Self::DeadLetter),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::DeadLetter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecClass {
    Exclusive,
    Parallel,
}

impl ExecClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exclusive => "exclusive",
            Self::Parallel => "parallel",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "exclusive" => Some(Self::Exclusive),
            "parallel" => Some(Self::Parallel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Archetype {
    Plumbing,
    Logic,
    Sec,
    Api,
    Db,
    Ui,
    Test,
    Generic,
}

impl Archetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plumbing => "PLUMBING",
            Self::Logic => "LOGIC",
            Self::Sec => "SEC",
            Self::Api => "API",
            Self::Db => "DB",
            Self::Ui => "UI",
            Self::Test => "TEST",
            Self::Generic => "GENERIC",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PLUMBING" => Some(Self::Plumbing),
            "LOGIC" => Some(Self::Logic),
            "SEC" => Some(Self::Sec),
            "API" => Some(Self::Api),
            "DB" => Some(Self::Db),
            "UI" => Some(Self::Ui),
            "TEST" => Some(Self::Test),
            "GENERIC" => Some(Self::Generic),
            _ => None,
        }
    }

    /// Archetypes whose review requires a sibling TEST task (Gavel gate 2).
    pub fn is_risky(&self) -> bool {
        matches!(self, Self::Logic | Self::Sec | Self::Api | Self::Db)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl Risk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }

    /// Minimum `Verify: N/100` score the Gavel's confidence gate requires.
    pub fn confidence_floor(&self) -> Option<u32> {
        match self {
            Self::Low => None,
            Self::Medium => Some(90),
            Self::High => Some(95),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub plan_id: String,
    pub seq: i64,
    pub lane: Lane,
    pub lane_rank: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: i32,
    pub exec_class: ExecClass,
    pub archetype: Archetype,
    pub risk: Risk,
    pub source_ids: Vec<String>,
    pub source_plan_hash: String,
    pub task_signature: String,
    pub agent: Option<String>,
    pub worker_id: Option<String>,
    pub lease_id: String,
    pub lease_expires_at: i64,
    pub retry_count: i32,
    pub review_decision: Option<String>,
    pub review_notes: Option<String>,
    pub override_justification: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub heartbeat_at: i64,
}

impl Task {
    /// `type` is the legacy alias observers key on; it always equals `lane`.
    pub fn type_alias(&self) -> &'static str {
        self.lane.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub lane: Lane,
    pub title: String,
    pub description: Option<String>,
    pub priority: i32,
    pub exec_class: ExecClass,
    pub archetype: Archetype,
    pub risk: Risk,
    pub source_ids: Vec<String>,
    pub agent: Option<String>,
}

impl Default for NewTask {
    fn default() -> Self {
        Self {
            lane: Lane::Backend,
            title: String::new(),
            description: None,
            priority: 10,
            exec_class: ExecClass::Parallel,
            archetype: Archetype::Generic,
            risk: Risk::Low,
            source_ids: Vec::new(),
            agent: None,
        }
    }
}
