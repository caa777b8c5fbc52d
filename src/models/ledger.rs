use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewDecision {
    Approve,
    Reject,
    Kickback,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::Kickback => "KICKBACK",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "APPROVE" => Some(Self::Approve),
            "REJECT" => Some(Self::Reject),
            "KICKBACK" => Some(Self::Kickback),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Actor {
    Human,
    Auto,
    Batch,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "HUMAN",
            Self::Auto => "AUTO",
            Self::Batch => "BATCH",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "HUMAN" => Some(Self::Human),
            "AUTO" => Some(Self::Auto),
            "BATCH" => Some(Self::Batch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub task_id: String,
    pub decision: ReviewDecision,
    pub actor: Actor,
    pub snapshot_hash: String,
    pub notes: Option<String>,
    pub created_at: String,
}
