//! `PlanInput` — the structured-JSON plan format this crate accepts. A
//! markdown front-matter flavor is accepted as a thin adapter that lowers
//! to the same struct, for compatibility with documents produced by
//! external extractors.

use serde::{Deserialize, Serialize};

use crate::error::BrokerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInput {
    pub id: String,
    pub lane: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub agent: Option<String>,
    pub archetype: Option<String>,
    pub risk: Option<String>,
    pub source_ids: Option<Vec<String>>,
    pub after: Option<Vec<String>>,
    pub documents: Option<Vec<DocumentInput>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInput {
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub documents: Option<Vec<DocumentInput>>,
    pub tasks: Vec<TaskInput>,
}

/// Parses a plan artifact. A document starting with a `---` front-matter
/// block has the block parsed as the `PlanInput` JSON; anything else is
/// parsed as plain JSON.
pub fn parse_plan(raw: &str) -> Result<PlanInput, BrokerError> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with("---") {
        let mut parts = trimmed.splitn(3, "---");
        parts.next(); // leading empty segment
        let front_matter = parts
            .next()
            .ok_or_else(|| BrokerError::validation("malformed front-matter plan document"))?;
        return serde_json::from_str(front_matter.trim())
            .map_err(|e| BrokerError::validation(format!("invalid plan front matter: {e}")));
    }

    serde_json::from_str(trimmed).map_err(|e| BrokerError::validation(format!("invalid plan JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let raw = r#"{"name":"p1","title":"Plan One","tasks":[{"id":"t1","lane":"backend","title":"Do thing"}]}"#;
        let input = parse_plan(raw).unwrap();
        assert_eq!(input.name, "p1");
        assert_eq!(input.tasks.len(), 1);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_plan("not json at all").is_err());
    }
}
