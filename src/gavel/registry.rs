//! Source authority registry, loaded once per process and cached.
//!
//! Shape grounded in the original policy engine's mock registry:
//! `{"sources": {name: {authority, id_pattern}}, "curated_rules": {name: {id_pattern}}}`.

use std::path::Path;

use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::error::BrokerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Authority {
    Default,
    Strong,
    Mandatory,
}

#[derive(Debug, Clone, Deserialize)]
struct SourceRule {
    authority: Authority,
    id_pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CuratedRule {
    id_pattern: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RegistryFile {
    #[serde(default)]
    sources: std::collections::HashMap<String, SourceRule>,
    #[serde(default)]
    curated_rules: std::collections::HashMap<String, CuratedRule>,
}

#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceRule>,
    curated_prefixes: Vec<String>,
}

impl SourceRegistry {
    fn empty() -> Self {
        Self { sources: Vec::new(), curated_prefixes: Vec::new() }
    }

    pub fn load(path: &Path) -> Result<Self, BrokerError> {
        if !path.exists() {
            return Ok(Self::empty());
        }
        let contents = std::fs::read_to_string(path)?;
        let parsed: RegistryFile = serde_json::from_str(&contents)
            .map_err(|e| BrokerError::validation(format!("invalid source_registry.json: {e}")))?;

        let sources = parsed.sources.into_values().collect();
        let curated_prefixes = parsed
            .curated_rules
            .into_values()
            .map(|rule| prefix_of(&rule.id_pattern))
            .collect();

        Ok(Self { sources, curated_prefixes })
    }

    /// Worst-case (highest) authority among `source_ids`. An id matching a
    /// curated rule is always `MANDATORY`; unmatched ids resolve `DEFAULT`.
    pub fn resolve_worst_authority(&self, source_ids: &[String]) -> Authority {
        source_ids
            .iter()
            .map(|id| self.resolve_one(id))
            .max()
            .unwrap_or(Authority::Default)
    }

    fn resolve_one(&self, source_id: &str) -> Authority {
        let lower = source_id.to_ascii_lowercase();
        if self.curated_prefixes.iter().any(|p| lower.starts_with(p.as_str())) {
            return Authority::Mandatory;
        }
        self.sources
            .iter()
            .filter(|rule| lower.starts_with(prefix_of(&rule.id_pattern).as_str()))
            .map(|rule| rule.authority)
            .max()
            .unwrap_or(Authority::Default)
    }
}

/// The text of `id_pattern` before its trailing `*`, case-folded.
fn prefix_of(id_pattern: &str) -> String {
    id_pattern.trim_end_matches('*').to_ascii_lowercase()
}

/// Cached for the lifetime of the process; loaded once from
/// `<state_dir>/source_registry.json` on first access.
static REGISTRY: OnceCell<SourceRegistry> = OnceCell::new();

pub fn cached(state_dir: &Path) -> Result<&'static SourceRegistry, BrokerError> {
    if let Some(existing) = REGISTRY.get() {
        return Ok(existing);
    }
    let loaded = SourceRegistry::load(&state_dir.join("source_registry.json"))?;
    Ok(REGISTRY.get_or_init(|| loaded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_strips_trailing_star() {
        assert_eq!(prefix_of("docs/api*"), "docs/api");
    }

    #[test]
    fn unmatched_id_is_default() {
        let registry = SourceRegistry::empty();
        assert_eq!(registry.resolve_worst_authority(&["unknown.txt".to_string()]), Authority::Default);
    }
}
