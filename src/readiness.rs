//! Readiness Gate: scores PRD.md / SPEC.md / DECISION_LOG.md against the
//! bootstrap-vs-execution thresholds.
//!
//! Scoring rules recovered from the original `readiness.py` tool: existence,
//! length, required headers, bullet density, with a stub-detection path
//! that disables the length/bullet bonuses until enough real content has
//! been written.

use std::path::Path;

use serde::Serialize;

const STUB_MARKER: &str = "<!-- TEMPLATE_STUB -->";
const PRD_THRESHOLD: u32 = 80;
const SPEC_THRESHOLD: u32 = 80;
const DECISION_LOG_THRESHOLD: u32 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub status: ReadinessStatus,
    pub scores: std::collections::BTreeMap<String, u32>,
    pub blocking_files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReadinessStatus {
    Bootstrap,
    Execution,
}

struct FileSpec {
    name: &'static str,
    fallback: Option<&'static str>,
    headers: &'static [&'static str],
    threshold: u32,
    is_decision_log: bool,
}

const FILE_SPECS: [FileSpec; 3] = [
    FileSpec {
        name: "PRD.md",
        fallback: None,
        headers: &["## Goals", "## User Stories", "## Success Metrics"],
        threshold: PRD_THRESHOLD,
        is_decision_log: false,
    },
    FileSpec {
        name: "SPEC.md",
        fallback: Some("ACTIVE_SPEC.md"),
        headers: &["## Data Model", "## API", "## Security"],
        threshold: SPEC_THRESHOLD,
        is_decision_log: false,
    },
    FileSpec {
        name: "DECISION_LOG.md",
        fallback: None,
        headers: &["## Records"],
        threshold: DECISION_LOG_THRESHOLD,
        is_decision_log: true,
    },
];

fn is_meaningful_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.starts_with('#') || trimmed.starts_with('>') {
        return false;
    }
    if trimmed.contains("{{") || trimmed.contains("}}") {
        return false;
    }
    let stripped_brackets = trimmed.starts_with('[') && trimmed.ends_with(']');
    if stripped_brackets {
        return false;
    }
    if trimmed.starts_with("- [ ]") {
        return false;
    }
    let bare_label = (trimmed.starts_with("**") && trimmed.ends_with("**"))
        || (trimmed.starts_with('*') && trimmed.ends_with('*') && !trimmed.starts_with("- "));
    if bare_label {
        return false;
    }
    trimmed.split_whitespace().count() >= 4
}

fn header_present(content: &str, header: &str) -> bool {
    let needle = header.trim_start_matches('#').trim();
    content.lines().any(|line| {
        let trimmed = line.trim_start();
        let stripped = trimmed.trim_start_matches('#').trim();
        trimmed.starts_with('#') && stripped.eq_ignore_ascii_case(needle)
    })
}

fn bullet_count(content: &str) -> usize {
    content
        .lines()
        .filter(|l| {
            let t = l.trim_start();
            t.starts_with("- ") || t.starts_with("* ") || t.starts_with("- [") || t.starts_with("1. ")
        })
        .count()
}

/// `has_real_decisions`: a DECISION_LOG passes the stub cap if its Records
/// table has a row whose Type isn't a bootstrap `INIT` placeholder.
fn has_real_decisions(content: &str) -> bool {
    content.lines().any(|line| {
        let t = line.trim();
        if !t.starts_with('|') {
            return false;
        }
        let cells: Vec<&str> = t.trim_matches('|').split('|').map(|c| c.trim()).collect();
        if cells.len() < 2 {
            return false;
        }
        let is_separator = cells.iter().all(|c| c.chars().all(|ch| ch == '-' || ch == ':'));
        if is_separator {
            return false;
        }
        let type_cell = cells.get(1).copied().unwrap_or("");
        !type_cell.eq_ignore_ascii_case("INIT") && !type_cell.is_empty()
    })
}

const DECISION_LOG_TEMPLATE: &str = "## Records\n\n| Date | Type | Decision | Rationale |\n|------|------|----------|-----------|\n| TODO | INIT | bootstrap placeholder | pending first real decision |\n";

fn template_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a.trim(), b.trim())
}

fn score_file(spec: &FileSpec, content: Option<&str>) -> u32 {
    let content = match content {
        Some(c) => c,
        None => return 0,
    };

    let mut score = 10u32; // exists

    let is_stub = content.contains(STUB_MARKER);
    let meaningful_lines = content.lines().filter(|l| is_meaningful_line(l)).count();
    let bonuses_enabled = !is_stub || meaningful_lines >= 6;

    if bonuses_enabled {
        let word_count = content.split_whitespace().count();
        if word_count > 150 {
            score += 20;
        }

        let header_hits = spec.headers.iter().filter(|h| header_present(content, h)).count() as u32;
        score += (header_hits * 10).min(50);

        if bullet_count(content) > 5 {
            score += 20;
        }

        if is_stub && meaningful_lines >= 10 {
            score += 20;
        }
    }

    if spec.is_decision_log && is_stub {
        let real_decisions = has_real_decisions(content);
        let similarity = template_similarity(content, DECISION_LOG_TEMPLATE);
        if !real_decisions || similarity >= 0.85 {
            score = score.min(40);
        }
    } else if is_stub && meaningful_lines < 6 {
        score = score.min(40);
    }

    score
}

fn read_file(docs_dir: &Path, spec: &FileSpec) -> Option<String> {
    let primary = docs_dir.join(spec.name);
    if let Ok(content) = std::fs::read_to_string(&primary) {
        return Some(content);
    }
    if let Some(fallback) = spec.fallback {
        if let Ok(content) = std::fs::read_to_string(docs_dir.join(fallback)) {
            return Some(content);
        }
    }
    None
}

/// Fails open: any error reading the docs directory itself yields
/// `EXECUTION` rather than blocking strategic commands on an I/O hiccup.
/// A missing individual file scores 0 through the normal "doesn't exist"
/// path instead.
pub fn get_context_readiness(docs_dir: &Path) -> Readiness {
    if !docs_dir.exists() {
        return Readiness {
            status: ReadinessStatus::Execution,
            scores: Default::default(),
            blocking_files: Vec::new(),
        };
    }

    let mut scores = std::collections::BTreeMap::new();
    for spec in &FILE_SPECS {
        let content = read_file(docs_dir, spec);
        scores.insert(spec.name.to_string(), score_file(spec, content.as_deref()));
    }
    readiness_from_scores(scores)
}

fn readiness_from_scores(scores: std::collections::BTreeMap<String, u32>) -> Readiness {
    let mut blocking = Vec::new();
    for spec in &FILE_SPECS {
        let got = scores.get(spec.name).copied().unwrap_or(0);
        if got < spec.threshold {
            blocking.push(spec.name.to_string());
        }
    }
    let status = if blocking.is_empty() { ReadinessStatus::Execution } else { ReadinessStatus::Bootstrap };
    Readiness { status, scores, blocking_files: blocking }
}

/// Diagnostic commands bypass the gate; only plan acceptance is gated.
pub fn is_strategic_command(name: &str) -> bool {
    matches!(name, "plan_accept" | "accept_plan")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_scores_zero() {
        assert_eq!(score_file(&FILE_SPECS[0], None), 0);
    }

    #[test]
    fn existence_alone_scores_ten() {
        assert_eq!(score_file(&FILE_SPECS[0], Some("hello")), 10);
    }

    #[test]
    fn headers_and_length_accumulate() {
        let bullets = "- point one\n- point two\n- point three\n- point four\n- point five\n- point six\n";
        let body = format!(
            "{}\n{bullets}\n{}",
            "## Goals\n## User Stories\n## Success Metrics\n",
            "word ".repeat(200)
        );
        let score = score_file(&FILE_SPECS[0], Some(&body));
        assert!(score >= 80, "expected >=80, got {score}");
    }

    #[test]
    fn stub_without_meaningful_lines_caps_at_forty() {
        let body = format!("{STUB_MARKER}\n## Goals\n## User Stories\n## Success Metrics\n{}", "word ".repeat(200));
        let score = score_file(&FILE_SPECS[0], Some(&body));
        assert!(score <= 40, "expected capped score, got {score}");
    }

    #[test]
    fn stub_with_enough_meaningful_lines_unlocks() {
        let mut body = format!("{STUB_MARKER}\n## Goals\n## User Stories\n## Success Metrics\n");
        for i in 0..12 {
            body.push_str(&format!("this is a real meaningful sentence number {i}\n"));
        }
        let score = score_file(&FILE_SPECS[0], Some(&body));
        assert!(score > 40, "expected unlocked score, got {score}");
    }

    #[test]
    fn decision_log_init_only_stays_capped() {
        let body = format!(
            "{STUB_MARKER}\n## Records\n\n| Date | Type | Decision | Rationale |\n|---|---|---|---|\n| 2026-01-01 | INIT | bootstrap placeholder | pending first real decision |\n"
        );
        let score = score_file(&FILE_SPECS[2], Some(&body));
        assert!(score <= 40);
    }

    #[test]
    fn missing_docs_dir_fails_open() {
        let readiness = get_context_readiness(Path::new("/nonexistent/path/for/test"));
        assert_eq!(readiness.status, ReadinessStatus::Execution);
    }
}
