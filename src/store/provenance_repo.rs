use std::path::Path;

use once_cell::sync::OnceCell;
use rusqlite::{params, Connection};
use serde::Deserialize;

use crate::error::BrokerError;

pub fn record(conn: &Connection, source_id: &str, location: &str) -> Result<(), BrokerError> {
    conn.execute(
        "INSERT OR IGNORE INTO provenance (source_id, location) VALUES (?1, ?2)",
        params![source_id, location],
    )?;
    Ok(())
}

pub fn locations_for(conn: &Connection, source_id: &str) -> Result<Vec<String>, BrokerError> {
    let mut stmt = conn.prepare("SELECT location FROM provenance WHERE source_id = ?1")?;
    let locations = stmt
        .query_map(params![source_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(locations)
}

/// Evidence gate helper: which of `source_ids` have zero recorded locations.
pub fn missing_evidence(conn: &Connection, source_ids: &[String]) -> Result<Vec<String>, BrokerError> {
    let mut missing = Vec::new();
    for id in source_ids {
        if locations_for(conn, id)?.is_empty() {
            missing.push(id.clone());
        }
    }
    Ok(missing)
}

/// `<state_dir>/provenance.json` shape: `{source_id: [code_location, ...]}`.
#[derive(Debug, Deserialize)]
struct ProvenanceFile(std::collections::HashMap<String, Vec<String>>);

/// Parses a provenance file, if present, and records every location it
/// lists. A missing file is not an error — it just means no source has
/// recorded evidence yet, so `MANDATORY`/`STRONG` sources correctly stay
/// blocked until one is written. Separated from `ensure_loaded` so the
/// parsing/recording logic is directly testable without the process-wide
/// once-guard getting in the way.
fn ingest_file(conn: &Connection, path: &Path) -> Result<(), BrokerError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Ok(()),
    };
    let parsed: ProvenanceFile = serde_json::from_str(&contents)
        .map_err(|e| BrokerError::validation(format!("invalid provenance.json: {e}")))?;
    for (source_id, locations) in parsed.0 {
        for location in locations {
            record(conn, &source_id, &location)?;
        }
    }
    Ok(())
}

/// Guards the load to once per process, mirroring `gavel::registry::cached`.
static LOADED: OnceCell<()> = OnceCell::new();

/// Ingest `<state_dir>/provenance.json` into the `provenance` table once per
/// process. The file is the durable provenance map spec §6 describes
/// (source-id -> set of code locations), produced externally by whatever
/// scans the codebase for source-id references; this is the ingestion side
/// the evidence gate depends on.
pub fn ensure_loaded(conn: &Connection, state_dir: &Path) -> Result<(), BrokerError> {
    if LOADED.get().is_some() {
        return Ok(());
    }
    ingest_file(conn, &state_dir.join("provenance.json"))?;
    LOADED.set(()).ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::store::migrations::run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn missing_evidence_reports_unrecorded_sources() {
        let conn = memory_conn();
        record(&conn, "HIPAA-1", "src/auth.rs:10").unwrap();
        let missing = missing_evidence(&conn, &["HIPAA-1".to_string(), "HIPAA-2".to_string()]).unwrap();
        assert_eq!(missing, vec!["HIPAA-2".to_string()]);
    }

    #[test]
    fn ensure_loaded_is_a_noop_for_missing_file() {
        let conn = memory_conn();
        let dir = tempfile::TempDir::new().unwrap();
        // A fresh `OnceCell` per test binary isn't guaranteed, but this call
        // must never error regardless of whether a prior test already set it.
        assert!(ensure_loaded(&conn, dir.path()).is_ok());
    }

    #[test]
    fn ingest_file_records_every_location_per_source() {
        let conn = memory_conn();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("provenance.json");
        std::fs::write(
            &path,
            r#"{"HIPAA-1": ["src/auth.rs:10", "src/auth.rs:42"], "STD-2": ["src/lib.rs:1"]}"#,
        )
        .unwrap();

        ingest_file(&conn, &path).unwrap();

        assert_eq!(missing_evidence(&conn, &["HIPAA-1".to_string(), "STD-2".to_string()]).unwrap(), Vec::<String>::new());
        assert_eq!(locations_for(&conn, "HIPAA-1").unwrap().len(), 2);
    }

    #[test]
    fn ingest_file_missing_path_is_not_an_error() {
        let conn = memory_conn();
        assert!(ingest_file(&conn, Path::new("/nonexistent/provenance.json")).is_ok());
    }

    #[test]
    fn ingest_file_rejects_malformed_json() {
        let conn = memory_conn();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("provenance.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(ingest_file(&conn, &path).is_err());
    }
}
