use std::env;
use std::fs;
use std::path::PathBuf;

use rusqlite::Connection;

use crate::error::BrokerError;

use super::migrations;

/// Find the .git root by walking up from the current directory. Falls back
/// to the current directory itself when no `.git` is found anywhere above
/// it, so the tool still works run from a plain (non-git) directory.
pub fn find_git_root() -> Result<PathBuf, BrokerError> {
    let start = env::current_dir().map_err(|e| BrokerError::database(e.to_string()))?;
    let mut dir = start.clone();
    loop {
        if dir.join(".git").exists() {
            return Ok(dir);
        }
        if !dir.pop() {
            return Ok(start);
        }
    }
}

/// Path to the SQLite store. Overridable via `TASKBROKER_DB`.
pub fn db_path() -> Result<PathBuf, BrokerError> {
    if let Ok(p) = env::var("TASKBROKER_DB") {
        return Ok(PathBuf::from(p));
    }
    let root = find_git_root()?;
    Ok(root.join(".taskbroker").join("taskbroker.db"))
}

/// Directory holding the source registry, provenance exports, and the
/// ledger JSONL mirror. Overridable via `TASKBROKER_STATE_DIR`.
pub fn state_dir() -> Result<PathBuf, BrokerError> {
    if let Ok(p) = env::var("TASKBROKER_STATE_DIR") {
        return Ok(PathBuf::from(p));
    }
    let root = find_git_root()?;
    Ok(root.join(".taskbroker").join("state"))
}

/// Path to the active-plan pointer config file. This is NOT the scheduler
/// pointer (which lives in the `config` table, atomic with claims) — it
/// is a small convenience side-file recording which plan the CLI should
/// operate against by default.
pub fn active_plan_config_path() -> Result<PathBuf, BrokerError> {
    let root = find_git_root()?;
    Ok(root.join(".taskbroker").join("config.json"))
}

/// Directory holding PRD.md / SPEC.md / DECISION_LOG.md for the readiness gate.
pub fn docs_dir() -> Result<PathBuf, BrokerError> {
    let root = find_git_root()?;
    Ok(root.join("docs"))
}

pub fn open_db() -> Result<Connection, BrokerError> {
    let path = db_path()?;
    if !path.exists() {
        return Err(BrokerError::not_initialized());
    }
    let conn = Connection::open(&path)?;
    configure_connection(&conn)?;
    Ok(conn)
}

/// Initialize the store: create directories, the database file, and run migrations.
pub fn init_db() -> Result<PathBuf, BrokerError> {
    let path = db_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BrokerError::database(e.to_string()))?;
    }
    if let Ok(dir) = state_dir() {
        fs::create_dir_all(&dir).map_err(|e| BrokerError::database(e.to_string()))?;
    }
    let conn = Connection::open(&path)?;
    configure_connection(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(path)
}

fn configure_connection(conn: &Connection) -> Result<(), BrokerError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA busy_timeout=5000;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}
