use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::BrokerError;
use crate::models::{Plan, PlanStatus};

fn row_to_plan(row: &Row) -> rusqlite::Result<Plan> {
    let status_str: String = row.get("status")?;
    Ok(Plan {
        id: row.get("id")?,
        name: row.get("name")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: PlanStatus::from_str(&status_str).unwrap_or(PlanStatus::Active),
        plan_hash: row.get("plan_hash")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const SELECT_COLUMNS: &str = "id, name, title, description, status, plan_hash, created_at, updated_at";

pub fn get_plan_by_id(conn: &Connection, plan_id: &str) -> Result<Plan, BrokerError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM plans WHERE id = ?1");
    conn.query_row(&sql, params![plan_id], row_to_plan)
        .optional()?
        .ok_or_else(|| BrokerError::plan_not_found(plan_id))
}

pub fn get_plan_by_name(conn: &Connection, name: &str) -> Result<Option<Plan>, BrokerError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM plans WHERE name = ?1");
    Ok(conn.query_row(&sql, params![name], row_to_plan).optional()?)
}

pub fn get_plan_by_hash(conn: &Connection, plan_hash: &str) -> Result<Option<Plan>, BrokerError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM plans WHERE plan_hash = ?1");
    Ok(conn.query_row(&sql, params![plan_hash], row_to_plan).optional()?)
}

/// Resolve a `--plan` reference: full id, exact name, or unique id prefix.
pub fn resolve_plan_ref(conn: &Connection, reference: &str) -> Result<Plan, BrokerError> {
    if let Some(plan) = get_plan_by_name(conn, reference)? {
        return Ok(plan);
    }
    let sql = format!("SELECT {SELECT_COLUMNS} FROM plans WHERE id LIKE ?1 || '%'");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![reference], row_to_plan)?;
    let first = match rows.next() {
        Some(r) => r?,
        None => return Err(BrokerError::plan_not_found(reference)),
    };
    if let Some(second) = rows.next() {
        let second = second?;
        let mut candidates = vec![first.id, second.id];
        for r in rows {
            candidates.push(r?.id);
        }
        return Err(BrokerError::ambiguous_ref(reference, &candidates));
    }
    Ok(first)
}

/// The currently active plan, resolved via the `config.json` side-file
/// pointer (not the scheduler lane pointer, which lives in the `config`
/// table). Falls back to the most recently created active plan when no
/// pointer file exists and exactly one active plan does.
pub fn get_active_plan(conn: &Connection) -> Result<Plan, BrokerError> {
    if let Ok(path) = super::active_plan_config_path() {
        if let Ok(contents) = std::fs::read_to_string(&path) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&contents) {
                if let Some(id) = value.get("active_plan_id").and_then(|v| v.as_str()) {
                    return get_plan_by_id(conn, id);
                }
            }
        }
    }

    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM plans WHERE status = 'active' ORDER BY created_at DESC LIMIT 2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let plans = stmt
        .query_map([], row_to_plan)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    plans.into_iter().next().ok_or_else(BrokerError::no_active_plan)
}

/// Resolve the plan a command should operate against: an explicit
/// `--plan` reference takes precedence over the `config.json` active
/// pointer and the active-plan fallback.
pub fn resolve_scoped_plan(conn: &Connection, plan_ref: Option<&str>) -> Result<Plan, BrokerError> {
    match plan_ref {
        Some(reference) => resolve_plan_ref(conn, reference),
        None => get_active_plan(conn),
    }
}

pub fn set_active_plan(plan_id: &str) -> Result<(), BrokerError> {
    let path = super::active_plan_config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::json!({ "active_plan_id": plan_id });
    std::fs::write(&path, serde_json::to_string_pretty(&body).unwrap())?;
    Ok(())
}

pub fn insert_plan(
    conn: &Connection,
    name: &str,
    title: &str,
    description: Option<&str>,
    plan_hash: &str,
) -> Result<Plan, BrokerError> {
    if get_plan_by_name(conn, name)?.is_some() {
        return Err(BrokerError::plan_name_conflict(name));
    }
    let id = ulid::Ulid::new().to_string();
    conn.execute(
        "INSERT INTO plans (id, name, title, description, status, plan_hash) VALUES (?1, ?2, ?3, ?4, 'active', ?5)",
        params![id, name, title, description, plan_hash],
    )?;
    get_plan_by_id(conn, &id)
}

pub fn list_plans(conn: &Connection) -> Result<Vec<Plan>, BrokerError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM plans ORDER BY created_at ASC");
    let mut stmt = conn.prepare(&sql)?;
    let plans = stmt.query_map([], row_to_plan)?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(plans)
}
