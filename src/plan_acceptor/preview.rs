//! Regenerates a human-readable plan preview artifact from the Store —
//! never from the input file — so it always reflects what was actually
//! committed (deduped signatures, resolved dependency ids, assigned seq).

use rusqlite::Connection;

use crate::error::BrokerError;
use crate::store::{self, task_repo};

pub fn render(conn: &Connection, plan_id: &str) -> Result<(), BrokerError> {
    let tasks = task_repo::list_tasks_for_plan(conn, plan_id)?;

    let mut body = String::new();
    body.push_str(&format!("# Plan {plan_id}\n\n"));
    for task in &tasks {
        body.push_str(&format!(
            "- [{}] seq={} lane={} priority={} archetype={} {}\n",
            task.status.as_str(),
            task.seq,
            task.lane.as_str(),
            task.priority,
            task.archetype.as_str(),
            task.title,
        ));
    }

    let state_dir = store::state_dir()?;
    std::fs::create_dir_all(&state_dir)?;
    std::fs::write(state_dir.join(format!("plan_preview_{plan_id}.md")), body)?;
    Ok(())
}
