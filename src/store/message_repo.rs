use rusqlite::{params, Connection};

use crate::error::BrokerError;
use crate::models::{Message, MessageRole};

pub fn insert_message(
    conn: &Connection,
    task_id: &str,
    role: MessageRole,
    kind: &str,
    content: &str,
) -> Result<Message, BrokerError> {
    let id = ulid::Ulid::new().to_string();
    conn.execute(
        "INSERT INTO messages (id, task_id, role, kind, content) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, task_id, role.as_str(), kind, content],
    )?;
    conn.query_row(
        "SELECT id, task_id, role, kind, content, created_at FROM messages WHERE id = ?1",
        params![id],
        |row| {
            let role_str: String = row.get(2)?;
            Ok(Message {
                id: row.get(0)?,
                task_id: row.get(1)?,
                role: MessageRole::from_str(&role_str).unwrap_or(MessageRole::System),
                kind: row.get(3)?,
                content: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .map_err(BrokerError::from)
}

pub fn list_messages_for_task(conn: &Connection, task_id: &str) -> Result<Vec<Message>, BrokerError> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, role, kind, content, created_at FROM messages WHERE task_id = ?1 ORDER BY created_at ASC",
    )?;
    let messages = stmt
        .query_map(params![task_id], |row| {
            let role_str: String = row.get(2)?;
            Ok(Message {
                id: row.get(0)?,
                task_id: row.get(1)?,
                role: MessageRole::from_str(&role_str).unwrap_or(MessageRole::System),
                kind: row.get(3)?,
                content: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}
