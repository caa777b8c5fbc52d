pub mod config_repo;
pub mod connection;
pub mod dependency_repo;
pub mod ledger_repo;
pub mod message_repo;
pub mod migrations;
pub mod plan_repo;
pub mod provenance_repo;
pub mod review_packet_repo;
pub mod state_writer;
pub mod task_repo;
pub mod worker_repo;

pub use connection::*;

use rusqlite::Connection;

use crate::error::BrokerError;

/// Run `f` inside a `BEGIN IMMEDIATE` transaction, committing on `Ok` and
/// rolling back on `Err`. This is the only sanctioned way to group writes —
/// every multi-statement mutation in this crate goes through it so that the
/// reap → scan → claim sequence (and the Ledger-write + transition pair)
/// appear atomic to every observer.
pub fn transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T, BrokerError>,
) -> Result<T, BrokerError> {
    conn.execute_batch("BEGIN IMMEDIATE")?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}
