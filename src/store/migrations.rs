use rusqlite::Connection;

use crate::error::BrokerError;

pub fn run_migrations(conn: &Connection) -> Result<(), BrokerError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS plans (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'completed', 'archived')),
            plan_hash TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            plan_id TEXT NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            lane TEXT NOT NULL CHECK (lane IN ('backend','frontend','qa','ops','docs')),
            lane_rank INTEGER NOT NULL,
            type TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending','in_progress','reviewing','completed','blocked','dead_letter')),
            priority INTEGER NOT NULL DEFAULT 10,
            exec_class TEXT NOT NULL DEFAULT 'parallel' CHECK (exec_class IN ('exclusive','parallel')),
            archetype TEXT NOT NULL DEFAULT 'GENERIC'
                CHECK (archetype IN ('PLUMBING','LOGIC','SEC','API','DB','UI','TEST','GENERIC')),
            risk TEXT NOT NULL DEFAULT 'LOW' CHECK (risk IN ('LOW','MEDIUM','HIGH')),
            source_ids TEXT NOT NULL DEFAULT '[]',
            source_plan_hash TEXT NOT NULL DEFAULT '',
            task_signature TEXT NOT NULL DEFAULT '',
            agent TEXT,
            worker_id TEXT,
            lease_id TEXT NOT NULL DEFAULT '',
            lease_expires_at INTEGER NOT NULL DEFAULT 0,
            retry_count INTEGER NOT NULL DEFAULT 0,
            review_decision TEXT,
            review_notes TEXT,
            override_justification TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            started_at TEXT,
            completed_at TEXT,
            heartbeat_at INTEGER NOT NULL DEFAULT 0,
            UNIQUE (source_plan_hash, task_signature)
        );

        CREATE TABLE IF NOT EXISTS task_dependencies (
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            dependency_id TEXT REFERENCES tasks(id) ON DELETE CASCADE,
            dep_token TEXT,
            CHECK (task_id != dependency_id),
            CHECK ((dependency_id IS NULL) != (dep_token IS NULL))
        );

        CREATE TABLE IF NOT EXISTS workers (
            worker_id TEXT PRIMARY KEY,
            worker_type TEXT,
            allowed_lanes TEXT NOT NULL DEFAULT '[]',
            last_seen INTEGER NOT NULL,
            task_ids TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            role TEXT NOT NULL CHECK (role IN ('worker','manager','auditor','admin','system')),
            kind TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS review_packets (
            task_id TEXT PRIMARY KEY REFERENCES tasks(id) ON DELETE CASCADE,
            claims TEXT NOT NULL,
            evidence TEXT NOT NULL DEFAULT '[]',
            gatekeeper_summary TEXT,
            submitted_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS ledger (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            decision TEXT NOT NULL CHECK (decision IN ('APPROVE','REJECT','KICKBACK')),
            actor TEXT NOT NULL CHECK (actor IN ('HUMAN','AUTO','BATCH')),
            snapshot_hash TEXT NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS provenance (
            source_id TEXT NOT NULL,
            location TEXT NOT NULL,
            PRIMARY KEY (source_id, location)
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_schedule
            ON tasks(status, lane_rank, priority, created_at, id);
        CREATE INDEX IF NOT EXISTS idx_tasks_review ON tasks(status, archetype);
        CREATE INDEX IF NOT EXISTS idx_tasks_updated ON tasks(status, updated_at);
        CREATE INDEX IF NOT EXISTS idx_tasks_signature ON tasks(task_signature);
        CREATE INDEX IF NOT EXISTS idx_tasks_plan ON tasks(plan_id);
        CREATE INDEX IF NOT EXISTS idx_deps_task ON task_dependencies(task_id);
        CREATE INDEX IF NOT EXISTS idx_deps_dep ON task_dependencies(dependency_id);
        CREATE INDEX IF NOT EXISTS idx_plans_hash ON plans(plan_hash);
        CREATE INDEX IF NOT EXISTS idx_ledger_task ON ledger(task_id, created_at);
        ",
    )?;
    Ok(())
}
