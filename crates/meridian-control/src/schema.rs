//! Control-schema DDL.
//!
//! Mirrors `meridian-core::lazy::schema`'s convention of raw `CREATE TABLE
//! IF NOT EXISTS` strings: the control database holds the repo registry,
//! the job queue, and daemon heartbeats. It is a single SQLite file
//! (`<state_dir>/control.db`), analogous to the spec's single control
//! *schema* shared across every registered repo.

pub const CONTROL_SCHEMA_VERSION: &str = "1.0";

pub const SCHEMA_CREATE_REPO_REGISTRY: &str = r#"
CREATE TABLE IF NOT EXISTS repo_registry (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    schema_name TEXT NOT NULL UNIQUE,
    root_path TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    auto_index INTEGER NOT NULL DEFAULT 1,
    auto_embed INTEGER NOT NULL DEFAULT 1,
    auto_watch INTEGER NOT NULL DEFAULT 0,
    auto_summaries INTEGER NOT NULL DEFAULT 0,
    embedding_dimension INTEGER,
    config_json TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

pub const SCHEMA_CREATE_JOB_QUEUE: &str = r#"
CREATE TABLE IF NOT EXISTS job_queue (
    id TEXT PRIMARY KEY NOT NULL,
    repo_name TEXT NOT NULL,
    schema_name TEXT NOT NULL,
    job_type TEXT NOT NULL,
    payload_json TEXT NOT NULL DEFAULT '{}',
    priority INTEGER NOT NULL DEFAULT 5,
    status TEXT NOT NULL DEFAULT 'PENDING',
    attempts INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL DEFAULT 3,
    claimed_by TEXT,
    dedup_key TEXT,
    created_at INTEGER NOT NULL,
    run_after INTEGER,
    claimed_at INTEGER,
    started_at INTEGER,
    completed_at INTEGER,
    error TEXT,
    error_detail TEXT
)
"#;

pub const SCHEMA_CREATE_DAEMON_INSTANCE: &str = r#"
CREATE TABLE IF NOT EXISTS daemon_instance (
    instance_id TEXT PRIMARY KEY NOT NULL,
    status TEXT NOT NULL DEFAULT 'RUNNING',
    started_at INTEGER NOT NULL,
    last_heartbeat INTEGER NOT NULL
)
"#;

pub const SCHEMA_CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_job_queue_claim
    ON job_queue(status, priority DESC, created_at ASC);
CREATE INDEX IF NOT EXISTS idx_job_queue_repo
    ON job_queue(repo_name, status);
CREATE INDEX IF NOT EXISTS idx_job_queue_type
    ON job_queue(job_type, status);
CREATE UNIQUE INDEX IF NOT EXISTS idx_job_queue_dedup
    ON job_queue(dedup_key)
    WHERE dedup_key IS NOT NULL AND status IN ('PENDING', 'CLAIMED');
"#;

/// Apply the full control-schema DDL to an open connection.
pub fn init_control_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "{SCHEMA_CREATE_REPO_REGISTRY};\n{SCHEMA_CREATE_JOB_QUEUE};\n{SCHEMA_CREATE_DAEMON_INSTANCE};\n{SCHEMA_CREATE_INDEXES}"
    ))
}
