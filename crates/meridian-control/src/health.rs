//! Health monitor (section 4.6.5).
//!
//! A periodic task: updates this daemon's own heartbeat, marks other
//! daemon instances stale once their heartbeat age exceeds a threshold,
//! and auto-releases job rows stuck in CLAIMED past a timeout back to
//! PENDING. Without the last part a worker killed mid-job would leave
//! that job permanently CLAIMED (testable property 4).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::job::now_unix;
use crate::queue::JobQueue;

#[derive(Debug, Clone, Copy)]
pub struct HealthConfig {
    pub heartbeat_interval: Duration,
    pub dead_threshold_secs: i64,
    pub stuck_job_threshold_secs: i64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            dead_threshold_secs: 120,
            stuck_job_threshold_secs: 30 * 60,
        }
    }
}

/// Status of one `daemon_instance` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonStatus {
    Running,
    Stale,
}

impl DaemonStatus {
    fn as_str(&self) -> &'static str {
        match self {
            DaemonStatus::Running => "RUNNING",
            DaemonStatus::Stale => "STALE",
        }
    }
}

pub struct HealthMonitor {
    conn: Arc<Mutex<Connection>>,
    queue: Arc<JobQueue>,
    instance_id: Uuid,
    config: HealthConfig,
}

impl HealthMonitor {
    pub fn new(conn: Arc<Mutex<Connection>>, queue: Arc<JobQueue>, config: HealthConfig) -> Self {
        let instance_id = Uuid::new_v4();
        let now = now_unix();
        conn.lock()
            .execute(
                "INSERT INTO daemon_instance (instance_id, status, started_at, last_heartbeat)
                 VALUES (?1, 'RUNNING', ?2, ?2)",
                params![instance_id.to_string(), now],
            )
            .expect("daemon_instance insert must succeed on a freshly-initialized control schema");
        Self { conn, queue, instance_id, config }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// One sweep: heartbeat, stale-daemon marking, stuck-job release.
    /// Exposed standalone so tests can drive it with a deterministic clock
    /// instead of waiting on `run`'s real interval.
    pub fn sweep_once(&self) -> Result<SweepReport> {
        let now = now_unix();
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE daemon_instance SET last_heartbeat = ?1, status = 'RUNNING' WHERE instance_id = ?2",
            params![now, self.instance_id.to_string()],
        )?;

        let cutoff = now - self.config.dead_threshold_secs;
        let mut stmt = conn.prepare(
            "SELECT instance_id FROM daemon_instance
             WHERE instance_id != ?1 AND status = 'RUNNING' AND last_heartbeat < ?2",
        )?;
        let stale: Vec<String> = stmt
            .query_map(params![self.instance_id.to_string(), cutoff], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);
        for id in &stale {
            conn.execute(
                "UPDATE daemon_instance SET status = 'STALE' WHERE instance_id = ?1",
                params![id],
            )?;
            warn!(instance_id = %id, "daemon marked stale (heartbeat expired)");
        }
        drop(conn);

        let released = self
            .queue
            .release_stale_claims(self.config.stuck_job_threshold_secs, "claim exceeded stuck-job threshold")?;
        if !released.is_empty() {
            info!(count = released.len(), "health sweep released stuck CLAIMED jobs");
        }

        Ok(SweepReport {
            stale_daemons: stale.len(),
            released_jobs: released.len(),
        })
    }

    /// Run the periodic sweep until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.sweep_once() {
                        warn!(error = %err, "health sweep failed");
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        self.shutdown();
    }

    fn shutdown(&self) {
        let _ = self.conn.lock().execute(
            "UPDATE daemon_instance SET status = 'STALE' WHERE instance_id = ?1",
            params![self.instance_id.to_string()],
        );
    }

    #[cfg(test)]
    pub(crate) fn backdate_heartbeat(&self, instance_id: Uuid, seconds_ago: i64) {
        let now = now_unix();
        self.conn
            .lock()
            .execute(
                "UPDATE daemon_instance SET last_heartbeat = ?1 WHERE instance_id = ?2",
                params![now - seconds_ago, instance_id.to_string()],
            )
            .unwrap();
    }
}

pub struct SweepReport {
    pub stale_daemons: usize,
    pub released_jobs: usize,
}

pub fn daemon_status(conn: &Connection, instance_id: Uuid) -> Result<Option<DaemonStatus>> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM daemon_instance WHERE instance_id = ?1",
            params![instance_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(status.map(|s| if s == "STALE" { DaemonStatus::Stale } else { DaemonStatus::Running }))
}

/// One row of `daemon_instance`, for the admin-facing "which daemons are
/// alive" view (the `daemon_status` MCP tool / HTTP endpoint).
#[derive(Debug, Clone)]
pub struct DaemonInstanceInfo {
    pub instance_id: Uuid,
    pub status: DaemonStatus,
    pub started_at: i64,
    pub last_heartbeat: i64,
}

pub fn list_daemon_instances(conn: &Connection) -> Result<Vec<DaemonInstanceInfo>> {
    let mut stmt = conn.prepare(
        "SELECT instance_id, status, started_at, last_heartbeat
         FROM daemon_instance ORDER BY last_heartbeat DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        let id: String = row.get(0)?;
        let status: String = row.get(1)?;
        Ok(DaemonInstanceInfo {
            instance_id: Uuid::parse_str(&id).expect("stored instance id is a valid UUID"),
            status: if status == "STALE" { DaemonStatus::Stale } else { DaemonStatus::Running },
            started_at: row.get(2)?,
            last_heartbeat: row.get(3)?,
        })
    })?;
    rows.collect::<std::result::Result<Vec<_>, _>>().map_err(crate::error::ControlError::from)
}
