//! The durable job queue (section 4.6.1).
//!
//! SQLite stands in for the specification's Postgres `job_queue` table.
//! `FOR UPDATE SKIP LOCKED` has no SQLite equivalent, but SQLite's own
//! writer serialization (`BEGIN IMMEDIATE`) gives the same observable
//! guarantee the spec actually wants: at most one worker ever transitions
//! a given row out of PENDING. What we lose is SKIP LOCKED's ability to
//! let a second worker skip past a row already locked by a first and grab
//! a *different* row concurrently — acceptable here because every claim
//! transaction is a handful of indexed lookups, not a long hold.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ControlError, Result};
use crate::job::{now_unix, EnqueueOptions, Job, JobStatus, JobType};

/// Per-repo and per-job-type concurrency ceilings enforced at claim time
/// (section 4.6.2).
#[derive(Debug, Clone)]
pub struct ConcurrencyLimits {
    pub max_concurrent_per_repo: i64,
    pub max_concurrent_per_type: HashMap<String, i64>,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        let mut per_type = HashMap::new();
        per_type.insert(JobType::FullIndex.as_str().to_string(), 2);
        per_type.insert(JobType::EmbedMissing.as_str().to_string(), 3);
        Self {
            max_concurrent_per_repo: 2,
            max_concurrent_per_type: per_type,
        }
    }
}

/// Exponential backoff with a fixed base and multiplier, per section 4.6.1:
/// `backoff = base * multiplier^attempts`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_secs: i64,
    pub multiplier: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_secs: 30,
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn backoff_secs(&self, attempts: i32) -> i64 {
        self.base_secs * self.multiplier.pow(attempts.max(0) as u32)
    }
}

/// The durable job queue, backed by one SQLite database shared by every
/// worker process on this machine.
pub struct JobQueue {
    conn: Arc<Mutex<Connection>>,
    pub limits: ConcurrencyLimits,
    pub retry_policy: RetryPolicy,
}

impl JobQueue {
    /// Open (creating if absent) the control database at `path` and apply
    /// the DDL. Idempotent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", true)?;
        crate::schema::init_control_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            limits: ConcurrencyLimits::default(),
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Share an already-open, already-initialized connection (used by the
    /// daemon wiring so the registry, queue, and health monitor all see
    /// one control database).
    pub(crate) fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            limits: ConcurrencyLimits::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub(crate) fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_control_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            limits: ConcurrencyLimits::default(),
            retry_policy: RetryPolicy::default(),
        })
    }

    pub fn with_limits(mut self, limits: ConcurrencyLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enqueue a job. When `opts.dedup_key` (or the job type's default
    /// template) names a key with a non-terminal job already outstanding,
    /// this is a no-op that returns the existing job's id (section 3,
    /// "Job dedup" invariant; testable property 2).
    pub fn enqueue(
        &self,
        repo_name: &str,
        schema_name: &str,
        job_type: JobType,
        payload: serde_json::Value,
        opts: EnqueueOptions,
    ) -> Result<Uuid> {
        let dedup_key = opts
            .dedup_key
            .clone()
            .or_else(|| job_type.default_dedup_key(repo_name));

        let conn = self.conn.lock();
        conn.execute_batch("BEGIN IMMEDIATE")?;

        let result = (|| -> Result<Uuid> {
            if let Some(ref key) = dedup_key {
                let existing: Option<String> = conn
                    .query_row(
                        "SELECT id FROM job_queue
                         WHERE dedup_key = ?1 AND status IN ('PENDING', 'CLAIMED')
                         LIMIT 1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(id) = existing {
                    return Ok(Uuid::parse_str(&id).expect("stored job id is a valid UUID"));
                }
            }

            let id = Uuid::new_v4();
            let now = now_unix();
            let priority = opts.priority.unwrap_or(job_type.spec().default_priority);
            let max_attempts = opts.max_attempts.unwrap_or(3);
            conn.execute(
                "INSERT INTO job_queue
                    (id, repo_name, schema_name, job_type, payload_json, priority,
                     status, attempts, max_attempts, dedup_key, created_at, run_after)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'PENDING', 0, ?7, ?8, ?9, ?10)",
                params![
                    id.to_string(),
                    repo_name,
                    schema_name,
                    job_type.as_str(),
                    payload.to_string(),
                    priority,
                    max_attempts,
                    dedup_key,
                    now,
                    opts.run_after,
                ],
            )?;
            Ok(id)
        })();

        match &result {
            Ok(_) => conn.execute_batch("COMMIT")?,
            Err(_) => conn.execute_batch("ROLLBACK")?,
        }
        result
    }

    /// Atomically claim the single highest-priority eligible job for
    /// `worker_id`. Returns `None` when no job is eligible right now.
    ///
    /// This is the SQLite analogue of the `SELECT ... FOR UPDATE SKIP
    /// LOCKED` / `UPDATE` pair in section 4.6.1: the whole read-then-write
    /// happens inside one `BEGIN IMMEDIATE` transaction, so two workers
    /// racing on the same row can never both succeed (testable property 3).
    pub fn claim(&self, worker_id: &str) -> Result<Option<Job>> {
        let conn = self.conn.lock();
        conn.execute_batch("BEGIN IMMEDIATE")?;

        let result = (|| -> Result<Option<Job>> {
            let now = now_unix();
            let mut stmt = conn.prepare(
                "SELECT id, repo_name, job_type, priority FROM job_queue
                 WHERE status = 'PENDING' AND (run_after IS NULL OR run_after <= ?1)
                 ORDER BY priority DESC, created_at ASC",
            )?;
            let candidates = stmt
                .query_map(params![now], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            drop(stmt);

            let mut chosen: Option<String> = None;
            for (id, repo_name, job_type) in candidates {
                let per_repo: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM job_queue WHERE repo_name = ?1 AND status = 'CLAIMED'",
                    params![repo_name],
                    |row| row.get(0),
                )?;
                if per_repo >= self.limits.max_concurrent_per_repo {
                    continue;
                }
                if let Some(type_limit) = self.limits.max_concurrent_per_type.get(&job_type) {
                    let per_type: i64 = conn.query_row(
                        "SELECT COUNT(*) FROM job_queue WHERE job_type = ?1 AND status = 'CLAIMED'",
                        params![job_type],
                        |row| row.get(0),
                    )?;
                    if per_type >= *type_limit {
                        continue;
                    }
                }
                chosen = Some(id);
                break;
            }

            let Some(id) = chosen else {
                return Ok(None);
            };

            conn.execute(
                "UPDATE job_queue SET
                    status = 'CLAIMED', claimed_by = ?1, claimed_at = ?2,
                    started_at = ?2, attempts = attempts + 1
                 WHERE id = ?3",
                params![worker_id, now, id],
            )?;

            let job = Self::load_job(&conn, &id)?;
            Ok(job)
        })();

        match &result {
            Ok(_) => conn.execute_batch("COMMIT")?,
            Err(_) => conn.execute_batch("ROLLBACK")?,
        }
        result
    }

    /// Mark a claimed job DONE.
    pub fn complete(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock();
        let now = now_unix();
        conn.execute(
            "UPDATE job_queue SET status = 'DONE', completed_at = ?1, error = NULL
             WHERE id = ?2",
            params![now, id.to_string()],
        )?;
        Ok(())
    }

    /// Report a failure. Requeues with backoff if attempts remain under
    /// `max_attempts`, otherwise marks the job FAILED terminally.
    pub fn fail(&self, id: Uuid, error: &str, error_detail: Option<&str>) -> Result<JobStatus> {
        let conn = self.conn.lock();
        let now = now_unix();
        let (attempts, max_attempts): (i32, i32) = conn.query_row(
            "SELECT attempts, max_attempts FROM job_queue WHERE id = ?1",
            params![id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if attempts < max_attempts {
            let run_after = now + self.retry_policy.backoff_secs(attempts);
            conn.execute(
                "UPDATE job_queue SET
                    status = 'PENDING', claimed_by = NULL, claimed_at = NULL,
                    started_at = NULL, run_after = ?1, error = ?2, error_detail = ?3
                 WHERE id = ?4",
                params![run_after, error, error_detail, id.to_string()],
            )?;
            Ok(JobStatus::Pending)
        } else {
            conn.execute(
                "UPDATE job_queue SET
                    status = 'FAILED', completed_at = ?1, error = ?2, error_detail = ?3
                 WHERE id = ?4",
                params![now, error, error_detail, id.to_string()],
            )?;
            Ok(JobStatus::Failed)
        }
    }

    /// Cancel a job. PENDING jobs go directly to CANCELLED. CLAIMED jobs
    /// are left for the worker to observe cooperatively — the caller
    /// (health monitor / pool) is responsible for flagging cancellation
    /// to the running task; this only flips rows that are safe to flip
    /// immediately.
    pub fn cancel(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let now = now_unix();
        let changed = conn.execute(
            "UPDATE job_queue SET status = 'CANCELLED', completed_at = ?1
             WHERE id = ?2 AND status = 'PENDING'",
            params![now, id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Force a CLAIMED row back to CANCELLED regardless of status, used
    /// once a worker has observed its cancellation flag and stopped.
    pub fn force_cancel_claimed(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock();
        let now = now_unix();
        conn.execute(
            "UPDATE job_queue SET status = 'CANCELLED', completed_at = ?1
             WHERE id = ?2 AND status = 'CLAIMED'",
            params![now, id.to_string()],
        )?;
        Ok(())
    }

    /// Release rows stuck in CLAIMED past `stale_after_secs` back to
    /// PENDING with an incremented attempt count, per the health monitor's
    /// auto-release sweep (section 4.6.5). Returns the released job ids.
    pub fn release_stale_claims(&self, stale_after_secs: i64, reason: &str) -> Result<Vec<Uuid>> {
        let conn = self.conn.lock();
        let now = now_unix();
        let cutoff = now - stale_after_secs;

        let mut stmt = conn.prepare(
            "SELECT id FROM job_queue WHERE status = 'CLAIMED' AND claimed_at <= ?1",
        )?;
        let ids: Vec<String> = stmt
            .query_map(params![cutoff], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        for id in &ids {
            conn.execute(
                "UPDATE job_queue SET
                    status = 'PENDING', claimed_by = NULL, claimed_at = NULL,
                    started_at = NULL, run_after = ?1, error = ?2
                 WHERE id = ?3",
                params![now, reason, id],
            )?;
        }
        Ok(ids
            .into_iter()
            .map(|s| Uuid::parse_str(&s).expect("stored job id is a valid UUID"))
            .collect())
    }

    pub fn get(&self, id: Uuid) -> Result<Job> {
        let conn = self.conn.lock();
        Self::load_job(&conn, &id.to_string())?.ok_or(ControlError::JobNotFound(id))
    }

    pub fn list_for_repo(&self, repo_name: &str, status: Option<JobStatus>, limit: i64) -> Result<Vec<Job>> {
        let conn = self.conn.lock();
        let (sql, has_status) = match status {
            Some(_) => (
                "SELECT id FROM job_queue WHERE repo_name = ?1 AND status = ?2
                 ORDER BY created_at DESC LIMIT ?3",
                true,
            ),
            None => (
                "SELECT id FROM job_queue WHERE repo_name = ?1
                 ORDER BY created_at DESC LIMIT ?3",
                false,
            ),
        };
        let mut stmt = conn.prepare(sql)?;
        let ids: Vec<String> = if has_status {
            stmt.query_map(
                params![repo_name, status.unwrap().as_str(), limit],
                |row| row.get(0),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(params![repo_name, limit], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        drop(stmt);

        ids.into_iter()
            .map(|id| Self::load_job(&conn, &id)?.ok_or(ControlError::JobNotFound(Uuid::parse_str(&id).unwrap())))
            .collect()
    }

    /// Count jobs by status across every repo, for `/api/stats/jobs`.
    pub fn status_counts(&self) -> Result<HashMap<String, i64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM job_queue GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        rows.collect::<std::result::Result<HashMap<_, _>, _>>()
            .map_err(ControlError::from)
    }

    /// Most recently created jobs across every repo, for `/api/stats/jobs`.
    pub fn list_recent(&self, limit: i64) -> Result<Vec<Job>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id FROM job_queue ORDER BY created_at DESC LIMIT ?1")?;
        let ids: Vec<String> = stmt
            .query_map(params![limit], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);
        ids.into_iter()
            .map(|id| Self::load_job(&conn, &id)?.ok_or(ControlError::JobNotFound(Uuid::parse_str(&id).unwrap())))
            .collect()
    }

    fn load_job(conn: &Connection, id: &str) -> Result<Option<Job>> {
        conn.query_row(
            "SELECT id, repo_name, schema_name, job_type, payload_json, priority, status,
                    attempts, max_attempts, claimed_by, dedup_key, created_at, run_after,
                    claimed_at, started_at, completed_at, error, error_detail
             FROM job_queue WHERE id = ?1",
            params![id],
            |row| {
                let status_str: String = row.get(6)?;
                Ok(Job {
                    id: Uuid::parse_str(&row.get::<_, String>(0)?).expect("valid uuid"),
                    repo_name: row.get(1)?,
                    schema_name: row.get(2)?,
                    job_type: row.get(3)?,
                    payload: serde_json::from_str(&row.get::<_, String>(4)?).unwrap_or_default(),
                    priority: row.get(5)?,
                    status: JobStatus::from_str(&status_str).unwrap_or(JobStatus::Pending),
                    attempts: row.get(7)?,
                    max_attempts: row.get(8)?,
                    claimed_by: row.get(9)?,
                    dedup_key: row.get(10)?,
                    created_at: row.get(11)?,
                    run_after: row.get(12)?,
                    claimed_at: row.get(13)?,
                    started_at: row.get(14)?,
                    completed_at: row.get(15)?,
                    error: row.get(16)?,
                    error_detail: row.get(17)?,
                })
            },
        )
        .optional()
        .map_err(ControlError::from)
    }
}
