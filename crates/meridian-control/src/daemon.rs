//! Daemon orchestration: owns the one control database connection and
//! wires the registry, job queue, worker pool, health monitor, and file
//! watchers together. This is the process-wide state the design notes
//! call out — "the embedder's index-rebuild throttle and the health
//! monitor's cadence are process-wide... run as a single task with
//! explicit init/shutdown called by the service entry point."

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dependency_graph::follow_ups_for;
use crate::error::Result;
use crate::health::{HealthConfig, HealthMonitor};
use crate::job::{EnqueueOptions, JobType};
use crate::pool::{JobHandler, PoolConfig, WorkerPool};
use crate::queue::JobQueue;
use crate::registry::RepoRegistry;
use crate::watcher::{spawn_watcher, WatchBatch};

/// Everything the daemon needs at startup. The HTTP admin surface and the
/// CLI both construct one of these and call `Daemon::init`.
pub struct DaemonConfig {
    pub control_db_path: PathBuf,
    pub pool: PoolConfig,
    pub health: HealthConfig,
    pub watch_debounce_seconds: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            control_db_path: PathBuf::from("meridian-control.db"),
            pool: PoolConfig::default(),
            health: HealthConfig::default(),
            watch_debounce_seconds: 2,
        }
    }
}

/// The running daemon: registry + queue + pool + health monitor + watchers,
/// all sharing one control connection.
pub struct Daemon {
    pub registry: Arc<RepoRegistry>,
    pub queue: Arc<JobQueue>,
    pub health: Arc<HealthMonitor>,
    pool: Arc<WorkerPool>,
    cancel: CancellationToken,
    watchers: Mutex<HashMap<String, notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>>>,
    watch_debounce_seconds: u64,
}

impl Daemon {
    /// Open (or create) the control database and construct every
    /// subsystem against the same connection.
    pub fn init(config: DaemonConfig, handler: JobHandler) -> Result<Self> {
        let conn = Connection::open(&config.control_db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        crate::schema::init_control_schema(&conn)?;
        let shared = Arc::new(Mutex::new(conn));

        let queue = Arc::new(JobQueue::from_connection(shared.clone()));
        let registry = Arc::new(RepoRegistry::from_connection(shared.clone()));
        let health = Arc::new(HealthMonitor::new(shared, queue.clone(), config.health));

        let follow_up_queue = queue.clone();
        let follow_up_registry = registry.clone();
        let pool = Arc::new(
            WorkerPool::new(queue.clone(), config.pool, handler).with_completion_hook(Arc::new(
                move |completed_type, repo_name| {
                    if let Err(err) =
                        chain_follow_ups(&follow_up_registry, &follow_up_queue, completed_type, repo_name)
                    {
                        warn!(repo = %repo_name, error = %err, "failed to chain follow-up jobs");
                    }
                },
            )),
        );

        info!(instance_id = %health.instance_id(), "daemon initialized");

        Ok(Self {
            registry,
            queue,
            health,
            pool,
            cancel: CancellationToken::new(),
            watchers: Mutex::new(HashMap::new()),
            watch_debounce_seconds: config.watch_debounce_seconds,
        })
    }

    /// Run the worker pool and the health monitor until `shutdown` is called.
    /// Also starts watchers for every currently-registered repo with
    /// `auto_watch = true`.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        self.start_watchers_for_registered_repos()?;

        let pool = self.pool.clone();
        let health = self.health.clone();
        let health_cancel = self.cancel.clone();

        let pool_handle = tokio::spawn(pool.run("worker"));
        let health_handle = tokio::spawn(health.run(health_cancel));

        self.cancel.cancelled().await;
        let _ = tokio::join!(pool_handle, health_handle);
        Ok(())
    }

    pub fn shutdown(&self) {
        self.pool.shutdown_token().cancel();
        self.cancel.cancel();
    }

    /// Chain follow-up jobs for a completed job, per the declarative
    /// dependency graph (section 4.6.3). The worker pool calls this
    /// automatically via its completion hook (see `init`); exposed here too
    /// for callers driving jobs outside the pool (e.g. a manually-marked
    /// DONE job reported through the admin API).
    pub fn enqueue_follow_ups(&self, completed_type: JobType, repo_name: &str) -> Result<Vec<uuid::Uuid>> {
        chain_follow_ups(&self.registry, &self.queue, completed_type, repo_name)
    }

    /// Start (or restart) the watcher for one repo. Returns immediately;
    /// debounced batches arrive on `tx`.
    pub fn watch_repo(&self, repo_name: &str, root_path: &Path, tx: mpsc::Sender<WatchBatch>) -> Result<()> {
        let debouncer = spawn_watcher(
            repo_name.to_string(),
            root_path.to_path_buf(),
            self.watch_debounce_seconds,
            tx,
        )
        .map_err(|e| crate::error::ControlError::Other(format!("failed to start watcher: {e}")))?;
        self.watchers.lock().insert(repo_name.to_string(), debouncer);
        Ok(())
    }

    pub fn unwatch_repo(&self, repo_name: &str) {
        self.watchers.lock().remove(repo_name);
    }

    fn start_watchers_for_registered_repos(&self) -> Result<()> {
        for repo in self.registry.list()? {
            if !repo.auto_watch || !repo.enabled {
                continue;
            }
            let (tx, mut rx) = mpsc::channel::<WatchBatch>(16);
            if let Err(err) = self.watch_repo(&repo.name, &repo.root_path, tx) {
                warn!(repo = %repo.name, error = %err, "failed to start watcher at daemon startup");
                continue;
            }
            let queue = self.queue.clone();
            let registry = self.registry.clone();
            tokio::spawn(async move {
                while let Some(batch) = rx.recv().await {
                    let Ok(reg) = registry.resolve(&batch.repo_name) else { continue };
                    let payload = serde_json::json!({
                        "paths": batch.changed_paths,
                    });
                    if let Err(err) = queue.enqueue(
                        &reg.name,
                        &reg.schema_name,
                        JobType::ReindexMany,
                        payload,
                        EnqueueOptions::default(),
                    ) {
                        warn!(repo = %reg.name, error = %err, "failed to enqueue watcher-triggered reindex");
                    }
                }
            });
        }
        Ok(())
    }
}

/// Resolves `repo_name`, looks up its follow-up job types for
/// `completed_type` in the declarative dependency graph, and enqueues each
/// one. Shared by the pool's completion hook and `Daemon::enqueue_follow_ups`
/// so the two call sites can't drift.
fn chain_follow_ups(
    registry: &RepoRegistry,
    queue: &JobQueue,
    completed_type: JobType,
    repo_name: &str,
) -> Result<Vec<uuid::Uuid>> {
    let repo = registry.resolve(repo_name)?;
    let follow_ups = follow_ups_for(completed_type, &repo);
    let mut ids = Vec::with_capacity(follow_ups.len());
    for job_type in follow_ups {
        let id = queue.enqueue(
            &repo.name,
            &repo.schema_name,
            job_type,
            serde_json::json!({}),
            EnqueueOptions::default(),
        )?;
        ids.push(id);
    }
    Ok(ids)
}
