//! Worker pool (section 4.6.2).
//!
//! Three configurable modes share one `JobQueue`; workers are cooperative
//! tokio tasks that poll the claim loop and observe a `CancellationToken`
//! between units of work, mirroring the Message-passing-for-supervision
//! design note and the actor-style cancellation in the pack's daemon
//! examples (`CancellationToken` idle/shutdown handling).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::job::{Job, JobType};
use crate::queue::JobQueue;

/// `single` / `per_repo` / `pool` (section 4.6.2 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    Single,
    PerRepo,
    Pool,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub mode: WorkerMode,
    pub max_workers: usize,
    pub idle_poll_interval: Duration,
    pub job_timeout_sec: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            mode: WorkerMode::Pool,
            max_workers: 4,
            idle_poll_interval: Duration::from_millis(500),
            job_timeout_sec: 3600,
        }
    }
}

/// Runs one claimed job to completion (or failure). Implemented by the
/// daemon binary, which dispatches on `job.job_type` into the indexer,
/// embedder, etc. Boxed so the pool stays decoupled from those crates.
pub type JobHandler = Arc<
    dyn Fn(Job, CancellationToken) -> Pin<Box<dyn Future<Output = JobOutcome> + Send>> + Send + Sync,
>;

/// What a handler reports back about one claimed job.
pub enum JobOutcome {
    Done,
    Failed { error: String, detail: Option<String> },
    Cancelled,
}

/// Invoked after a job is marked DONE, to chain follow-up jobs per the
/// declarative dependency graph (section 4.6.3). Takes the completed
/// job's type and repo name. Kept as a callback (rather than the pool
/// holding a `Daemon` directly) so this crate's internal module layering
/// stays one-directional: `daemon` depends on `pool`, not the reverse.
pub type CompletionHook = Arc<dyn Fn(JobType, &str) + Send + Sync>;

/// A fixed pool of workers sharing one claim loop, each claim respecting
/// per-repo and per-job-type concurrency counters enforced inside
/// `JobQueue::claim`.
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    config: PoolConfig,
    handler: JobHandler,
    on_complete: Option<CompletionHook>,
    cancel: CancellationToken,
    /// One token per in-flight job id, so `cancel_job` can signal a
    /// specific running task without touching the others.
    running: Arc<parking_lot::Mutex<HashMap<uuid::Uuid, CancellationToken>>>,
}

impl WorkerPool {
    pub fn new(queue: Arc<JobQueue>, config: PoolConfig, handler: JobHandler) -> Self {
        Self {
            queue,
            config,
            handler,
            on_complete: None,
            cancel: CancellationToken::new(),
            running: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    /// Register the dependency-graph chaining hook (section 4.6.3). Called
    /// once at construction by `Daemon::init`; without it, a DONE job never
    /// enqueues its follow-ups.
    pub fn with_completion_hook(mut self, hook: CompletionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    /// Cooperative shutdown: stops issuing new claims and lets in-flight
    /// jobs observe `cancel` at their next safe point.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal cancellation for one specific in-flight job. A no-op if the
    /// job isn't currently running in this pool (e.g. already claimed by
    /// another process).
    pub fn cancel_job(&self, id: uuid::Uuid) {
        if let Some(token) = self.running.lock().get(&id) {
            token.cancel();
        }
    }

    /// Run the pool until `shutdown_token()` is cancelled.
    pub async fn run(self: Arc<Self>, worker_id_prefix: &str) {
        match self.config.mode {
            WorkerMode::Single => {
                self.clone().run_claim_loop(format!("{worker_id_prefix}-0")).await;
            }
            WorkerMode::PerRepo | WorkerMode::Pool => {
                let n = self.config.max_workers.max(1);
                let mut set = tokio::task::JoinSet::new();
                for i in 0..n {
                    let pool = self.clone();
                    let worker_id = format!("{worker_id_prefix}-{i}");
                    set.spawn(async move { pool.run_claim_loop(worker_id).await });
                }
                while set.join_next().await.is_some() {}
            }
        }
    }

    async fn run_claim_loop(self: Arc<Self>, worker_id: String) {
        info!(worker_id = %worker_id, mode = ?self.config.mode, "worker claim loop started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let claimed = match self.queue.claim(&worker_id) {
                Ok(job) => job,
                Err(err) => {
                    warn!(worker_id = %worker_id, error = %err, "claim attempt failed");
                    tokio::time::sleep(self.config.idle_poll_interval).await;
                    continue;
                }
            };

            let Some(job) = claimed else {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.idle_poll_interval) => {}
                    _ = self.cancel.cancelled() => break,
                }
                continue;
            };

            let job_token = self.cancel.child_token();
            self.running.lock().insert(job.id, job_token.clone());
            debug!(worker_id = %worker_id, job_id = %job.id, job_type = %job.job_type, "claimed job");

            let outcome = tokio::select! {
                outcome = (self.handler)(job.clone(), job_token.clone()) => outcome,
                _ = tokio::time::sleep(Duration::from_secs(self.config.job_timeout_sec)) => {
                    JobOutcome::Failed {
                        error: "job_timeout".into(),
                        detail: Some(format!("exceeded {}s", self.config.job_timeout_sec)),
                    }
                }
            };
            self.running.lock().remove(&job.id);

            match outcome {
                JobOutcome::Done => {
                    if let Err(err) = self.queue.complete(job.id) {
                        warn!(job_id = %job.id, error = %err, "failed to mark job DONE");
                    } else if let Some(hook) = &self.on_complete {
                        if let Ok(job_type) = job.job_type.parse::<JobType>() {
                            (hook)(job_type, &job.repo_name);
                        }
                    }
                }
                JobOutcome::Failed { error, detail } => {
                    if let Err(err) = self.queue.fail(job.id, &error, detail.as_deref()) {
                        warn!(job_id = %job.id, error = %err, "failed to record job failure");
                    }
                }
                JobOutcome::Cancelled => {
                    if let Err(err) = self.queue.force_cancel_claimed(job.id) {
                        warn!(job_id = %job.id, error = %err, "failed to mark job CANCELLED");
                    }
                }
            }
        }
        info!(worker_id = %worker_id, "worker claim loop stopped");
    }
}

/// Bounds concurrent embedding-provider requests independent of the job
/// queue's own per-type limit — the provider is a shared external
/// resource (section 5), not something the queue should lock.
pub struct ProviderThrottle {
    semaphore: Arc<Semaphore>,
}

impl ProviderThrottle {
    pub fn new(max_concurrent_requests: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
        }
    }

    pub async fn acquire(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore never closed")
    }
}
