//! Daemon command - runs the control-plane worker pool, health monitor,
//! and file watchers as a long-lived process.
//!
//! Mirrors the MCP command's shutdown handling (stdio service vs. here a
//! `meridian_control::Daemon`), but the daemon has no protocol to serve:
//! it only drains the job queue and answers to ctrl-c / SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use meridian_config::ConfigLoader;
use meridian_control::{
    Daemon, DaemonConfig, HealthConfig, Job, JobOutcome, JobType, PoolConfig, RepoRegistry,
    WorkerMode,
};
use meridian_core::builder::{BuilderConfig, GraphBuilder};
use meridian_core::incremental::{FileOp, IncrementalUpdater};
use meridian_core::lazy::partitioner::GraphPartitioner;
use meridian_store::Backend;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::resolve_workspace;
use crate::GlobalOptions;

/// Run the Meridian daemon: worker pool, health monitor, file watchers.
#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Path to the control database (default: {workspace}/.meridian/control.db)
    #[arg(long)]
    control_db: Option<PathBuf>,

    /// Worker mode: single, per-repo, or pool
    #[arg(long, default_value = "pool", value_parser = parse_worker_mode)]
    mode: WorkerMode,

    /// Number of concurrent workers (ignored in single mode)
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Per-job timeout in seconds before a job is force-failed
    #[arg(long, default_value_t = 3600)]
    job_timeout_sec: u64,
}

fn parse_worker_mode(s: &str) -> std::result::Result<WorkerMode, String> {
    match s {
        "single" => Ok(WorkerMode::Single),
        "per-repo" | "per_repo" => Ok(WorkerMode::PerRepo),
        "pool" => Ok(WorkerMode::Pool),
        other => Err(format!("unknown worker mode '{other}' (expected single, per-repo, pool)")),
    }
}

/// Execute the daemon command. Runs until interrupted.
pub async fn execute(args: DaemonArgs, global: GlobalOptions) -> Result<()> {
    let workspace_path = resolve_workspace(&global).await?;
    let control_db_path = args
        .control_db
        .clone()
        .unwrap_or_else(|| workspace_path.join(".meridian").join("control.db"));
    if let Some(parent) = control_db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    info!("Starting Meridian daemon");
    info!("  Control DB: {}", control_db_path.display());
    info!("  Mode:       {:?}", args.mode);
    info!("  Workers:    {}", args.workers);

    // A second connection to the same control database, used only by the
    // job handler to resolve a repo's root path. The queue and registry
    // the daemon itself drives live on their own connection (see
    // `Daemon::init`).
    let handler_registry = Arc::new(
        RepoRegistry::open(&control_db_path).context("failed to open control database")?,
    );

    let handler = build_job_handler(handler_registry, global.qdrant_url.clone());

    let config = DaemonConfig {
        control_db_path,
        pool: PoolConfig {
            mode: args.mode,
            max_workers: args.workers,
            idle_poll_interval: std::time::Duration::from_millis(500),
            job_timeout_sec: args.job_timeout_sec,
        },
        health: HealthConfig::default(),
        watch_debounce_seconds: 2,
    };

    let daemon = Arc::new(Daemon::init(config, handler).context("failed to initialize daemon")?);

    let run_daemon = daemon.clone();
    let run_handle = tokio::spawn(async move { run_daemon.run().await });

    shutdown_signal().await;
    info!("Shutdown signal received, draining in-flight jobs");
    daemon.shutdown();

    if let Err(err) = run_handle.await {
        error!(error = %err, "daemon task panicked");
    }

    info!("Daemon shutdown complete");
    Ok(())
}

/// Build the closure the worker pool calls for every claimed job. Indexing
/// job types reuse the same builder/partitioner/backend path as `meridian
/// update`; job types with no implementation yet fail loudly instead of
/// silently reporting success.
fn build_job_handler(
    registry: Arc<RepoRegistry>,
    qdrant_url: String,
) -> meridian_control::JobHandler {
    Arc::new(move |job: Job, _cancel: CancellationToken| {
        let registry = registry.clone();
        let qdrant_url = qdrant_url.clone();
        Box::pin(async move { run_job(registry, qdrant_url, job).await })
    })
}

async fn run_job(registry: Arc<RepoRegistry>, qdrant_url: String, job: Job) -> JobOutcome {
    let job_type: JobType = match job.job_type.parse() {
        Ok(jt) => jt,
        Err(err) => return JobOutcome::Failed { error: format!("{err}"), detail: None },
    };

    let repo = match registry.resolve(&job.repo_name) {
        Ok(repo) => repo,
        Err(err) => {
            return JobOutcome::Failed {
                error: "repo_not_found".into(),
                detail: Some(err.to_string()),
            }
        }
    };

    let outcome = match job_type {
        JobType::FullIndex => {
            let root_path = repo.root_path.clone();
            tokio::task::spawn_blocking(move || reindex_workspace(&root_path)).await
        }
        JobType::ReindexFile | JobType::ReindexMany => {
            let root_path = repo.root_path.clone();
            let changes = file_ops_from_payload(&root_path, &job.payload);
            tokio::task::spawn_blocking(move || reindex_files(&root_path, &changes)).await
        }
        JobType::EmbedMissing | JobType::EmbedChunk | JobType::EmbedSummaries => {
            Ok(embed_repo(&repo, &qdrant_url).await)
        }
        other => Ok(Err(anyhow::anyhow!("job type {other} has no handler implementation yet"))),
    };

    match outcome {
        Ok(Ok(())) => JobOutcome::Done,
        Ok(Err(err)) => JobOutcome::Failed { error: err.to_string(), detail: None },
        Err(join_err) => {
            JobOutcome::Failed { error: format!("task join error: {join_err}"), detail: None }
        }
    }
}

fn reindex_workspace(root_path: &std::path::Path) -> Result<()> {
    let builder_config = BuilderConfig::default();
    let mut builder = GraphBuilder::with_embedded_queries(builder_config);
    let (graph, roots) = builder
        .build_from_workspace(root_path)
        .context("failed to build code graph")?;

    let root_name = root_path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "workspace".to_string());

    let meridian_dir = root_path.join(".meridian");
    std::fs::create_dir_all(&meridian_dir)?;
    let (_, stats) =
        GraphPartitioner::partition_with_stats(&graph, &meridian_dir, Some(&root_name))
            .context("failed to partition graph")?;

    info!(
        root = %root_path.display(),
        discovered_roots = roots.len(),
        nodes = stats.total_nodes,
        partitions = stats.partition_count,
        "reindexed workspace"
    );
    Ok(())
}

/// Extract the set of `(path, op)` pairs a `ReindexFile`/`ReindexMany` job
/// should apply, from its payload (`{"path": ..}` or `{"paths": [..]}`,
/// written by the MCP tools and the file-watcher batches respectively).
///
/// Neither call site currently sets an explicit `"op"` field, so a path's
/// operation defaults to whether it still exists on disk: a path a watcher
/// or MCP client named that's gone is a deletion, otherwise it's an
/// upsert. A caller that does supply `"op"` (e.g. the admin API's job
/// trigger endpoint, which forwards an arbitrary payload) overrides the
/// default for every path in the job.
fn file_ops_from_payload(root_path: &std::path::Path, payload: &serde_json::Value) -> Vec<(String, FileOp)> {
    let explicit_op = payload
        .get("op")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<FileOp>().ok());

    let mut paths: Vec<String> = Vec::new();
    if let Some(path) = payload.get("path").and_then(|v| v.as_str()) {
        paths.push(path.to_string());
    }
    if let Some(many) = payload.get("paths").and_then(|v| v.as_array()) {
        paths.extend(many.iter().filter_map(|v| v.as_str()).map(|s| s.to_string()));
    }

    paths
        .into_iter()
        .map(|path| {
            let op = explicit_op.unwrap_or_else(|| {
                if root_path.join(&path).exists() {
                    FileOp::Upsert
                } else {
                    FileOp::Delete
                }
            });
            (path, op)
        })
        .collect()
}

/// Apply an explicit set of per-path upserts/deletes via the incremental
/// updater, instead of a full workspace rebuild. Used by `ReindexFile` and
/// `ReindexMany` (section 4.3); `FullIndex` stays on `reindex_workspace`.
fn reindex_files(root_path: &std::path::Path, changes: &[(String, FileOp)]) -> Result<()> {
    if changes.is_empty() {
        info!(root = %root_path.display(), "reindex job carried no paths, nothing to do");
        return Ok(());
    }

    let meridian_dir = root_path.join(".meridian");
    std::fs::create_dir_all(&meridian_dir)?;

    let mut updater = IncrementalUpdater::new_with_embedded_queries(root_path, &meridian_dir)
        .context("failed to open incremental updater")?;
    let result = updater
        .update_files(changes)
        .context("failed to apply incremental file changes")?;

    info!(
        root = %root_path.display(),
        added = result.changes.added.len(),
        modified = result.changes.modified.len(),
        deleted = result.changes.deleted.len(),
        full_rebuild = result.was_full_rebuild,
        "reindexed files"
    );
    Ok(())
}

async fn embed_repo(repo: &meridian_control::RepoRegistration, qdrant_url: &str) -> Result<()> {
    let mut loader = ConfigLoader::new();
    let mut config = loader
        .load(&repo.root_path, None)
        .context("failed to load repo configuration")?;
    config.backend.qdrant.url = qdrant_url.to_string();

    let backend = meridian_store::LocalBackend::new(&config, &repo.root_path)
        .await
        .context("failed to open backend for embedding")?;
    backend.sync().await.context("failed to sync graph before embedding")?;
    let count = backend.index(true).await.context("failed to index embeddings")?;
    info!(repo = %repo.name, entities = count, "embedded repo");
    Ok(())
}

/// Wait for SIGINT or SIGTERM, same handling as the MCP command.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
