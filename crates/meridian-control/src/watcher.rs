//! File watcher (section 4.6.4).
//!
//! One watcher per registered repo with `auto_watch = true`. Events are
//! debounced so a burst of saves collapses into a single `REINDEX_MANY`
//! enqueue. The watcher never touches the database directly — matching
//! the design note "the watcher pushes debounced events onto a channel
//! consumed by an enqueue task" — it only emits `WatchEvent`s on an
//! mpsc channel for the daemon to turn into jobs.

use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One coalesced batch of changed paths for a repo, ready to become a
/// `REINDEX_MANY` job payload.
#[derive(Debug, Clone)]
pub struct WatchBatch {
    pub repo_name: String,
    pub changed_paths: Vec<PathBuf>,
}

/// Ignore patterns matched in addition to the repo's gitignore set
/// (section 4.6.4): VCS metadata and the usual dependency/venv caches.
pub fn default_ignore_dirs() -> HashSet<&'static str> {
    [".git", "node_modules", "__pycache__", ".venv", "target", ".mypy_cache"]
        .into_iter()
        .collect()
}

fn is_ignored(path: &Path, ignore_dirs: &HashSet<&'static str>) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| ignore_dirs.contains(s))
            .unwrap_or(false)
    })
}

/// Watches `root_path` for `repo_name`, forwarding debounced, filtered
/// batches of changed paths to `tx`. Runs until the returned debouncer (and
/// this task) is dropped.
pub fn spawn_watcher(
    repo_name: String,
    root_path: PathBuf,
    debounce_seconds: u64,
    tx: mpsc::Sender<WatchBatch>,
) -> notify::Result<notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>> {
    let ignore_dirs = default_ignore_dirs();
    let watched_repo = repo_name.clone();

    let mut debouncer = new_debouncer(
        Duration::from_secs(debounce_seconds.max(1)),
        move |result: DebounceEventResult| match result {
            Ok(events) => {
                let paths: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .map(|e| e.path)
                    .filter(|p| !is_ignored(p, &ignore_dirs))
                    .collect();
                if paths.is_empty() {
                    return;
                }
                debug!(repo = %watched_repo, count = paths.len(), "debounced filesystem events");
                let batch = WatchBatch {
                    repo_name: watched_repo.clone(),
                    changed_paths: paths,
                };
                if tx.blocking_send(batch).is_err() {
                    warn!(repo = %watched_repo, "watch batch receiver dropped");
                }
            }
            Err(err) => warn!(repo = %watched_repo, error = ?err, "watcher error"),
        },
    )?;

    debouncer
        .watcher()
        .watch(&root_path, notify::RecursiveMode::Recursive)?;

    Ok(debouncer)
}
