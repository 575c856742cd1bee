//! Control-plane error types.

use thiserror::Error;

/// A fuzzy-match suggestion returned alongside a `RepoNotFound` error.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RepoSuggestion {
    pub name: String,
    pub similarity: f64,
    pub file_count: u64,
    pub last_indexed_at: Option<u64>,
}

/// Errors surfaced by the control plane (registry, job queue, daemon).
///
/// Mirrors the Error Kinds table in the specification: each variant here
/// maps to one row of that table and carries what the caller needs to
/// decide whether to retry.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Repo name or id did not resolve to a registration. Never retried.
    #[error("repo '{query}' not found")]
    RepoNotFound {
        query: String,
        suggestions: Vec<RepoSuggestion>,
    },

    /// A schema (or its SQLite-file equivalent) is already owned by a
    /// different repo identity. Surfaced, never auto-recovered.
    #[error("schema '{schema_name}' is already owned by a different repo")]
    SchemaConflict { schema_name: String },

    /// The job referenced by id does not exist.
    #[error("job '{0}' not found")]
    JobNotFound(uuid::Uuid),

    /// Enqueue was attempted against a repo that is disabled.
    #[error("repo '{0}' is disabled")]
    RepoDisabled(String),

    /// A job exceeded `job_timeout_sec` and was reclaimed by the health monitor.
    #[error("job '{0}' timed out and was released back to PENDING")]
    JobTimeout(uuid::Uuid),

    /// The job was cancelled by the user or by a timeout. Terminal.
    #[error("job '{0}' was cancelled")]
    Cancelled(uuid::Uuid),

    /// SQLite-level failure. Classified as internal; retried by the
    /// calling layer only when the operation is idempotent.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// I/O failure (schema directory creation, watcher setup, ...).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ControlError>;
