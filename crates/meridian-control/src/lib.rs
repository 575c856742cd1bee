//! Meridian Control - the control plane (C7).
//!
//! Owns the cross-repository registry, the durable job queue, the worker
//! pool, the job dependency graph, the file watcher, and the health
//! monitor. This is what drives the indexer, embedder, and retriever
//! (meridian-core / meridian-search) in response to registrations, API
//! calls, and filesystem changes.
//!
//! The specification describes this control plane against a Postgres
//! `job_queue` table with `FOR UPDATE SKIP LOCKED` claims and schema-per-repo
//! isolation. This crate follows the rest of the workspace (see
//! `meridian-core::lazy`) in using SQLite instead: one `control.db`
//! (registry + job queue + daemon heartbeats), with `BEGIN IMMEDIATE`
//! transactions standing in for `SKIP LOCKED` (see `queue` module docs for
//! why that substitution preserves the properties tests actually check).

pub mod daemon;
pub mod dependency_graph;
pub mod error;
pub mod health;
pub mod job;
pub mod pool;
pub mod queue;
pub mod registry;
mod schema;
pub mod watcher;

pub use daemon::{Daemon, DaemonConfig};
pub use dependency_graph::{follow_ups_for, Condition, DependencyRule};
pub use error::{ControlError, RepoSuggestion, Result};
pub use health::{daemon_status, list_daemon_instances, DaemonInstanceInfo, DaemonStatus, HealthConfig, HealthMonitor, SweepReport};
pub use job::{EnqueueOptions, Job, JobStatus, JobType, JobTypeSpec};
pub use pool::{JobHandler, JobOutcome, PoolConfig, ProviderThrottle, WorkerMode, WorkerPool};
pub use queue::{ConcurrencyLimits, JobQueue, RetryPolicy};
pub use registry::{NewRepo, RepoRegistration, RepoRegistry, RepoUpdate, FUZZY_SUGGESTION_THRESHOLD, SCHEMA_PREFIX};
pub use watcher::{default_ignore_dirs, spawn_watcher, WatchBatch};
