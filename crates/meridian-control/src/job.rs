//! Job taxonomy and the `Job` record.
//!
//! `JobType` is a closed set (section 4.7 of the spec); every variant here
//! has a fixed default priority, a declaration of whether it runs inside a
//! repo schema, and whether it is safe to simply re-run on retry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of job types the control plane understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    FullIndex,
    ReindexFile,
    ReindexMany,
    EmbedMissing,
    EmbedChunk,
    EmbedSummaries,
    DocsScan,
    TagRulesSync,
    SummarizeMissing,
    SummarizeFiles,
    SummarizeSymbols,
    RegenerateSummary,
}

/// Static declaration for one job type, matching the table in section 4.7.
#[derive(Debug, Clone, Copy)]
pub struct JobTypeSpec {
    pub runs_in_repo_schema: bool,
    pub default_priority: i32,
    pub idempotent_on_retry: bool,
}

impl JobType {
    pub const ALL: [JobType; 12] = [
        JobType::FullIndex,
        JobType::ReindexFile,
        JobType::ReindexMany,
        JobType::EmbedMissing,
        JobType::EmbedChunk,
        JobType::EmbedSummaries,
        JobType::DocsScan,
        JobType::TagRulesSync,
        JobType::SummarizeMissing,
        JobType::SummarizeFiles,
        JobType::SummarizeSymbols,
        JobType::RegenerateSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullIndex => "FULL_INDEX",
            JobType::ReindexFile => "REINDEX_FILE",
            JobType::ReindexMany => "REINDEX_MANY",
            JobType::EmbedMissing => "EMBED_MISSING",
            JobType::EmbedChunk => "EMBED_CHUNK",
            JobType::EmbedSummaries => "EMBED_SUMMARIES",
            JobType::DocsScan => "DOCS_SCAN",
            JobType::TagRulesSync => "TAG_RULES_SYNC",
            JobType::SummarizeMissing => "SUMMARIZE_MISSING",
            JobType::SummarizeFiles => "SUMMARIZE_FILES",
            JobType::SummarizeSymbols => "SUMMARIZE_SYMBOLS",
            JobType::RegenerateSummary => "REGENERATE_SUMMARY",
        }
    }

    /// Declared properties, matching "Each declares: {runs_in_repo_schema,
    /// default_priority, idempotent_on_retry, dedup_key_template}".
    pub fn spec(&self) -> JobTypeSpec {
        match self {
            JobType::FullIndex => JobTypeSpec {
                runs_in_repo_schema: true,
                default_priority: 10,
                idempotent_on_retry: true,
            },
            JobType::ReindexFile | JobType::ReindexMany => JobTypeSpec {
                runs_in_repo_schema: true,
                default_priority: 8,
                idempotent_on_retry: true,
            },
            JobType::DocsScan => JobTypeSpec {
                runs_in_repo_schema: true,
                default_priority: 9,
                idempotent_on_retry: true,
            },
            JobType::TagRulesSync => JobTypeSpec {
                runs_in_repo_schema: true,
                default_priority: 7,
                idempotent_on_retry: true,
            },
            JobType::EmbedMissing | JobType::EmbedChunk => JobTypeSpec {
                runs_in_repo_schema: true,
                default_priority: 5,
                idempotent_on_retry: true,
            },
            JobType::SummarizeMissing
            | JobType::SummarizeFiles
            | JobType::SummarizeSymbols => JobTypeSpec {
                runs_in_repo_schema: true,
                default_priority: 4,
                idempotent_on_retry: true,
            },
            JobType::EmbedSummaries => JobTypeSpec {
                runs_in_repo_schema: true,
                default_priority: 3,
                idempotent_on_retry: true,
            },
            JobType::RegenerateSummary => JobTypeSpec {
                runs_in_repo_schema: true,
                default_priority: 2,
                // regenerates from scratch each time; retry is a clean overwrite.
                idempotent_on_retry: true,
            },
        }
    }

    /// `dedup_key_template`: the default dedup key used by `enqueue()` when
    /// the caller doesn't supply one explicitly. `None` means duplicates
    /// are allowed (e.g. REINDEX_FILE for distinct paths).
    pub fn default_dedup_key(&self, repo_name: &str) -> Option<String> {
        match self {
            JobType::FullIndex => Some(format!("{repo_name}:FULL_INDEX")),
            JobType::DocsScan => Some(format!("{repo_name}:DOCS_SCAN")),
            JobType::TagRulesSync => Some(format!("{repo_name}:TAG_RULES_SYNC")),
            JobType::EmbedMissing => Some(format!("{repo_name}:EMBED_MISSING")),
            JobType::EmbedSummaries => Some(format!("{repo_name}:EMBED_SUMMARIES")),
            JobType::SummarizeMissing => Some(format!("{repo_name}:SUMMARIZE_MISSING")),
            JobType::SummarizeFiles => Some(format!("{repo_name}:SUMMARIZE_FILES")),
            JobType::SummarizeSymbols => Some(format!("{repo_name}:SUMMARIZE_SYMBOLS")),
            JobType::RegenerateSummary => Some(format!("{repo_name}:REGENERATE_SUMMARY")),
            JobType::ReindexFile | JobType::ReindexMany | JobType::EmbedChunk => None,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = crate::error::ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|jt| jt.as_str() == s)
            .ok_or_else(|| crate::error::ControlError::Other(format!("unknown job_type '{s}'")))
    }
}

impl Serialize for JobStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        JobStatus::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Claimed,
    Done,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Claimed => "CLAIMED",
            JobStatus::Done => "DONE",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    /// Non-terminal statuses participate in dedup-key collision checks.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::Cancelled)
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "CLAIMED" => Ok(JobStatus::Claimed),
            "DONE" => Ok(JobStatus::Done),
            "FAILED" => Ok(JobStatus::Failed),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable unit of work in the job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: uuid::Uuid,
    pub repo_name: String,
    pub schema_name: String,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub claimed_by: Option<String>,
    pub dedup_key: Option<String>,
    pub created_at: i64,
    pub run_after: Option<i64>,
    pub claimed_at: Option<i64>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub error: Option<String>,
    pub error_detail: Option<String>,
}

/// Options accepted by `JobQueue::enqueue`.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub priority: Option<i32>,
    pub dedup_key: Option<String>,
    pub max_attempts: Option<i32>,
    pub run_after: Option<i64>,
}

pub(crate) fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before UNIX_EPOCH")
        .as_secs() as i64
}
