//! The job record and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier of a job record. Assigned by the store, never reused.
pub type JobId = i64;

/// Identifier of the submitting principal. Opaque to this crate; it is
/// stored on the record so an API layer can authorize status reads.
pub type OwnerId = i64;

/// Lifecycle state of a job.
///
/// Transitions are monotonic: `Queued → Processing → Done | Failed`, with
/// `Processing → Queued` allowed only for a scheduled retry. `Done` and
/// `Failed` are terminal; a job never leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, or waiting for a retry; a queue entry exists or can be
    /// re-published without creating a duplicate record.
    Queued,
    /// A worker has claimed the job and is running the summarizer.
    Processing,
    /// Summarization succeeded; `summary` is set.
    Done,
    /// Attempts exhausted or a permanent failure; no further automatic retry.
    Failed,
}

impl JobStatus {
    /// Lowercase wire representation, as stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether the status is terminal (`Done` or `Failed`).
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status string that is none of the four known wire values.
#[derive(Debug, Error)]
#[error("unknown job status: {0}")]
pub struct ParseJobStatusError(String);

impl FromStr for JobStatus {
    type Err = ParseJobStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(ParseJobStatusError(other.to_owned())),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = ParseJobStatusError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A persisted unit of summarization work.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Job {
    /// Unique identifier for the job.
    pub id: JobId,
    /// The input text. Immutable once set.
    pub payload: String,
    /// The derived summary. `Some` if and only if `status` is [`JobStatus::Done`].
    pub summary: Option<String>,
    /// Current lifecycle state.
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    /// Number of times a worker has begun processing this job.
    pub attempt_count: i32,
    /// The submitting principal.
    pub owner_id: OwnerId,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Touched on every status change.
    pub updated_at: DateTime<Utc>,
}
