use crate::job::{JobId, JobStatus};
use thiserror::Error;

/// Failures of the job record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the given id.
    #[error("job {0} not found")]
    NotFound(JobId),

    /// A conditional update lost a race: the record was not in the state the
    /// caller observed. On claim this means another worker owns the job.
    #[error("conflicting update for job {0}")]
    Conflict(JobId),

    /// The underlying database failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failures of the queue transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Publish, receive or acknowledge could not reach the transport.
    #[error("queue transport unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the enqueue path.
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// Creating or reading the job record failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The record was created but publishing its id failed. The record
    /// remains `queued` and can be recovered with
    /// [`Producer::republish`](crate::Producer::republish).
    #[error("failed to publish job {id} to the queue: {source}")]
    Publish {
        /// The already-created job record.
        id: JobId,
        /// The underlying transport failure.
        source: TransportError,
    },

    /// `republish` was asked to re-publish a job that is not `queued`.
    #[error("job {id} is {status}, not queued")]
    NotQueued {
        /// The job in question.
        id: JobId,
        /// Its current status.
        status: JobStatus,
    },
}

/// Failures of the external summarization computation.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// A retryable failure (backend hiccup, resource exhaustion, …).
    #[error("transient summarization failure: {0}")]
    Transient(#[source] anyhow::Error),

    /// A non-retryable failure, e.g. malformed input. The job fails
    /// immediately without consuming further attempts.
    #[error("permanent summarization failure: {0}")]
    Permanent(#[source] anyhow::Error),

    /// The computation exceeded its own deadline. Treated as retryable.
    #[error("summarization timed out")]
    Timeout,
}

impl SummarizeError {
    /// Whether the retry policy may schedule another attempt for this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SummarizeError::Permanent(_))
    }
}
