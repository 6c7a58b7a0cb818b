//! The record store contract.
//!
//! The store is the single source of truth for job state. Every status
//! transition is a conditional update serialized through it, which is what
//! makes concurrent workers safe without any global lock: the [`claim`]
//! operation is a compare-and-swap on `(status, attempt_count)`, so for any
//! given delivery exactly one worker moves a job into `processing`.
//!
//! [`claim`]: JobStore::claim

use crate::errors::StoreError;
use crate::job::{Job, JobId, JobStatus, OwnerId};
use async_trait::async_trait;

/// Filter for [`JobStore::list`]. Used by the status query path only.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter {
    /// Restrict to jobs submitted by this principal.
    pub owner: Option<OwnerId>,
    /// Restrict to jobs currently in this status.
    pub status: Option<JobStatus>,
}

/// Durable storage of job records.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Atomically allocate an id and insert a new record with
    /// status `queued` and `attempt_count` 0.
    async fn create(&self, payload: String, owner: OwnerId) -> Result<Job, StoreError>;

    /// Load a record. [`StoreError::NotFound`] if the id is unknown.
    async fn get(&self, id: JobId) -> Result<Job, StoreError>;

    /// Compare-and-swap claim: move the job to `processing` and increment
    /// `attempt_count`, but only if the record still carries exactly the
    /// status and attempt count the caller observed. Any mismatch, and any
    /// attempt to claim a terminal record, is [`StoreError::Conflict`].
    async fn claim(
        &self,
        id: JobId,
        expected_status: JobStatus,
        expected_attempts: i32,
    ) -> Result<Job, StoreError>;

    /// `processing → done`, recording the summary.
    /// [`StoreError::Conflict`] if the job is not `processing`.
    async fn complete(&self, id: JobId, summary: String) -> Result<Job, StoreError>;

    /// `processing → queued`, for a scheduled retry. Keeps the job visibly
    /// queued during the backoff window instead of stuck at `processing`.
    /// [`StoreError::Conflict`] if the job is not `processing`.
    async fn requeue(&self, id: JobId) -> Result<Job, StoreError>;

    /// Move any non-terminal job to `failed`.
    /// [`StoreError::Conflict`] if the job is already terminal.
    async fn mark_failed(&self, id: JobId) -> Result<Job, StoreError>;

    /// List records matching the filter, oldest first.
    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError>;
}
