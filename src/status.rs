//! Read-only projection of job state for callers.

use crate::errors::StoreError;
use crate::job::{Job, JobId, JobStatus, OwnerId};
use crate::store::{JobFilter, JobStore};
use serde::Serialize;

/// What a caller sees when asking about a job. No side effects; reads are
/// eventually consistent with concurrent worker transitions.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// The job in question.
    pub id: JobId,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// The summary, present only once the job is `done`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl From<Job> for StatusReport {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            status: job.status,
            summary: job.summary,
        }
    }
}

/// Look up the current state of one job.
pub async fn job_status<S: JobStore>(store: &S, id: JobId) -> Result<StatusReport, StoreError> {
    Ok(store.get(id).await?.into())
}

/// List the jobs submitted by one principal, oldest first.
pub async fn jobs_for_owner<S: JobStore>(
    store: &S,
    owner: OwnerId,
) -> Result<Vec<StatusReport>, StoreError> {
    let filter = JobFilter {
        owner: Some(owner),
        ..JobFilter::default()
    };
    let jobs = store.list(filter).await?;
    Ok(jobs.into_iter().map(StatusReport::from).collect())
}
