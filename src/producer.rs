//! The enqueue path: create a record, then publish its id.

use crate::errors::EnqueueError;
use crate::job::{JobId, JobStatus, OwnerId};
use crate::store::JobStore;
use crate::transport::QueueTransport;
use std::sync::Arc;
use tracing::instrument;

/// Creates job records and publishes their ids to the queue.
///
/// The record is written first, synchronously. If the publish then fails,
/// the record stays `queued` and the error is surfaced to the caller, so a
/// job can be invisible to workers but never silently lost: a
/// reconciliation sweep can find `queued` records with no queue entry and
/// call [`republish`](Self::republish), which never creates a duplicate
/// record.
#[derive(Debug)]
pub struct Producer<S, T> {
    store: Arc<S>,
    transport: Arc<T>,
}

impl<S: JobStore, T: QueueTransport> Producer<S, T> {
    /// Create a producer over the given store and transport.
    pub fn new(store: Arc<S>, transport: Arc<T>) -> Self {
        Self { store, transport }
    }

    /// Persist a new `queued` job and publish its id. Returns once the
    /// record exists and the publish has been attempted.
    #[instrument(name = "summaryq.enqueue", skip(self, payload))]
    pub async fn enqueue(
        &self,
        payload: impl Into<String>,
        owner: OwnerId,
    ) -> Result<JobId, EnqueueError> {
        let job = self.store.create(payload.into(), owner).await?;
        self.transport
            .publish(job.id, None)
            .await
            .map_err(|source| EnqueueError::Publish { id: job.id, source })?;
        Ok(job.id)
    }

    /// Re-publish the id of an existing `queued` job, without creating a
    /// record. [`EnqueueError::NotQueued`] for any other status.
    #[instrument(name = "summaryq.republish", skip(self))]
    pub async fn republish(&self, id: JobId) -> Result<(), EnqueueError> {
        let job = self.store.get(id).await?;
        if job.status != JobStatus::Queued {
            return Err(EnqueueError::NotQueued {
                id,
                status: job.status,
            });
        }
        self.transport
            .publish(id, None)
            .await
            .map_err(|source| EnqueueError::Publish { id, source })?;
        Ok(())
    }
}
