//! In-process implementation of [`JobStore`].

use crate::errors::StoreError;
use crate::job::{Job, JobId, JobStatus, OwnerId};
use crate::store::{JobFilter, JobStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

/// An in-memory [`JobStore`] for tests and single-process embedders.
///
/// All conditional-update semantics match [`PgStore`](crate::PgStore): each
/// operation runs under one lock acquisition, so claims and settles are
/// atomic with respect to each other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: Mutex<HashMap<JobId, Job>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    /// Create an empty store. Ids start at 1.
    pub fn new() -> Self {
        Self::default()
    }

    fn mutate<F>(&self, id: JobId, f: F) -> Result<Job, StoreError>
    where
        F: FnOnce(&mut Job) -> Result<(), StoreError>,
    {
        let mut jobs = self.jobs.lock().expect("job map lock poisoned");
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        f(job)?;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create(&self, payload: String, owner: OwnerId) -> Result<Job, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Utc::now();
        let job = Job {
            id,
            payload,
            summary: None,
            status: JobStatus::Queued,
            attempt_count: 0,
            owner_id: owner,
            created_at: now,
            updated_at: now,
        };
        self.jobs
            .lock()
            .expect("job map lock poisoned")
            .insert(id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Job, StoreError> {
        self.jobs
            .lock()
            .expect("job map lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn claim(
        &self,
        id: JobId,
        expected_status: JobStatus,
        expected_attempts: i32,
    ) -> Result<Job, StoreError> {
        self.mutate(id, |job| {
            if job.status.is_terminal()
                || job.status != expected_status
                || job.attempt_count != expected_attempts
            {
                return Err(StoreError::Conflict(id));
            }
            job.status = JobStatus::Processing;
            job.attempt_count += 1;
            Ok(())
        })
    }

    async fn complete(&self, id: JobId, summary: String) -> Result<Job, StoreError> {
        self.mutate(id, |job| {
            if job.status != JobStatus::Processing {
                return Err(StoreError::Conflict(id));
            }
            job.status = JobStatus::Done;
            job.summary = Some(summary);
            Ok(())
        })
    }

    async fn requeue(&self, id: JobId) -> Result<Job, StoreError> {
        self.mutate(id, |job| {
            if job.status != JobStatus::Processing {
                return Err(StoreError::Conflict(id));
            }
            job.status = JobStatus::Queued;
            Ok(())
        })
    }

    async fn mark_failed(&self, id: JobId) -> Result<Job, StoreError> {
        self.mutate(id, |job| {
            if job.status.is_terminal() {
                return Err(StoreError::Conflict(id));
            }
            job.status = JobStatus::Failed;
            Ok(())
        })
    }

    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.lock().expect("job map lock poisoned");
        let mut matches: Vec<Job> = jobs
            .values()
            .filter(|job| filter.owner.is_none_or(|owner| job.owner_id == owner))
            .filter(|job| filter.status.is_none_or(|status| job.status == status))
            .cloned()
            .collect();
        matches.sort_by_key(|job| job.id);
        Ok(matches)
    }
}
