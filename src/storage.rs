//! Postgres-backed implementation of [`JobStore`].

use crate::errors::StoreError;
use crate::job::{Job, JobId, JobStatus, OwnerId};
use crate::store::{JobFilter, JobStore};
use async_trait::async_trait;
use sqlx::PgPool;

/// DDL for the job table. Applied by [`PgStore::ensure_schema`]; embedders
/// with their own migration tooling can run it themselves instead.
pub const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS summary_jobs (
        id BIGSERIAL PRIMARY KEY,
        payload TEXT NOT NULL,
        summary TEXT,
        status TEXT NOT NULL DEFAULT 'queued',
        attempt_count INTEGER NOT NULL DEFAULT 0,
        owner_id BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
";

const COLUMNS: &str = "id, payload, summary, status, attempt_count, owner_id, created_at, updated_at";

/// A [`JobStore`] backed by a Postgres table.
///
/// Conditional updates are expressed as `UPDATE … WHERE` clauses over the
/// expected prior state, so claims and settles are atomic at the database
/// and lost updates between concurrent workers surface as
/// [`StoreError::Conflict`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the job table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Distinguish "row gone" from "row in the wrong state" after a
    /// conditional update matched nothing.
    async fn conflict_or_not_found(&self, id: JobId) -> StoreError {
        match self.get(id).await {
            Ok(_) => StoreError::Conflict(id),
            Err(err) => err,
        }
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create(&self, payload: String, owner: OwnerId) -> Result<Job, StoreError> {
        let job = sqlx::query_as::<_, Job>(&format!(
            "INSERT INTO summary_jobs (payload, owner_id) VALUES ($1, $2) RETURNING {COLUMNS}"
        ))
        .bind(payload)
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Job, StoreError> {
        sqlx::query_as::<_, Job>(&format!("SELECT {COLUMNS} FROM summary_jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    async fn claim(
        &self,
        id: JobId,
        expected_status: JobStatus,
        expected_attempts: i32,
    ) -> Result<Job, StoreError> {
        if expected_status.is_terminal() {
            return Err(StoreError::Conflict(id));
        }
        let updated = sqlx::query_as::<_, Job>(&format!(
            r"
            UPDATE summary_jobs
            SET status = 'processing', attempt_count = attempt_count + 1, updated_at = NOW()
            WHERE id = $1 AND status = $2 AND attempt_count = $3
            RETURNING {COLUMNS}
            "
        ))
        .bind(id)
        .bind(expected_status.as_str())
        .bind(expected_attempts)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(job) => Ok(job),
            None => Err(self.conflict_or_not_found(id).await),
        }
    }

    async fn complete(&self, id: JobId, summary: String) -> Result<Job, StoreError> {
        let updated = sqlx::query_as::<_, Job>(&format!(
            r"
            UPDATE summary_jobs
            SET status = 'done', summary = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            RETURNING {COLUMNS}
            "
        ))
        .bind(id)
        .bind(summary)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(job) => Ok(job),
            None => Err(self.conflict_or_not_found(id).await),
        }
    }

    async fn requeue(&self, id: JobId) -> Result<Job, StoreError> {
        let updated = sqlx::query_as::<_, Job>(&format!(
            r"
            UPDATE summary_jobs
            SET status = 'queued', updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            RETURNING {COLUMNS}
            "
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(job) => Ok(job),
            None => Err(self.conflict_or_not_found(id).await),
        }
    }

    async fn mark_failed(&self, id: JobId) -> Result<Job, StoreError> {
        let updated = sqlx::query_as::<_, Job>(&format!(
            r"
            UPDATE summary_jobs
            SET status = 'failed', updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('done', 'failed')
            RETURNING {COLUMNS}
            "
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(job) => Ok(job),
            None => Err(self.conflict_or_not_found(id).await),
        }
    }

    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        let mut query = format!("SELECT {COLUMNS} FROM summary_jobs");
        let mut clauses = Vec::new();
        if filter.owner.is_some() {
            clauses.push(format!("owner_id = ${}", clauses.len() + 1));
        }
        if filter.status.is_some() {
            clauses.push(format!("status = ${}", clauses.len() + 1));
        }
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(" ORDER BY id ASC");

        let mut query_builder = sqlx::query_as::<_, Job>(&query);
        if let Some(owner) = filter.owner {
            query_builder = query_builder.bind(owner);
        }
        if let Some(status) = filter.status {
            query_builder = query_builder.bind(status.as_str());
        }

        Ok(query_builder.fetch_all(&self.pool).await?)
    }
}
