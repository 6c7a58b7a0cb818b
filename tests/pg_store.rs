#![allow(missing_docs)]
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

//! Postgres-backed store tests. They need a real database and are skipped
//! unless the `DATABASE_URL` environment variable is set.

use claims::{assert_matches, assert_ok};
use sqlx::postgres::PgPoolOptions;
use summaryq::{JobStatus, JobStore, PgStore, StoreError};

async fn connect() -> anyhow::Result<Option<PgStore>> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres store test");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&database_url)
        .await?;
    let store = PgStore::new(pool);
    store.ensure_schema().await?;
    Ok(Some(store))
}

#[tokio::test]
async fn records_move_through_the_state_machine() -> anyhow::Result<()> {
    let Some(store) = connect().await? else {
        return Ok(());
    };

    let job = store.create("A long article about...".to_owned(), 42).await?;
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempt_count, 0);

    let claimed = store.claim(job.id, JobStatus::Queued, 0).await?;
    assert_eq!(claimed.status, JobStatus::Processing);
    assert_eq!(claimed.attempt_count, 1);

    // The claim is a compare-and-swap: replaying it must conflict.
    assert_matches!(
        store.claim(job.id, JobStatus::Queued, 0).await,
        Err(StoreError::Conflict(_))
    );

    let done = store.complete(job.id, "Short summary.".to_owned()).await?;
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(done.summary.as_deref(), Some("Short summary."));

    // Terminal records reject every further transition.
    assert_matches!(
        store.mark_failed(job.id).await,
        Err(StoreError::Conflict(_))
    );

    Ok(())
}

#[tokio::test]
async fn retries_requeue_and_unknown_ids_are_not_found() -> anyhow::Result<()> {
    let Some(store) = connect().await? else {
        return Ok(());
    };

    let job = store.create("flaky input".to_owned(), 42).await?;
    assert_ok!(store.claim(job.id, JobStatus::Queued, 0).await);

    let requeued = store.requeue(job.id).await?;
    assert_eq!(requeued.status, JobStatus::Queued);
    assert_eq!(requeued.attempt_count, 1);

    let reclaimed = store.claim(job.id, JobStatus::Queued, 1).await?;
    assert_eq!(reclaimed.attempt_count, 2);
    assert_ok!(store.mark_failed(job.id).await);

    assert_matches!(store.get(-1).await, Err(StoreError::NotFound(-1)));

    Ok(())
}
