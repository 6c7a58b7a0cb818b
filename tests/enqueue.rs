#![allow(missing_docs)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)]

use async_trait::async_trait;
use claims::{assert_matches, assert_none, assert_ok, assert_some};
use insta::assert_compact_json_snapshot;
use std::sync::Arc;
use std::time::Duration;
use summaryq::{
    ChannelTransport, Delivery, EnqueueError, JobFilter, JobStatus, JobStore, MemoryStore,
    Producer, QueueTransport, StoreError, SummarizeError, Summarizer, TransportError, job_status,
    jobs_for_owner,
};

/// A transport whose publish path is down. Receive and ack still work so
/// the recovery half of a test can drain the queue.
struct BrokenPublishTransport;

#[async_trait]
impl QueueTransport for BrokenPublishTransport {
    async fn publish(&self, _job_id: i64, _delay: Option<Duration>) -> Result<(), TransportError> {
        Err(TransportError::Unavailable("broker connection refused".into()))
    }

    async fn receive(&self, _wait: Duration) -> Result<Option<Delivery>, TransportError> {
        Ok(None)
    }

    async fn ack(&self, _delivery: &Delivery) -> Result<(), TransportError> {
        Ok(())
    }

    fn pending(&self) -> usize {
        0
    }
}

struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        Ok(text.to_owned())
    }
}

#[tokio::test]
async fn enqueue_creates_queued_record_and_publishes_its_id() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(ChannelTransport::new(Duration::from_secs(10)));
    let producer = Producer::new(store.clone(), transport.clone());

    let job_id = producer.enqueue("A long article about...", 42).await?;

    let job = store.get(job_id).await?;
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempt_count, 0);
    assert_eq!(job.owner_id, 42);
    assert_eq!(job.payload, "A long article about...");
    assert_none!(job.summary);

    // The queue entry carries the job id only.
    assert_eq!(transport.pending(), 1);
    let delivery = assert_some!(transport.receive(Duration::from_secs(1)).await?);
    assert_eq!(delivery.job_id, job_id);

    Ok(())
}

#[tokio::test]
async fn failed_publish_leaves_record_queued_for_reconciliation() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());

    let broken = Producer::new(store.clone(), Arc::new(BrokenPublishTransport));
    let error = broken
        .enqueue("A long article about...", 42)
        .await
        .unwrap_err();
    let job_id = match error {
        EnqueueError::Publish { id, .. } => id,
        other => panic!("unexpected enqueue error: {other}"),
    };

    // The record exists and stays queued; nothing was lost.
    assert_eq!(store.get(job_id).await?.status, JobStatus::Queued);

    // A reconciliation sweep can later re-publish the same id through a
    // healthy transport without creating a second record.
    let transport = Arc::new(ChannelTransport::new(Duration::from_secs(10)));
    let producer = Producer::new(store.clone(), transport.clone());
    assert_ok!(producer.republish(job_id).await);

    assert_eq!(transport.pending(), 1);
    assert_eq!(store.list(JobFilter::default()).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn republish_rejects_jobs_that_are_not_queued() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(ChannelTransport::new(Duration::from_secs(10)));
    let producer = Producer::new(store.clone(), transport.clone());

    let job_id = producer.enqueue("A long article about...", 42).await?;
    assert_ok!(store.claim(job_id, JobStatus::Queued, 0).await);

    assert_matches!(
        producer.republish(job_id).await,
        Err(EnqueueError::NotQueued {
            status: JobStatus::Processing,
            ..
        })
    );

    assert_matches!(
        producer.republish(9999).await,
        Err(EnqueueError::Store(StoreError::NotFound(9999)))
    );

    Ok(())
}

#[tokio::test]
async fn status_queries_report_current_state_without_side_effects() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(ChannelTransport::new(Duration::from_secs(10)));
    let producer = Producer::new(store.clone(), transport.clone());

    let job_id = producer.enqueue("A long article about...", 42).await?;

    let report = job_status(store.as_ref(), job_id).await?;
    assert_eq!(report.status, JobStatus::Queued);
    assert_none!(report.summary);

    // Reading the status must not advance the state machine.
    assert_eq!(store.get(job_id).await?.attempt_count, 0);
    assert_eq!(transport.pending(), 1);

    assert_matches!(
        job_status(store.as_ref(), 9999).await,
        Err(StoreError::NotFound(9999))
    );

    Ok(())
}

#[tokio::test]
async fn owner_listing_only_returns_that_owners_jobs() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.create("first article".to_owned(), 1).await?;
    store.create("second article".to_owned(), 1).await?;
    store.create("someone else's article".to_owned(), 2).await?;

    let reports = jobs_for_owner(store.as_ref(), 1).await?;
    assert_compact_json_snapshot!(reports, @r#"[{"id": 1, "status": "queued"}, {"id": 2, "status": "queued"}]"#);

    Ok(())
}

#[tokio::test]
async fn listing_can_filter_by_status() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let first = store.create("first article".to_owned(), 1).await?;
    store.create("second article".to_owned(), 1).await?;

    assert_ok!(store.claim(first.id, JobStatus::Queued, 0).await);
    assert_ok!(store.complete(first.id, "done already".to_owned()).await);

    let queued = store
        .list(JobFilter {
            status: Some(JobStatus::Queued),
            ..JobFilter::default()
        })
        .await?;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].payload, "second article");

    let done = store
        .list(JobFilter {
            owner: Some(1),
            status: Some(JobStatus::Done),
        })
        .await?;
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, first.id);

    Ok(())
}

#[test]
fn statuses_use_lowercase_wire_values() -> anyhow::Result<()> {
    assert_eq!(
        serde_json::to_value(JobStatus::Queued)?,
        serde_json::json!("queued")
    );
    assert_eq!(
        serde_json::to_value(JobStatus::Processing)?,
        serde_json::json!("processing")
    );
    assert_eq!("done".parse::<JobStatus>()?, JobStatus::Done);
    assert_eq!("failed".parse::<JobStatus>()?, JobStatus::Failed);
    assert!("paused".parse::<JobStatus>().is_err());

    Ok(())
}

#[tokio::test]
async fn summaries_round_trip_through_the_engine() -> anyhow::Result<()> {
    use summaryq::Runner;

    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(ChannelTransport::new(Duration::from_secs(10)));
    let producer = Producer::new(store.clone(), transport.clone());

    let job_id = producer.enqueue("whole text as summary", 42).await?;

    Runner::new(store.clone(), transport, Arc::new(EchoSummarizer))
        .poll_interval(Duration::from_millis(100))
        .shutdown_when_queue_empty()
        .start()
        .wait_for_shutdown()
        .await;

    let report = job_status(store.as_ref(), job_id).await?;
    assert_eq!(report.status, JobStatus::Done);
    assert_eq!(report.summary.as_deref(), Some("whole text as summary"));

    Ok(())
}
