use crate::errors::{StoreError, SummarizeError};
use crate::job::Job;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::store::JobStore;
use crate::summarizer::Summarizer;
use crate::transport::{Delivery, QueueTransport};
use crate::util::panic_message;
use anyhow::anyhow;
use futures_util::FutureExt;
use rand::Rng;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info, info_span, warn};

pub(crate) struct Worker<S, T> {
    pub(crate) store: Arc<S>,
    pub(crate) transport: Arc<T>,
    pub(crate) summarizer: Arc<dyn Summarizer>,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) poll_interval: Duration,
    pub(crate) jitter: Duration,
    pub(crate) shutdown_when_queue_empty: bool,
}

impl<S: JobStore, T: QueueTransport> Worker<S, T> {
    /// Calculate the error-backoff sleep duration with random jitter applied.
    fn sleep_duration_with_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.poll_interval;
        }

        let jitter_millis = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let random_jitter = rand::thread_rng().gen_range(0..=jitter_millis);
        self.poll_interval + Duration::from_millis(random_jitter)
    }

    /// Process deliveries forever, or until the queue drains if
    /// `shutdown_when_queue_empty` is set.
    pub(crate) async fn run(&self) {
        loop {
            match self.next_delivery().await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    if self.shutdown_when_queue_empty && self.transport.pending() == 0 {
                        debug!("No pending summary jobs found. Shutting down the worker…");
                        break;
                    }
                }
                Err(error) => {
                    error!("Failed to process delivery: {error}");
                    sleep(self.sleep_duration_with_jitter()).await;
                }
            }
        }
    }

    /// Wait for the next delivery and process it.
    ///
    /// Returns:
    /// - `Ok(Some(job_id))` if a delivery was handled
    /// - `Ok(None)` if the receive wait timed out
    /// - `Err(...)` if the transport or the record store failed; the
    ///   delivery, if any, stays unacknowledged and will be redelivered
    async fn next_delivery(&self) -> anyhow::Result<Option<i64>> {
        let Some(delivery) = self.transport.receive(self.poll_interval).await? else {
            return Ok(None);
        };

        let span = info_span!("job", job.id = %delivery.job_id);
        self.process(&delivery).instrument(span).await?;

        Ok(Some(delivery.job_id))
    }

    async fn process(&self, delivery: &Delivery) -> anyhow::Result<()> {
        let id = delivery.job_id;

        let job = match self.store.get(id).await {
            Ok(job) => job,
            Err(StoreError::NotFound(_)) => {
                warn!("Dropping delivery for unknown job");
                self.transport.ack(delivery).await?;
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };

        // At-least-once delivery: a terminal record means this is a
        // duplicate, discard without re-processing.
        if job.status.is_terminal() {
            debug!(job.status = %job.status, "Duplicate delivery for finished job, discarding…");
            self.transport.ack(delivery).await?;
            return Ok(());
        }

        // A non-terminal record with no attempts left is a worker that died
        // mid-way through the final attempt. Settle it instead of running
        // the summarizer once more.
        if job.attempt_count >= self.retry_policy.max_attempts {
            warn!(job.attempts = job.attempt_count, "Attempts exhausted, failing job");
            match self.store.mark_failed(id).await {
                Ok(_) | Err(StoreError::Conflict(_)) | Err(StoreError::NotFound(_)) => {}
                Err(error) => return Err(error.into()),
            }
            self.transport.ack(delivery).await?;
            return Ok(());
        }

        let job = match self.store.claim(id, job.status, job.attempt_count).await {
            Ok(job) => job,
            Err(StoreError::Conflict(_)) | Err(StoreError::NotFound(_)) => {
                debug!("Job already claimed by another worker, discarding…");
                self.transport.ack(delivery).await?;
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };

        debug!(job.attempt = job.attempt_count, "Summarizing…");

        let outcome = AssertUnwindSafe(self.summarizer.summarize(&job.payload))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(SummarizeError::Transient(anyhow!(
                    "summarizer panicked: {}",
                    panic_message(&*panic)
                )))
            });

        match outcome {
            Ok(summary) => self.settle_success(delivery, &job, summary).await,
            Err(error) => self.settle_failure(delivery, &job, &error).await,
        }
    }

    async fn settle_success(
        &self,
        delivery: &Delivery,
        job: &Job,
        summary: String,
    ) -> anyhow::Result<()> {
        match self.store.complete(job.id, summary).await {
            Ok(_) => info!("Summary stored"),
            Err(StoreError::Conflict(_)) => {
                debug!("Job was settled concurrently, dropping summary");
            }
            Err(error) => return Err(error.into()),
        }
        self.transport.ack(delivery).await?;
        Ok(())
    }

    async fn settle_failure(
        &self,
        delivery: &Delivery,
        job: &Job,
        error: &SummarizeError,
    ) -> anyhow::Result<()> {
        match self.retry_policy.decide(error, job.attempt_count) {
            RetryDecision::Retry { delay } => {
                warn!(
                    %error,
                    job.attempt = job.attempt_count,
                    "Summarization failed, retrying in {delay:?}…"
                );
                match self.store.requeue(job.id).await {
                    Ok(_) => {
                        // Publish before acknowledging: if the publish fails
                        // the original entry stays in flight and redelivers
                        // after the visibility timeout.
                        self.transport.publish(job.id, Some(delay)).await?;
                    }
                    Err(StoreError::Conflict(_)) => {
                        debug!("Job was settled concurrently, skipping retry");
                    }
                    Err(error) => return Err(error.into()),
                }
            }
            RetryDecision::GiveUp => {
                warn!(
                    %error,
                    job.attempt = job.attempt_count,
                    "Summarization failed permanently, giving up"
                );
                match self.store.mark_failed(job.id).await {
                    Ok(_) | Err(StoreError::Conflict(_)) => {}
                    Err(error) => return Err(error.into()),
                }
            }
        }
        self.transport.ack(delivery).await?;
        Ok(())
    }
}
