//! The queue transport contract and an in-process implementation.
//!
//! Messages carry the job id only; the record store stays authoritative for
//! the content. Delivery is at-least-once: an entry that is received but not
//! acknowledged within the visibility timeout is redelivered, so consumers
//! must acknowledge only after their outcome is durably recorded and must
//! tolerate duplicates (the worker's terminal-state guard does).

use crate::errors::TransportError;
use crate::job::JobId;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::warn;

/// A received queue entry. Must be passed back to
/// [`QueueTransport::ack`] once the job's outcome is recorded.
#[derive(Debug)]
pub struct Delivery {
    /// The referenced job.
    pub job_id: JobId,
    /// Transport-assigned receipt for this particular delivery. A
    /// redelivered entry gets a fresh receipt.
    pub receipt: u64,
}

/// A durable, at-least-once channel carrying job ids from the producer to
/// the workers.
#[async_trait]
pub trait QueueTransport: Send + Sync + 'static {
    /// Publish a job reference, optionally after a delay (used for retry
    /// backoff). The entry counts as pending from the moment this returns.
    async fn publish(&self, job_id: JobId, delay: Option<Duration>) -> Result<(), TransportError>;

    /// Wait up to `wait` for the next entry. `Ok(None)` on timeout.
    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>, TransportError>;

    /// Acknowledge a delivery, removing the entry from the transport.
    /// Acknowledging a receipt that was already redelivered is a no-op.
    async fn ack(&self, delivery: &Delivery) -> Result<(), TransportError>;

    /// Number of entries that are queued, scheduled, or in flight.
    fn pending(&self) -> usize;
}

struct ChannelInner {
    tx: mpsc::UnboundedSender<JobId>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<JobId>>,
    in_flight: Mutex<HashSet<u64>>,
    next_receipt: AtomicU64,
    pending: AtomicUsize,
    visibility_timeout: Duration,
}

/// In-process [`QueueTransport`] on a tokio channel.
///
/// Redelivery works the same way as on a broker: every receive starts a
/// visibility timer, and if the receipt is still unacknowledged when the
/// timer fires, the job id goes back on the channel.
#[derive(Clone)]
pub struct ChannelTransport {
    inner: Arc<ChannelInner>,
}

impl ChannelTransport {
    /// Create a transport with the given visibility timeout.
    pub fn new(visibility_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(ChannelInner {
                tx,
                rx: tokio::sync::Mutex::new(rx),
                in_flight: Mutex::new(HashSet::new()),
                next_receipt: AtomicU64::new(0),
                pending: AtomicUsize::new(0),
                visibility_timeout,
            }),
        }
    }
}

impl std::fmt::Debug for ChannelTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelTransport")
            .field("pending", &self.pending())
            .field("visibility_timeout", &self.inner.visibility_timeout)
            .finish()
    }
}

#[async_trait]
impl QueueTransport for ChannelTransport {
    async fn publish(&self, job_id: JobId, delay: Option<Duration>) -> Result<(), TransportError> {
        let inner = &self.inner;
        inner.pending.fetch_add(1, Ordering::SeqCst);

        match delay {
            Some(delay) if !delay.is_zero() => {
                let inner = Arc::clone(inner);
                tokio::spawn(async move {
                    sleep(delay).await;
                    if inner.tx.send(job_id).is_err() {
                        inner.pending.fetch_sub(1, Ordering::SeqCst);
                        warn!(job.id = %job_id, "Queue closed before scheduled entry was published");
                    }
                });
                Ok(())
            }
            _ => inner.tx.send(job_id).map_err(|_| {
                inner.pending.fetch_sub(1, Ordering::SeqCst);
                TransportError::Unavailable("queue channel closed".into())
            }),
        }
    }

    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>, TransportError> {
        let job_id = {
            let mut rx = self.inner.rx.lock().await;
            match timeout(wait, rx.recv()).await {
                Err(_elapsed) => return Ok(None),
                Ok(None) => {
                    return Err(TransportError::Unavailable("queue channel closed".into()));
                }
                Ok(Some(job_id)) => job_id,
            }
        };

        let receipt = self.inner.next_receipt.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner
            .in_flight
            .lock()
            .expect("in-flight set lock poisoned")
            .insert(receipt);

        // Visibility timer: if the receipt is still outstanding when it
        // fires, the consumer is presumed dead and the entry goes back on
        // the channel under a new receipt.
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            sleep(inner.visibility_timeout).await;
            let expired = inner
                .in_flight
                .lock()
                .expect("in-flight set lock poisoned")
                .remove(&receipt);
            if expired {
                warn!(job.id = %job_id, "Delivery not acknowledged in time, redelivering…");
                if inner.tx.send(job_id).is_err() {
                    warn!(job.id = %job_id, "Queue closed before entry could be redelivered");
                }
            }
        });

        Ok(Some(Delivery { job_id, receipt }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), TransportError> {
        let removed = self
            .inner
            .in_flight
            .lock()
            .expect("in-flight set lock poisoned")
            .remove(&delivery.receipt);
        if removed {
            self.inner.pending.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }
}
