use crate::retry::RetryPolicy;
use crate::store::JobStore;
use crate::summarizer::Summarizer;
use crate::transport::QueueTransport;
use crate::worker::Worker;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_JITTER: Duration = Duration::from_millis(100);
const DEFAULT_QUEUE_NAME: &str = "summaries";

/// The core runner responsible for spawning and supervising worker loops.
///
/// The summarizer handle is created once, up front, and shared by every
/// worker for the lifetime of the process.
pub struct Runner<S, T> {
    store: Arc<S>,
    transport: Arc<T>,
    summarizer: Arc<dyn Summarizer>,
    queue_name: String,
    num_workers: usize,
    retry_policy: RetryPolicy,
    poll_interval: Duration,
    jitter: Duration,
    shutdown_when_queue_empty: bool,
}

impl<S, T> std::fmt::Debug for Runner<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("queue_name", &self.queue_name)
            .field("num_workers", &self.num_workers)
            .field("retry_policy", &self.retry_policy)
            .field("shutdown_when_queue_empty", &self.shutdown_when_queue_empty)
            .finish()
    }
}

impl<S: JobStore, T: QueueTransport> Runner<S, T> {
    /// Create a runner over the given store, transport and summarizer,
    /// with one worker and the default retry policy.
    pub fn new(store: Arc<S>, transport: Arc<T>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            store,
            transport,
            summarizer,
            queue_name: DEFAULT_QUEUE_NAME.into(),
            num_workers: 1,
            retry_policy: RetryPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            jitter: DEFAULT_JITTER,
            shutdown_when_queue_empty: false,
        }
    }

    /// Set the queue name used in worker names and log spans.
    ///
    /// Observability only: the name is never handed to the
    /// [`QueueTransport`](crate::QueueTransport), which is already bound to
    /// its queue when constructed. Run one engine per queue.
    pub fn queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    /// Set the number of parallel worker loops.
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set the retry policy consulted after each failed attempt.
    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Set how long each worker waits on the transport per receive call.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the maximum random jitter added to error-backoff sleeps.
    ///
    /// Jitter helps reduce thundering herd effects when multiple workers
    /// hit a failing dependency simultaneously. The actual jitter applied
    /// will be a random value between 0 and the specified duration.
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Shut the workers down once the queue has drained. Meant for tests
    /// and one-shot drain runs.
    pub fn shutdown_when_queue_empty(mut self) -> Self {
        self.shutdown_when_queue_empty = true;
        self
    }

    /// Start the background workers.
    ///
    /// This returns a [`RunHandle`] which can be used to wait for the
    /// workers to shut down.
    pub fn start(&self) -> RunHandle {
        let mut handles = Vec::new();
        for i in 1..=self.num_workers {
            let name = format!("summary-worker-{}-{i}", self.queue_name);
            info!(worker.name = %name, "Starting worker…");

            let worker = Worker {
                store: self.store.clone(),
                transport: self.transport.clone(),
                summarizer: self.summarizer.clone(),
                retry_policy: self.retry_policy,
                poll_interval: self.poll_interval,
                jitter: self.jitter,
                shutdown_when_queue_empty: self.shutdown_when_queue_empty,
            };

            let span = info_span!("worker", worker.name = %name);
            let handle = tokio::spawn(async move { worker.run().instrument(span).await });

            handles.push(handle);
        }

        RunHandle { handles }
    }
}

/// Handle to a running set of workers.
#[derive(Debug)]
pub struct RunHandle {
    handles: Vec<JoinHandle<()>>,
}

impl RunHandle {
    /// Wait for all background workers to shut down.
    pub async fn wait_for_shutdown(self) {
        join_all(self.handles).await.into_iter().for_each(|result| {
            if let Err(error) = result {
                warn!(%error, "Background worker task panicked");
            }
        });
    }
}
