//! The external summarization computation.

use crate::errors::SummarizeError;
use async_trait::async_trait;

/// The opaque `text → text` computation the workers drive.
///
/// Implementations wrap whatever actually produces the summary: a local
/// model, a remote inference API, an extractive heuristic. The call may take
/// substantial wall-clock time; workers await it without any internal
/// timeout, relying on the transport's visibility timeout for liveness.
///
/// Load the underlying resource once at worker-process startup and share
/// the handle (`Arc<dyn Summarizer>`) across worker loops; it is reused for
/// every job and dropped on shutdown.
///
/// Errors classify the failure for the retry policy: [`Transient`] and
/// [`Timeout`] are retried, [`Permanent`] fails the job immediately. A
/// panicking implementation is caught by the worker and treated as
/// transient. Because delivery is at-least-once, `summarize` may run more
/// than once for the same job and must tolerate that.
///
/// [`Transient`]: SummarizeError::Transient
/// [`Timeout`]: SummarizeError::Timeout
/// [`Permanent`]: SummarizeError::Permanent
#[async_trait]
pub trait Summarizer: Send + Sync + 'static {
    /// Produce a summary of `text`.
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError>;
}
