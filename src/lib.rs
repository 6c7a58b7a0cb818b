#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod errors;
mod job;
mod memory;
mod producer;
mod retry;
mod runner;
mod status;
pub mod storage;
mod store;
mod summarizer;
mod transport;
mod util;
mod worker;

pub use self::errors::{EnqueueError, StoreError, SummarizeError, TransportError};
pub use self::job::{Job, JobId, JobStatus, OwnerId, ParseJobStatusError};
pub use self::memory::MemoryStore;
pub use self::producer::Producer;
pub use self::retry::{RetryDecision, RetryPolicy};
pub use self::runner::{RunHandle, Runner};
pub use self::status::{StatusReport, job_status, jobs_for_owner};
pub use self::storage::PgStore;
pub use self::store::{JobFilter, JobStore};
pub use self::summarizer::Summarizer;
pub use self::transport::{ChannelTransport, Delivery, QueueTransport};
