//! Asynchronous extraction job manager.
//!
//! A persisted job record per document moves through an explicit state
//! machine (`state`), stored and claimed atomically in SQLite (`store`),
//! processed by a supervised worker (`worker`) that fetches the document
//! (`fetch`), runs the hybrid pipeline and publishes every transition
//! (`notify`).

pub mod fetch;
pub mod notify;
pub mod state;
pub mod store;
pub mod types;
pub mod worker;

pub use fetch::{DocumentFetcher, FetchError, HttpDocumentFetcher, MockDocumentFetcher};
pub use notify::{JobNotifier, JobStatusUpdate};
pub use state::{backoff_delay, next_status, JobEvent};
pub use store::{
    claim_next, enqueue, get_extraction_result, get_failure_record, get_job, jobs_for_document,
    list_transitions, mark_completed, mark_failed, promote_due_retries, StoredExtraction,
};
pub use types::{JobConfig, JobError, JobPriority, JobStatus, NewJob, ProcessingJob};
pub use worker::JobWorker;
