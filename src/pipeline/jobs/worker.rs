//! Supervised extraction worker.
//!
//! Claims at most one job per invocation, runs the hybrid pipeline on it and
//! persists the outcome through the state machine. The polling loop is the
//! only long-lived task; shutdown flows through a cancellation token and a
//! job interrupted mid-flight is recorded as a retryable failure, never left
//! silently in `processing`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;

use super::fetch::DocumentFetcher;
use super::notify::JobNotifier;
use super::store;
use super::types::{JobConfig, JobError, JobStatus, ProcessingJob};
use crate::pipeline::hybrid::{DocumentMetadata, HybridError, HybridExtractor, HybridOptions};
use crate::pipeline::language::detect_language;

pub struct JobWorker {
    extractor: Arc<HybridExtractor>,
    fetcher: Arc<dyn DocumentFetcher>,
    notifier: JobNotifier,
    config: JobConfig,
}

impl JobWorker {
    pub fn new(
        extractor: Arc<HybridExtractor>,
        fetcher: Arc<dyn DocumentFetcher>,
        notifier: JobNotifier,
        config: JobConfig,
    ) -> Self {
        Self {
            extractor,
            fetcher,
            notifier,
            config,
        }
    }

    /// Poll-and-process loop. Owns its connection; runs until cancelled.
    pub async fn run_loop(&self, conn: Connection, cancel: CancellationToken) {
        tracing::info!(poll_interval_ms = self.config.poll_interval_ms, "Job worker started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.process_next(&conn, &cancel).await {
                Ok(Some(status)) => {
                    tracing::debug!(status = %status, "Job processed, checking for more work");
                    continue;
                }
                Ok(None) => {
                    // Queue empty — idle until the next poll or shutdown
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Worker iteration failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
                    }
                }
            }
        }

        tracing::info!("Job worker shutting down");
    }

    /// Claim and process at most one due job. Returns the job's resulting
    /// status, or `None` when the queue is empty.
    pub async fn process_next(
        &self,
        conn: &Connection,
        cancel: &CancellationToken,
    ) -> Result<Option<JobStatus>, JobError> {
        let now = Utc::now().naive_utc();

        for (job_id, document_id) in store::promote_due_retries(conn, now)? {
            self.notifier.publish(job_id, document_id, JobStatus::Queued, None);
        }

        let Some(job) = store::claim_next(conn, now)? else {
            return Ok(None);
        };
        self.notifier
            .publish(job.id, job.document_id, JobStatus::Processing, None);

        let start = Instant::now();
        match self.run_extraction(&job, cancel).await {
            Ok(outcome) => {
                store::mark_completed(
                    conn,
                    &job,
                    start.elapsed().as_millis() as u64,
                    &outcome.fields,
                    outcome.overall_confidence(),
                    outcome.ai_invoked,
                )?;
                self.notifier
                    .publish(job.id, job.document_id, JobStatus::Completed, None);
                Ok(Some(JobStatus::Completed))
            }
            Err(reason) => {
                let status = store::mark_failed(conn, &job, &reason, &self.config)?;
                self.notifier
                    .publish(job.id, job.document_id, status, Some(&reason));
                Ok(Some(status))
            }
        }
    }

    async fn run_extraction(
        &self,
        job: &ProcessingJob,
        cancel: &CancellationToken,
    ) -> Result<crate::pipeline::hybrid::HybridOutcome, String> {
        // Large-document guard: crude backpressure ahead of the expensive
        // extraction call, policy rather than necessity.
        let size = match self.fetcher.probe_size(&job.file_url).await {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Size probe failed, skipping throttle");
                0
            }
        };
        if size > self.config.large_document_bytes {
            tracing::info!(
                job_id = %job.id,
                size,
                pause_ms = self.config.large_document_pause_ms,
                "Large document, throttling before extraction"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err("cancelled by shutdown".to_string()),
                _ = tokio::time::sleep(Duration::from_millis(self.config.large_document_pause_ms)) => {}
            }
        }

        let text = self
            .fetcher
            .fetch_text(&job.file_url)
            .await
            .map_err(|e| format!("document fetch failed: {e}"))?;

        let language = detect_language(&text);
        let options = HybridOptions::for_language(language);
        let metadata = DocumentMetadata {
            document_id: job.document_id,
            file_name: job.file_name.clone(),
            language: Some(language),
        };

        match self
            .extractor
            .process(&text, &metadata, &options, cancel)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(HybridError::Cancelled) => Err("cancelled by shutdown".to_string()),
        }
    }
}
