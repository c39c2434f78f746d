//! The job state machine as an explicit transition table.
//!
//! Every status change anywhere in the job manager goes through
//! `next_status`; guards are data, not scattered conditionals, so the whole
//! lifecycle is testable without a database or a worker.
//!
//! ```text
//! queued ──Claim──▶ processing ──Complete──▶ completed (terminal)
//!    ▲                  │ ├─FailRetryable──▶ retry_scheduled ──Requeue──▶ queued
//!    └──────────────────┘ └─FailTerminal───▶ failed (terminal)
//! ```

use std::time::Duration;

use rand::Rng;

use super::types::{JobConfig, JobStatus};

/// Events that drive the job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// A worker claimed the job.
    Claim,
    /// Extraction finished and the result was persisted.
    Complete,
    /// Attempt failed with retries remaining.
    FailRetryable,
    /// Attempt failed with retries exhausted (or a non-retryable error).
    FailTerminal,
    /// A scheduled retry became due and re-entered the queue.
    Requeue,
}

impl JobEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Complete => "complete",
            Self::FailRetryable => "fail_retryable",
            Self::FailTerminal => "fail_terminal",
            Self::Requeue => "requeue",
        }
    }
}

/// The full transition table. Terminal states appear in no row.
const TRANSITIONS: &[(JobStatus, JobEvent, JobStatus)] = &[
    (JobStatus::Queued, JobEvent::Claim, JobStatus::Processing),
    (JobStatus::Processing, JobEvent::Complete, JobStatus::Completed),
    (JobStatus::Processing, JobEvent::FailRetryable, JobStatus::RetryScheduled),
    (JobStatus::Processing, JobEvent::FailTerminal, JobStatus::Failed),
    (JobStatus::RetryScheduled, JobEvent::Requeue, JobStatus::Queued),
];

/// Look up the successor state, `None` when the event is not legal from the
/// current state.
pub fn next_status(current: JobStatus, event: JobEvent) -> Option<JobStatus> {
    TRANSITIONS
        .iter()
        .find(|(from, ev, _)| *from == current && *ev == event)
        .map(|(_, _, to)| *to)
}

/// Exponential backoff with jitter: base doubles per attempt, capped, then
/// ±10% so racing workers do not retry in lockstep.
pub fn backoff_delay(retry_attempt: u32, config: &JobConfig) -> Duration {
    let exp = retry_attempt.min(16);
    let raw_secs = config
        .base_retry_delay_secs
        .saturating_mul(1u64 << exp)
        .min(config.max_retry_delay_secs);

    let raw_ms = raw_secs * 1000;
    let jitter_range = raw_ms / 10;
    let jitter: i64 = if jitter_range > 0 {
        rand::thread_rng().gen_range(-(jitter_range as i64)..=jitter_range as i64)
    } else {
        0
    };

    Duration::from_millis((raw_ms as i64 + jitter).max(0) as u64)
}
