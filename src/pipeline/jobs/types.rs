//! Core types for the background extraction job manager.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Illegal transition: {status} does not accept {event}")]
    IllegalTransition { status: String, event: String },

    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Document fetch failed: {0}")]
    Fetch(String),
}

// ═══════════════════════════════════════════
// Status and priority
// ═══════════════════════════════════════════

/// Job lifecycle states. `Completed` and `Failed` are terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    RetryScheduled,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::RetryScheduled => "retry_scheduled",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "retry_scheduled" => Some(Self::RetryScheduled),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Normal,
    High,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Claim order: lower rank first.
    pub fn rank(&self) -> i64 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
        }
    }
}

// ═══════════════════════════════════════════
// Job record
// ═══════════════════════════════════════════

/// A persisted unit of asynchronous extraction work. Owned exclusively by
/// the job manager; mutated only through the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub document_id: Uuid,
    pub file_url: String,
    pub file_name: Option<String>,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub retry_attempt: u32,
    pub max_retries: u32,
    pub scheduled_for: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub processing_time_ms: Option<u64>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
}

/// Parameters for enqueueing a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub document_id: Uuid,
    pub file_url: String,
    pub file_name: Option<String>,
    pub priority: JobPriority,
    /// `None` means "now".
    pub scheduled_for: Option<NaiveDateTime>,
    pub max_retries: u32,
    pub metadata: serde_json::Value,
}

impl NewJob {
    pub fn for_document(document_id: Uuid, file_url: &str) -> Self {
        Self {
            document_id,
            file_url: file_url.to_string(),
            file_name: None,
            priority: JobPriority::Normal,
            scheduled_for: None,
            max_retries: JobConfig::default().max_retries,
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_file_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }
}

// ═══════════════════════════════════════════
// Tunables
// ═══════════════════════════════════════════

/// Worker tunables. Defaults, not invariants.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub max_retries: u32,
    /// Base retry delay, doubled per attempt.
    pub base_retry_delay_secs: u64,
    /// Backoff ceiling.
    pub max_retry_delay_secs: u64,
    /// Documents above this size incur the throttle pause before extraction.
    pub large_document_bytes: u64,
    pub large_document_pause_ms: u64,
    /// Idle sleep between polls of the queue.
    pub poll_interval_ms: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_secs: 2,
            max_retry_delay_secs: 60,
            large_document_bytes: 2 * 1024 * 1024,
            large_document_pause_ms: 1500,
            poll_interval_ms: 2000,
        }
    }
}
