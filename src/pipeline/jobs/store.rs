//! SQLite-backed job persistence.
//!
//! Every status change is written through the state machine before the
//! worker proceeds, one `job_transitions` row per change — a crashed worker
//! leaves an inspectable history, never an invisibly stuck job. Result
//! payloads live in `extraction_results` keyed by document, failures in
//! `extraction_failures`; job rows are never deleted.

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{backoff_delay, next_status, JobEvent};
use super::types::{JobConfig, JobError, JobPriority, JobStatus, NewJob, ProcessingJob};
use crate::db::DatabaseError;
use crate::pipeline::patterns::ExtractionResultSet;

const JOB_COLUMNS: &str = "id, document_id, file_url, file_name, status, priority, \
     retry_attempt, max_retries, scheduled_for, created_at, started_at, completed_at, \
     processing_time_ms, error_message, metadata";

/// Insert a new job in `queued`.
pub fn enqueue(conn: &Connection, new: &NewJob) -> Result<ProcessingJob, JobError> {
    let now = Utc::now().naive_utc();
    let job = ProcessingJob {
        id: Uuid::new_v4(),
        document_id: new.document_id,
        file_url: new.file_url.clone(),
        file_name: new.file_name.clone(),
        status: JobStatus::Queued,
        priority: new.priority,
        retry_attempt: 0,
        max_retries: new.max_retries,
        scheduled_for: new.scheduled_for.unwrap_or(now),
        created_at: now,
        started_at: None,
        completed_at: None,
        processing_time_ms: None,
        error_message: None,
        metadata: new.metadata.clone(),
    };

    conn.execute(
        "INSERT INTO processing_jobs (id, document_id, file_url, file_name, status,
         priority, retry_attempt, max_retries, scheduled_for, created_at, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            job.id.to_string(),
            job.document_id.to_string(),
            job.file_url,
            job.file_name,
            job.status.as_str(),
            job.priority.as_str(),
            job.retry_attempt,
            job.max_retries,
            job.scheduled_for.to_string(),
            job.created_at.to_string(),
            job.metadata.to_string(),
        ],
    )
    .map_err(DatabaseError::from)?;

    tracing::info!(job_id = %job.id, document_id = %job.document_id, "Job enqueued");
    Ok(job)
}

/// Atomically claim the next due job: high priority before normal, FIFO by
/// creation time within a tier, exactly one row per call. The conditional
/// update is the mutual-exclusion point — racing workers cannot double-claim.
pub fn claim_next(
    conn: &Connection,
    now: NaiveDateTime,
) -> Result<Option<ProcessingJob>, JobError> {
    let sql = format!(
        "UPDATE processing_jobs
         SET status = 'processing', started_at = ?2
         WHERE id = (
             SELECT id FROM processing_jobs
             WHERE status = 'queued' AND scheduled_for <= ?1
             ORDER BY CASE priority WHEN 'high' THEN 0 ELSE 1 END, created_at, id
             LIMIT 1
         ) AND status = 'queued'
         RETURNING {JOB_COLUMNS}"
    );

    let result = conn.query_row(
        &sql,
        params![now.to_string(), now.to_string()],
        job_row_mapper,
    );

    match result {
        Ok(row) => {
            let job = job_from_row(row)?;
            record_transition(conn, &job.id, JobStatus::Queued, JobStatus::Processing)?;
            tracing::debug!(job_id = %job.id, "Job claimed");
            Ok(Some(job))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e).into()),
    }
}

/// Move due `retry_scheduled` jobs back to `queued`. Returns the promoted
/// (job, document) ids so the caller can publish notifications.
pub fn promote_due_retries(
    conn: &Connection,
    now: NaiveDateTime,
) -> Result<Vec<(Uuid, Uuid)>, JobError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, document_id FROM processing_jobs
             WHERE status = 'retry_scheduled' AND scheduled_for <= ?1",
        )
        .map_err(DatabaseError::from)?;

    let due: Vec<(String, String)> = stmt
        .query_map(params![now.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(DatabaseError::from)?
        .collect::<Result<_, _>>()
        .map_err(DatabaseError::from)?;

    let mut promoted = Vec::new();
    for (job_id, document_id) in due {
        let changed = conn
            .execute(
                "UPDATE processing_jobs SET status = 'queued'
                 WHERE id = ?1 AND status = 'retry_scheduled'",
                params![job_id],
            )
            .map_err(DatabaseError::from)?;
        if changed == 1 {
            if let (Ok(jid), Ok(did)) = (Uuid::parse_str(&job_id), Uuid::parse_str(&document_id)) {
                record_transition(conn, &jid, JobStatus::RetryScheduled, JobStatus::Queued)?;
                promoted.push((jid, did));
            }
        }
    }

    if !promoted.is_empty() {
        tracing::debug!(count = promoted.len(), "Retry-scheduled jobs requeued");
    }
    Ok(promoted)
}

/// Mark a claimed job completed and persist its result as a sibling record
/// keyed by document, never embedded in the job row.
pub fn mark_completed(
    conn: &Connection,
    job: &ProcessingJob,
    processing_time_ms: u64,
    fields: &ExtractionResultSet,
    overall_confidence: f32,
    ai_invoked: bool,
) -> Result<(), JobError> {
    let Some(next) = next_status(job.status, JobEvent::Complete) else {
        return Err(JobError::IllegalTransition {
            status: job.status.to_string(),
            event: JobEvent::Complete.as_str().to_string(),
        });
    };

    let now = Utc::now().naive_utc();
    conn.execute(
        "UPDATE processing_jobs
         SET status = ?2, completed_at = ?3, processing_time_ms = ?4, error_message = NULL
         WHERE id = ?1",
        params![
            job.id.to_string(),
            next.as_str(),
            now.to_string(),
            processing_time_ms as i64,
        ],
    )
    .map_err(DatabaseError::from)?;

    let fields_json = serde_json::to_string(fields)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
    conn.execute(
        "INSERT OR REPLACE INTO extraction_results
         (document_id, job_id, fields, overall_confidence, ai_invoked, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            job.document_id.to_string(),
            job.id.to_string(),
            fields_json,
            overall_confidence,
            ai_invoked as i32,
            now.to_string(),
        ],
    )
    .map_err(DatabaseError::from)?;

    record_transition(conn, &job.id, job.status, next)?;
    tracing::info!(
        job_id = %job.id,
        document_id = %job.document_id,
        processing_time_ms,
        fields = fields.len(),
        "Job completed"
    );
    Ok(())
}

/// Mark a claimed job failed: schedule a retry with exponential backoff while
/// attempts remain, otherwise terminal failure with a parallel failure
/// record. Returns the resulting status.
pub fn mark_failed(
    conn: &Connection,
    job: &ProcessingJob,
    error: &str,
    config: &JobConfig,
) -> Result<JobStatus, JobError> {
    let retryable = job.retry_attempt < job.max_retries;
    let event = if retryable {
        JobEvent::FailRetryable
    } else {
        JobEvent::FailTerminal
    };
    let Some(next) = next_status(job.status, event) else {
        return Err(JobError::IllegalTransition {
            status: job.status.to_string(),
            event: event.as_str().to_string(),
        });
    };

    let now = Utc::now().naive_utc();

    if retryable {
        let delay = backoff_delay(job.retry_attempt, config);
        let scheduled_for = now
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(60));
        conn.execute(
            "UPDATE processing_jobs
             SET status = ?2, retry_attempt = ?3, scheduled_for = ?4, error_message = ?5
             WHERE id = ?1",
            params![
                job.id.to_string(),
                next.as_str(),
                job.retry_attempt + 1,
                scheduled_for.to_string(),
                error,
            ],
        )
        .map_err(DatabaseError::from)?;

        tracing::warn!(
            job_id = %job.id,
            attempt = job.retry_attempt + 1,
            max_retries = job.max_retries,
            delay_ms = delay.as_millis() as u64,
            error,
            "Job failed, retry scheduled"
        );
    } else {
        conn.execute(
            "UPDATE processing_jobs
             SET status = ?2, completed_at = ?3, error_message = ?4
             WHERE id = ?1",
            params![job.id.to_string(), next.as_str(), now.to_string(), error],
        )
        .map_err(DatabaseError::from)?;

        conn.execute(
            "INSERT OR REPLACE INTO extraction_failures
             (document_id, job_id, error_message, retry_attempts, failed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job.document_id.to_string(),
                job.id.to_string(),
                error,
                job.retry_attempt,
                now.to_string(),
            ],
        )
        .map_err(DatabaseError::from)?;

        tracing::error!(
            job_id = %job.id,
            document_id = %job.document_id,
            attempts = job.retry_attempt,
            error,
            "Job permanently failed"
        );
    }

    record_transition(conn, &job.id, job.status, next)?;
    Ok(next)
}

pub fn get_job(conn: &Connection, id: &Uuid) -> Result<Option<ProcessingJob>, JobError> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM processing_jobs WHERE id = ?1");
    let result = conn.query_row(&sql, params![id.to_string()], job_row_mapper);
    match result {
        Ok(row) => Ok(Some(job_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e).into()),
    }
}

/// Read-only status projection consumed by UI polling: all jobs for a
/// document, newest first. Terminal rows stay queryable forever.
pub fn jobs_for_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<ProcessingJob>, JobError> {
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM processing_jobs
         WHERE document_id = ?1 ORDER BY created_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql).map_err(DatabaseError::from)?;
    let rows = stmt
        .query_map(params![document_id.to_string()], job_row_mapper)
        .map_err(DatabaseError::from)?;

    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(job_from_row(row.map_err(DatabaseError::from)?)?);
    }
    Ok(jobs)
}

/// Append one audit row per transition.
fn record_transition(
    conn: &Connection,
    job_id: &Uuid,
    from: JobStatus,
    to: JobStatus,
) -> Result<(), JobError> {
    conn.execute(
        "INSERT INTO job_transitions (job_id, from_status, to_status, at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            job_id.to_string(),
            from.as_str(),
            to.as_str(),
            Utc::now().naive_utc().to_string(),
        ],
    )
    .map_err(DatabaseError::from)?;
    Ok(())
}

/// Transition history for one job, oldest first.
pub fn list_transitions(
    conn: &Connection,
    job_id: &Uuid,
) -> Result<Vec<(JobStatus, JobStatus)>, JobError> {
    let mut stmt = conn
        .prepare(
            "SELECT from_status, to_status FROM job_transitions
             WHERE job_id = ?1 ORDER BY id ASC",
        )
        .map_err(DatabaseError::from)?;
    let rows = stmt
        .query_map(params![job_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(DatabaseError::from)?;

    let mut transitions = Vec::new();
    for row in rows {
        let (from, to) = row.map_err(DatabaseError::from)?;
        if let (Some(from), Some(to)) = (JobStatus::from_str(&from), JobStatus::from_str(&to)) {
            transitions.push((from, to));
        }
    }
    Ok(transitions)
}

// ═══════════════════════════════════════════
// Stored extraction results
// ═══════════════════════════════════════════

/// A completed extraction as persisted beside the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredExtraction {
    pub document_id: Uuid,
    pub job_id: Option<Uuid>,
    pub fields: ExtractionResultSet,
    pub overall_confidence: f32,
    pub ai_invoked: bool,
    pub completed_at: NaiveDateTime,
}

pub fn get_extraction_result(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Option<StoredExtraction>, JobError> {
    let result = conn.query_row(
        "SELECT document_id, job_id, fields, overall_confidence, ai_invoked, completed_at
         FROM extraction_results WHERE document_id = ?1",
        params![document_id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f32>(3)?,
                row.get::<_, i32>(4)?,
                row.get::<_, String>(5)?,
            ))
        },
    );

    match result {
        Ok((doc_id, job_id, fields_json, overall_confidence, ai_invoked, completed_at)) => {
            let fields: ExtractionResultSet = serde_json::from_str(&fields_json)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
            Ok(Some(StoredExtraction {
                document_id: Uuid::parse_str(&doc_id).unwrap_or_default(),
                job_id: job_id.and_then(|s| Uuid::parse_str(&s).ok()),
                fields,
                overall_confidence,
                ai_invoked: ai_invoked != 0,
                completed_at: parse_ts(&completed_at),
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e).into()),
    }
}

/// Terminal failure record, distinguishable from "still pending" without
/// reading job internals.
pub fn get_failure_record(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Option<(String, u32)>, JobError> {
    let result = conn.query_row(
        "SELECT error_message, retry_attempts FROM extraction_failures WHERE document_id = ?1",
        params![document_id.to_string()],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)),
    );
    match result {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e).into()),
    }
}

// ═══════════════════════════════════════════
// Row mapping
// ═══════════════════════════════════════════

struct JobRow {
    id: String,
    document_id: String,
    file_url: String,
    file_name: Option<String>,
    status: String,
    priority: String,
    retry_attempt: u32,
    max_retries: u32,
    scheduled_for: String,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    processing_time_ms: Option<i64>,
    error_message: Option<String>,
    metadata: String,
}

fn job_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRow> {
    Ok(JobRow {
        id: row.get(0)?,
        document_id: row.get(1)?,
        file_url: row.get(2)?,
        file_name: row.get(3)?,
        status: row.get(4)?,
        priority: row.get(5)?,
        retry_attempt: row.get(6)?,
        max_retries: row.get(7)?,
        scheduled_for: row.get(8)?,
        created_at: row.get(9)?,
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
        processing_time_ms: row.get(12)?,
        error_message: row.get(13)?,
        metadata: row.get(14)?,
    })
}

fn job_from_row(row: JobRow) -> Result<ProcessingJob, JobError> {
    Ok(ProcessingJob {
        id: Uuid::parse_str(&row.id).unwrap_or_default(),
        document_id: Uuid::parse_str(&row.document_id).unwrap_or_default(),
        file_url: row.file_url,
        file_name: row.file_name,
        status: JobStatus::from_str(&row.status).ok_or_else(|| {
            JobError::Database(DatabaseError::InvalidEnum {
                field: "processing_jobs.status".into(),
                value: row.status.clone(),
            })
        })?,
        priority: JobPriority::from_str(&row.priority).ok_or_else(|| {
            JobError::Database(DatabaseError::InvalidEnum {
                field: "processing_jobs.priority".into(),
                value: row.priority.clone(),
            })
        })?,
        retry_attempt: row.retry_attempt,
        max_retries: row.max_retries,
        scheduled_for: parse_ts(&row.scheduled_for),
        created_at: parse_ts(&row.created_at),
        started_at: row.started_at.as_deref().map(parse_ts),
        completed_at: row.completed_at.as_deref().map(parse_ts),
        processing_time_ms: row.processing_time_ms.map(|ms| ms as u64),
        error_message: row.error_message,
        metadata: serde_json::from_str(&row.metadata).unwrap_or(serde_json::Value::Null),
    })
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap_or_default()
}
