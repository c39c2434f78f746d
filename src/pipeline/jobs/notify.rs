//! Job status change notification.
//!
//! A broadcast channel pushes status updates to observers (UI subscriptions)
//! so they do not have to poll; the `jobs_for_document` projection remains
//! available as a polling fallback. Publishing never blocks and never fails
//! the worker — a lagging or absent subscriber is the subscriber's problem.

use chrono::{NaiveDateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::types::JobStatus;

/// One status change, published after the transition is persisted.
#[derive(Debug, Clone)]
pub struct JobStatusUpdate {
    pub job_id: Uuid,
    pub document_id: Uuid,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub at: NaiveDateTime,
}

#[derive(Clone)]
pub struct JobNotifier {
    tx: broadcast::Sender<JobStatusUpdate>,
}

impl JobNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobStatusUpdate> {
        self.tx.subscribe()
    }

    pub fn publish(&self, job_id: Uuid, document_id: Uuid, status: JobStatus, error: Option<&str>) {
        let update = JobStatusUpdate {
            job_id,
            document_id,
            status,
            error_message: error.map(String::from),
            at: Utc::now().naive_utc(),
        };
        if self.tx.send(update).is_err() {
            tracing::trace!(job_id = %job_id, "No job status subscribers");
        }
    }
}

impl Default for JobNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_updates_in_order() {
        let notifier = JobNotifier::default();
        let mut rx = notifier.subscribe();

        let job_id = Uuid::new_v4();
        let doc_id = Uuid::new_v4();
        notifier.publish(job_id, doc_id, JobStatus::Processing, None);
        notifier.publish(job_id, doc_id, JobStatus::Completed, None);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.status, JobStatus::Processing);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.status, JobStatus::Completed);
        assert_eq!(second.job_id, job_id);
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let notifier = JobNotifier::default();
        notifier.publish(Uuid::new_v4(), Uuid::new_v4(), JobStatus::Failed, Some("boom"));
    }

    #[tokio::test]
    async fn error_message_carried_on_failure() {
        let notifier = JobNotifier::default();
        let mut rx = notifier.subscribe();
        notifier.publish(Uuid::new_v4(), Uuid::new_v4(), JobStatus::Failed, Some("timeout"));
        let update = rx.recv().await.unwrap();
        assert_eq!(update.error_message.as_deref(), Some("timeout"));
    }
}
