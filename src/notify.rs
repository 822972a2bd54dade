use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Work the engine hands to the notification pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    BookingCreated,
    BookingCancelled,
    DepositReceived,
    BookingCompleted,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::BookingCreated => "booking_created",
            JobKind::BookingCancelled => "booking_cancelled",
            JobKind::DepositReceived => "deposit_received",
            JobKind::BookingCompleted => "booking_completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub kind: JobKind,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("job queue rejected {kind}: {reason}")]
pub struct JobError {
    pub kind: &'static str,
    pub reason: String,
}

/// Fire-and-forget queue. Callers do not wait for delivery.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, kind: JobKind, payload: serde_json::Value) -> Result<(), JobError>;
}

/// In-process queue: one broadcast channel per job kind.
pub struct JobHub {
    channels: DashMap<JobKind, broadcast::Sender<Job>>,
}

impl Default for JobHub {
    fn default() -> Self {
        Self::new()
    }
}

impl JobHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a job kind. Creates the channel if needed.
    pub fn subscribe(&self, kind: JobKind) -> broadcast::Receiver<Job> {
        let sender = self
            .channels
            .entry(kind)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }
}

#[async_trait]
impl JobQueue for JobHub {
    /// No-op if nobody is listening.
    async fn enqueue(&self, kind: JobKind, payload: serde_json::Value) -> Result<(), JobError> {
        if let Some(sender) = self.channels.get(&kind) {
            let _ = sender.send(Job { kind, payload });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = JobHub::new();
        let mut rx = hub.subscribe(JobKind::BookingCreated);

        hub.enqueue(JobKind::BookingCreated, serde_json::json!({ "booking_id": 7 }))
            .await
            .unwrap();

        let job = rx.recv().await.unwrap();
        assert_eq!(job.kind, JobKind::BookingCreated);
        assert_eq!(job.payload["booking_id"], 7);
    }

    #[tokio::test]
    async fn kinds_are_isolated() {
        let hub = JobHub::new();
        let mut cancelled = hub.subscribe(JobKind::BookingCancelled);
        hub.enqueue(JobKind::BookingCreated, serde_json::json!({}))
            .await
            .unwrap();
        assert!(cancelled.try_recv().is_err());
    }

    #[tokio::test]
    async fn enqueue_without_subscribers_is_noop() {
        let hub = JobHub::new();
        hub.enqueue(JobKind::DepositReceived, serde_json::json!({}))
            .await
            .unwrap();
    }
}
