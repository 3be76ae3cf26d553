//! Job definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job Identifier
pub type JobId = Uuid;

/// Job Status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the dispatch queue
    Queued,
    /// Currently being handed to the delivery adapter
    InFlight,
    /// Failed an attempt, waiting for its backoff timer
    AwaitingRetry,
    /// Delivered successfully
    Delivered,
    /// Permanently failed after its last attempt
    Failed,
}

impl JobStatus {
    /// `Delivered` and `Failed` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

/// One outbound notification and its retry bookkeeping.
///
/// The payload, id and enqueue time are fixed at construction; only the
/// attempt counter, status and last error move as the job is processed.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    payload: serde_json::Value,
    attempt: u32,
    max_attempts: u32,
    status: JobStatus,
    enqueued_at: DateTime<Utc>,
    last_error: Option<String>,
}

impl Job {
    /// Create a queued job. A `max_attempts` of zero is clamped to one.
    pub fn new(payload: serde_json::Value, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            attempt: 0,
            max_attempts: max_attempts.max(1),
            status: JobStatus::Queued,
            enqueued_at: Utc::now(),
            last_error: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Number of delivery attempts started so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether a failure on the current attempt leaves budget for another.
    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// `Queued -> InFlight`, bumping the attempt counter.
    pub(crate) fn begin_attempt(&mut self) {
        debug_assert_eq!(self.status, JobStatus::Queued);
        self.attempt += 1;
        self.status = JobStatus::InFlight;
    }

    pub(crate) fn mark_delivered(&mut self) {
        self.status = JobStatus::Delivered;
        self.last_error = None;
    }

    pub(crate) fn mark_awaiting_retry(&mut self, error: String) {
        self.status = JobStatus::AwaitingRetry;
        self.last_error = Some(error);
    }

    pub(crate) fn mark_failed(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.last_error = Some(error);
    }

    /// `AwaitingRetry -> Queued`, done by the scheduler when the timer fires.
    pub(crate) fn requeue(&mut self) {
        debug_assert_eq!(self.status, JobStatus::AwaitingRetry);
        self.status = JobStatus::Queued;
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            status: self.status,
            attempt: self.attempt,
            max_attempts: self.max_attempts,
            enqueued_at: self.enqueued_at,
            last_error: self.last_error.clone(),
        }
    }
}

/// Payload-free view of a job, used in status snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub status: JobStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub last_error: Option<String>,
}
