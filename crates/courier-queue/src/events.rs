//! Dispatch events and the sinks that receive them
//!
//! The processing loop reports every outcome as a [`DispatchEvent`]. Where
//! those events end up (log lines, a metrics pipeline, a dead-letter
//! consumer) is decided by the [`EventSink`] handed to the controller.

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::job::JobId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    Delivered {
        job_id: JobId,
        attempt: u32,
    },
    RetryScheduled {
        job_id: JobId,
        attempt: u32,
        error: String,
        delay_ms: u64,
    },
    FailedPermanently {
        job_id: JobId,
        attempt: u32,
        error: String,
    },
}

impl DispatchEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Delivered { job_id, .. }
            | Self::RetryScheduled { job_id, .. }
            | Self::FailedPermanently { job_id, .. } => *job_id,
        }
    }

    pub fn attempt(&self) -> u32 {
        match self {
            Self::Delivered { attempt, .. }
            | Self::RetryScheduled { attempt, .. }
            | Self::FailedPermanently { attempt, .. } => *attempt,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::RetryScheduled { .. })
    }
}

/// Receiver of dispatch events. Called from the processing loop, so
/// implementations must not block.
///
/// Every job gets exactly one terminal event. That includes a job whose retry
/// fires after the last controller handle was dropped: it is reported as
/// `FailedPermanently` instead of being requeued. A panicking sink loses the
/// event but never stops the loop.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DispatchEvent);
}

/// Hand `event` to `sink`, logging and swallowing a panic.
pub(crate) fn emit_contained(sink: &dyn EventSink, event: &DispatchEvent) {
    if catch_unwind(AssertUnwindSafe(|| sink.emit(event))).is_err() {
        tracing::warn!(
            job_id = %event.job_id(),
            attempt = event.attempt(),
            "Event sink panicked, event dropped"
        );
    }
}

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &DispatchEvent) {
        match event {
            DispatchEvent::Delivered { job_id, attempt } => {
                tracing::info!(job_id = %job_id, attempt, "Notification delivered");
            }
            DispatchEvent::RetryScheduled {
                job_id,
                attempt,
                error,
                delay_ms,
            } => {
                tracing::warn!(
                    job_id = %job_id,
                    attempt,
                    delay_ms,
                    error = %error,
                    "Delivery failed, retry scheduled"
                );
            }
            DispatchEvent::FailedPermanently {
                job_id,
                attempt,
                error,
            } => {
                tracing::error!(
                    job_id = %job_id,
                    attempt,
                    error = %error,
                    "Delivery failed permanently"
                );
            }
        }
    }
}

/// Forwards events into an unbounded channel, e.g. for a dead-letter consumer
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DispatchEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DispatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &DispatchEvent) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(event.clone());
    }
}

/// Broadcasts each event to several sinks in order
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &DispatchEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
