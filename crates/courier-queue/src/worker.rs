//! The single processing loop that drains the dispatch queue

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::backend::{DeliveryAdapter, DeliveryError};
use crate::backoff::{millis, BackoffPolicy};
use crate::events::{emit_contained, DispatchEvent, EventSink};
use crate::job::Job;
use crate::queue::DispatchQueue;

/// Running totals, readable without taking the queue lock
#[derive(Debug, Default)]
pub(crate) struct DispatchStats {
    pub(crate) enqueued: AtomicU64,
    pub(crate) delivered: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) retried: AtomicU64,
}

/// Shared core behind every controller handle.
pub(crate) struct Dispatcher {
    pub(crate) state: Mutex<DispatchQueue>,
    pub(crate) stats: DispatchStats,
    /// Woken whenever the loop goes idle
    pub(crate) idle: Notify,
    adapter: Arc<dyn DeliveryAdapter>,
    pub(crate) sink: Arc<dyn EventSink>,
    backoff: BackoffPolicy,
    yield_pause: Duration,
    attempt_timeout: Option<Duration>,
}

impl Dispatcher {
    pub(crate) fn new(
        adapter: Arc<dyn DeliveryAdapter>,
        sink: Arc<dyn EventSink>,
        backoff: BackoffPolicy,
        yield_pause: Duration,
        attempt_timeout: Option<Duration>,
    ) -> Self {
        Self {
            state: Mutex::new(DispatchQueue::new()),
            stats: DispatchStats::default(),
            idle: Notify::new(),
            adapter,
            sink,
            backoff,
            yield_pause,
            attempt_timeout,
        }
    }

    /// Spawn the processing loop unless one is already running.
    ///
    /// Must be called with the state lock held, right after a push.
    pub(crate) fn ensure_running(self: &Arc<Self>, state: &mut DispatchQueue) {
        if state.try_start() {
            debug!(queue_length = state.len(), "Starting processing loop");
            tokio::spawn(Arc::clone(self).run());
        }
    }

    async fn run(self: Arc<Self>) {
        loop {
            let job = {
                let mut state = self.state.lock().await;
                match state.pop_for_attempt() {
                    Some(job) => job,
                    None => {
                        state.try_stop();
                        drop(state);
                        debug!("Dispatch queue drained, processing loop idle");
                        self.idle.notify_waiters();
                        return;
                    }
                }
            };

            self.process(job).await;

            if self.yield_pause.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.yield_pause).await;
            }
        }
    }

    async fn process(self: &Arc<Self>, mut job: Job) {
        debug!(
            job_id = %job.id(),
            attempt = job.attempt(),
            max_attempts = job.max_attempts(),
            "Attempting delivery"
        );

        let result = self.attempt(&job).await;
        self.state.lock().await.finish_attempt();

        match result {
            Ok(()) => {
                job.mark_delivered();
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                self.emit(&DispatchEvent::Delivered {
                    job_id: job.id(),
                    attempt: job.attempt(),
                });
            }
            Err(e) if e.is_retryable() && job.has_attempts_left() => {
                let delay = self.backoff.delay(job.attempt());
                let event = DispatchEvent::RetryScheduled {
                    job_id: job.id(),
                    attempt: job.attempt(),
                    error: e.to_string(),
                    delay_ms: millis(delay),
                };
                job.mark_awaiting_retry(e.to_string());
                self.stats.retried.fetch_add(1, Ordering::Relaxed);
                self.schedule_retry(job, delay).await;
                self.emit(&event);
            }
            Err(e) => {
                job.mark_failed(e.to_string());
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                self.emit(&DispatchEvent::FailedPermanently {
                    job_id: job.id(),
                    attempt: job.attempt(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: &DispatchEvent) {
        emit_contained(self.sink.as_ref(), event);
    }

    /// One adapter call. Timeouts and panics come back as errors so nothing
    /// unwinds out of the loop.
    async fn attempt(&self, job: &Job) -> Result<(), DeliveryError> {
        let delivery = AssertUnwindSafe(self.adapter.deliver(job)).catch_unwind();

        let outcome = match self.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, delivery).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(DeliveryError::Timeout(limit)),
            },
            None => delivery.await,
        };

        outcome.unwrap_or_else(|panic| Err(DeliveryError::Adapter(panic_message(&*panic))))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("adapter panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("adapter panicked: {msg}")
    } else {
        "adapter panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "adapter panicked: boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("kaput"));
        assert_eq!(panic_message(&*boxed), "adapter panicked: kaput");

        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*boxed), "adapter panicked");
    }
}
