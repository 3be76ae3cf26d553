//! Deferred reinsertion of failed jobs
//!
//! Each retry gets its own timer task. The processing loop never sleeps on a
//! backoff, so one slow recipient cannot hold up the rest of the queue.
//! Reinsertion order follows timer expiry, so a retried job has no ordering
//! guarantee relative to jobs enqueued while it was waiting.
//! A timer that outlives every controller handle reports its job as failed
//! through the sink it captured when it was armed.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

use crate::backoff::millis;
use crate::events::{emit_contained, DispatchEvent, EventSink};
use crate::job::Job;
use crate::worker::Dispatcher;

impl Dispatcher {
    /// Arm a timer that puts `job` back at the queue tail after `delay`.
    pub(crate) async fn schedule_retry(self: &Arc<Self>, job: Job, delay: Duration) {
        self.state.lock().await.retry_armed();

        debug!(
            job_id = %job.id(),
            attempt = job.attempt(),
            delay_ms = millis(delay),
            "Retry armed"
        );

        let dispatcher = Arc::downgrade(self);
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            reinsert(dispatcher, sink, job).await;
        });
    }
}

async fn reinsert(dispatcher: Weak<Dispatcher>, sink: Arc<dyn EventSink>, mut job: Job) {
    let Some(dispatcher) = dispatcher.upgrade() else {
        warn!(
            job_id = %job.id(),
            attempt = job.attempt(),
            "Controller dropped before retry fired, discarding job"
        );
        let error = "controller dropped before retry".to_string();
        job.mark_failed(error.clone());
        emit_contained(
            sink.as_ref(),
            &DispatchEvent::FailedPermanently {
                job_id: job.id(),
                attempt: job.attempt(),
                error,
            },
        );
        return;
    };

    let mut state = dispatcher.state.lock().await;
    job.requeue();
    state.retry_fired();
    debug!(job_id = %job.id(), queue_length = state.len() + 1, "Retry due, requeued");
    state.push(job);
    dispatcher.ensure_running(&mut state);
}
