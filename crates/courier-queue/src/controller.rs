//! Public façade over the dispatch queue
//!
//! A [`QueueController`] is built once at startup and cloned into whatever
//! needs to send notifications. Clones share one queue and one processing
//! loop.

use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::{DeliveryAdapter, QueueError};
use crate::backoff::BackoffPolicy;
use crate::config::{ConfigError, QueueConfig};
use crate::events::{EventSink, TracingSink};
use crate::job::{Job, JobId, JobSummary};
use crate::worker::Dispatcher;

/// Point-in-time view of the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub running: bool,
    pub queued: Vec<JobSummary>,
    pub in_flight: Option<JobSummary>,
    pub awaiting_retry: usize,
    pub enqueued_total: u64,
    pub delivered_total: u64,
    pub failed_total: u64,
    pub retries_total: u64,
}

#[derive(Clone)]
pub struct QueueController {
    inner: Arc<Dispatcher>,
    config: Arc<QueueConfig>,
}

pub struct ControllerBuilder {
    adapter: Arc<dyn DeliveryAdapter>,
    config: QueueConfig,
    sink: Option<Arc<dyn EventSink>>,
    backoff: Option<BackoffPolicy>,
}

impl ControllerBuilder {
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Overrides the exponential policy derived from the config.
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn build(self) -> Result<QueueController, ConfigError> {
        self.config.validate()?;

        let backoff = self
            .backoff
            .unwrap_or_else(|| self.config.backoff_policy());
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));

        info!(
            backoff = ?backoff,
            default_max_attempts = self.config.default_max_attempts,
            max_queue_length = ?self.config.max_queue_length,
            "Dispatch queue ready"
        );

        let inner = Dispatcher::new(
            self.adapter,
            sink,
            backoff,
            self.config.yield_pause(),
            self.config.attempt_timeout(),
        );

        Ok(QueueController {
            inner: Arc::new(inner),
            config: Arc::new(self.config),
        })
    }
}

impl QueueController {
    pub fn new<A: DeliveryAdapter + 'static>(
        adapter: A,
        config: QueueConfig,
    ) -> Result<Self, ConfigError> {
        Self::builder(Arc::new(adapter)).config(config).build()
    }

    /// Start building a controller around an existing adapter handle
    pub fn builder(adapter: Arc<dyn DeliveryAdapter>) -> ControllerBuilder {
        ControllerBuilder {
            adapter,
            config: QueueConfig::default(),
            sink: None,
            backoff: None,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Queue a notification for delivery and return immediately.
    ///
    /// Starts the processing loop if it is idle. A `max_attempts` of zero
    /// is clamped to one.
    pub async fn enqueue(
        &self,
        payload: serde_json::Value,
        max_attempts: u32,
    ) -> Result<JobId, QueueError> {
        let job = Job::new(payload, max_attempts);
        let id = job.id();

        let mut state = self.inner.state.lock().await;
        if let Some(capacity) = self.config.max_queue_length {
            if state.len() >= capacity {
                return Err(QueueError::Full { capacity });
            }
        }

        state.push(job);
        self.inner.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        debug!(
            job_id = %id,
            max_attempts = max_attempts.max(1),
            queue_length = state.len(),
            "Job enqueued"
        );
        self.inner.ensure_running(&mut state);

        Ok(id)
    }

    /// Enqueue with the configured default attempt budget
    pub async fn enqueue_default(&self, payload: serde_json::Value) -> Result<JobId, QueueError> {
        self.enqueue(payload, self.config.default_max_attempts).await
    }

    pub async fn status(&self) -> QueueStatus {
        let state = self.inner.state.lock().await;
        let stats = &self.inner.stats;

        QueueStatus {
            queue_length: state.len(),
            running: state.is_running(),
            queued: state.summaries(),
            in_flight: state.in_flight().cloned(),
            awaiting_retry: state.awaiting_retry(),
            enqueued_total: stats.enqueued.load(Ordering::Relaxed),
            delivered_total: stats.delivered.load(Ordering::Relaxed),
            failed_total: stats.failed.load(Ordering::Relaxed),
            retries_total: stats.retried.load(Ordering::Relaxed),
        }
    }

    /// Drop every job still waiting in the queue and return how many.
    ///
    /// The attempt in flight runs to completion and armed retry timers still
    /// requeue their jobs when they fire.
    pub async fn clear(&self) -> usize {
        let removed = self.inner.state.lock().await.clear();
        if removed > 0 {
            info!(removed, "Dispatch queue cleared");
        }
        removed
    }

    /// Wait until nothing is queued, in flight or awaiting a retry.
    pub async fn settled(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.state.lock().await.is_settled() {
                return;
            }
            notified.await;
        }
    }
}
