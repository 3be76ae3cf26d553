//! Shared fixtures for dispatch queue integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use courier_queue::{
    ChannelSink, DeliveryAdapter, DeliveryError, DispatchEvent, Job, JobId, QueueConfig,
    QueueController,
};

/// Adapter driven by the payload.
///
/// Fails while `job.attempt() <= payload["fail_until"]`, sleeps for
/// `payload["sleep_ms"]` on every call, fails permanently when
/// `payload["permanent"]` is true and panics on attempts listed in
/// `payload["panic_on"]`. Records call order and peak concurrency.
#[derive(Debug, Default)]
pub struct ScriptedAdapter {
    pub calls: AtomicU32,
    active: AtomicU32,
    pub max_active: AtomicU32,
    pub order: Mutex<Vec<JobId>>,
}

impl ScriptedAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> u32 {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn order(&self) -> Vec<JobId> {
        self.order.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryAdapter for ScriptedAdapter {
    async fn deliver(&self, job: &Job) -> Result<(), DeliveryError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.order.lock().unwrap().push(job.id());

        let payload = job.payload();
        let sleep_ms = payload["sleep_ms"].as_u64().unwrap_or(0);
        if sleep_ms > 0 {
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let panics = payload["panic_on"]
            .as_array()
            .is_some_and(|attempts| attempts.iter().any(|a| a.as_u64() == Some(job.attempt().into())));
        if panics {
            panic!("scripted panic on attempt {}", job.attempt());
        }

        if payload["permanent"].as_bool() == Some(true) {
            return Err(DeliveryError::permanent("recipient does not exist"));
        }

        let fail_until = payload["fail_until"].as_u64().unwrap_or(0);
        if u64::from(job.attempt()) <= fail_until {
            Err(DeliveryError::transient(format!(
                "mail relay refused attempt {}",
                job.attempt()
            )))
        } else {
            Ok(())
        }
    }
}

pub fn controller_with(
    adapter: Arc<ScriptedAdapter>,
    config: QueueConfig,
) -> (QueueController, UnboundedReceiver<DispatchEvent>) {
    let (sink, rx) = ChannelSink::new();
    let controller = QueueController::builder(adapter)
        .config(config)
        .sink(Arc::new(sink))
        .build()
        .expect("valid config");
    (controller, rx)
}

pub fn drain(rx: &mut UnboundedReceiver<DispatchEvent>) -> Vec<DispatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn fast_config() -> QueueConfig {
    QueueConfig {
        backoff_base_ms: 1000,
        yield_ms: 10,
        ..Default::default()
    }
}
