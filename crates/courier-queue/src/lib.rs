//! # Courier Queue
//!
//! In-process dispatch queue for outbound notifications.
//!
//! Features:
//! - Non-blocking `enqueue`; delivery happens on a background task
//! - Exactly one processing loop per controller, so the delivery backend
//!   never sees more than one concurrent attempt
//! - Failed attempts retried with exponential backoff on independent timers
//! - Structured dispatch events through a pluggable `EventSink`
//!
//! The queue lives in memory only. Jobs do not survive a restart.

pub mod backend;
pub mod backoff;
pub mod config;
pub mod controller;
pub mod events;
pub mod job;
mod queue;
mod scheduler;
mod worker;

pub use backend::{DeliveryAdapter, DeliveryError, FnAdapter, QueueError};
pub use backoff::BackoffPolicy;
pub use config::{ConfigError, QueueConfig};
pub use controller::{ControllerBuilder, QueueController, QueueStatus};
pub use events::{ChannelSink, DispatchEvent, EventSink, FanoutSink, TracingSink};
pub use job::{Job, JobId, JobStatus, JobSummary};
