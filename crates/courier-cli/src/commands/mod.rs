//! CLI subcommands

pub mod config;
pub mod simulate;

use clap::Args;
use courier_queue::QueueConfig;

/// Queue settings shared by every command. Flags win over `COURIER_*`
/// environment variables, which win over built-in defaults.
#[derive(Args, Debug)]
pub struct QueueArgs {
    /// Base retry delay in milliseconds
    #[arg(long, value_name = "MS")]
    backoff_base_ms: Option<u64>,

    /// Cap on a single retry delay in milliseconds
    #[arg(long, value_name = "MS")]
    backoff_max_ms: Option<u64>,

    /// Pause between processing loop iterations in milliseconds
    #[arg(long, value_name = "MS")]
    yield_ms: Option<u64>,

    /// Per-attempt delivery timeout in milliseconds
    #[arg(long, value_name = "MS")]
    attempt_timeout_ms: Option<u64>,

    /// Reject enqueues once this many jobs are waiting
    #[arg(long, value_name = "N")]
    max_queue_length: Option<usize>,
}

impl QueueArgs {
    pub fn resolve(&self) -> QueueConfig {
        let mut config = QueueConfig::from_env();
        if let Some(v) = self.backoff_base_ms {
            config.backoff_base_ms = v;
        }
        if self.backoff_max_ms.is_some() {
            config.backoff_max_ms = self.backoff_max_ms;
        }
        if let Some(v) = self.yield_ms {
            config.yield_ms = v;
        }
        if self.attempt_timeout_ms.is_some() {
            config.attempt_timeout_ms = self.attempt_timeout_ms;
        }
        if self.max_queue_length.is_some() {
            config.max_queue_length = self.max_queue_length;
        }
        config
    }
}
