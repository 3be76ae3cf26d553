//! Simulate command - Run notifications through a flaky simulated backend
//!
//! Usage:
//! ```bash
//! courier simulate --jobs 50 --fail-rate 0.4
//! courier simulate --jobs 200 --backoff-base-ms 50 --yield-ms 0 --json
//! ```

use anyhow::{ensure, Result};
use async_trait::async_trait;
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use courier_queue::{
    ChannelSink, DeliveryAdapter, DeliveryError, DispatchEvent, FanoutSink, Job, QueueController,
    QueueError, QueueStatus, TracingSink,
};

use super::QueueArgs;

/// Arguments for the simulate command
#[derive(Args)]
pub struct SimulateArgs {
    /// Number of notifications to enqueue
    #[arg(long, short = 'n', default_value_t = 20)]
    jobs: usize,

    /// Probability that a single attempt fails transiently
    #[arg(long, default_value_t = 0.3)]
    fail_rate: f64,

    /// Probability that a single attempt fails permanently
    #[arg(long, default_value_t = 0.0)]
    permanent_rate: f64,

    /// Simulated latency of each delivery attempt in milliseconds
    #[arg(long, default_value_t = 20)]
    latency_ms: u64,

    /// Attempt budget per notification (defaults to the configured value)
    #[arg(long)]
    max_attempts: Option<u32>,

    #[command(flatten)]
    queue: QueueArgs,

    /// Output a JSON summary instead of a table
    #[arg(long)]
    json: bool,
}

/// Mail relay stand-in that fails at random
struct FlakyRelay {
    fail_rate: f64,
    permanent_rate: f64,
    latency: Duration,
}

#[async_trait]
impl DeliveryAdapter for FlakyRelay {
    async fn deliver(&self, job: &Job) -> Result<(), DeliveryError> {
        tokio::time::sleep(self.latency).await;

        let roll: f64 = rand::random();
        if roll < self.permanent_rate {
            Err(DeliveryError::permanent(format!(
                "mailbox {} does not exist",
                job.payload()["to"]
            )))
        } else if roll < self.permanent_rate + self.fail_rate {
            Err(DeliveryError::transient("451 temporary local problem"))
        } else {
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct SimulationReport {
    requested: usize,
    rejected: usize,
    elapsed_ms: u128,
    status: QueueStatus,
}

/// Run the simulate command
pub async fn run(args: SimulateArgs) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&args.fail_rate) && (0.0..=1.0).contains(&args.permanent_rate),
        "rates must be between 0 and 1"
    );
    ensure!(
        args.fail_rate + args.permanent_rate <= 1.0,
        "fail-rate and permanent-rate together cannot exceed 1"
    );

    let config = args.queue.resolve();
    let max_attempts = args.max_attempts.unwrap_or(config.default_max_attempts);

    let relay = FlakyRelay {
        fail_rate: args.fail_rate,
        permanent_rate: args.permanent_rate,
        latency: Duration::from_millis(args.latency_ms),
    };

    let (events, mut rx) = ChannelSink::new();
    let sink = FanoutSink::new()
        .with(Arc::new(TracingSink))
        .with(Arc::new(events));
    let controller = QueueController::builder(Arc::new(relay))
        .config(config)
        .sink(Arc::new(sink))
        .build()?;

    let quiet = args.json;
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !quiet {
                print_event(&event);
            }
        }
    });

    if !args.json {
        println!(
            "{} Dispatching {} notifications (max {} attempts each)...",
            "⚙".blue(),
            args.jobs.to_string().green(),
            max_attempts
        );
        println!();
    }

    tracing::info!(
        jobs = args.jobs,
        max_attempts,
        fail_rate = args.fail_rate,
        "Starting simulated dispatch"
    );

    let started = Instant::now();
    let mut rejected = 0;
    for n in 0..args.jobs {
        let payload = serde_json::json!({
            "to": format!("student{n}@campus.example"),
            "template": "new_follower",
        });
        match controller.enqueue(payload, max_attempts).await {
            Ok(_) => {}
            Err(QueueError::Full { capacity }) => {
                rejected += 1;
                if !args.json {
                    crate::print_warning(&format!(
                        "notification {n} rejected, queue full at {capacity}"
                    ));
                }
            }
        }
    }

    controller.settled().await;
    let report = SimulationReport {
        requested: args.jobs,
        rejected,
        elapsed_ms: started.elapsed().as_millis(),
        status: controller.status().await,
    };

    // Closing the sink lets the printer drain and exit.
    drop(controller);
    let _ = printer.await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

fn print_event(event: &DispatchEvent) {
    let id = event.job_id().to_string();
    let short = &id[..8];
    match event {
        DispatchEvent::Delivered { attempt, .. } => {
            println!("  {} {} delivered (attempt {})", "✓".green(), short, attempt);
        }
        DispatchEvent::RetryScheduled {
            attempt,
            delay_ms,
            error,
            ..
        } => {
            println!(
                "  {} {} attempt {} failed: {} (retry in {}ms)",
                "↻".yellow(),
                short,
                attempt,
                error.dimmed(),
                delay_ms
            );
        }
        DispatchEvent::FailedPermanently { attempt, error, .. } => {
            println!(
                "  {} {} gave up after {} attempts: {}",
                "✗".red(),
                short,
                attempt,
                error
            );
        }
    }
}

fn print_summary(report: &SimulationReport) {
    let status = &report.status;

    println!();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Metric").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec![
        Cell::new("Requested"),
        Cell::new(report.requested),
    ]);
    table.add_row(vec![
        Cell::new("Enqueued"),
        Cell::new(status.enqueued_total),
    ]);
    table.add_row(vec![
        Cell::new("Delivered"),
        Cell::new(status.delivered_total).fg(Color::Green),
    ]);
    table.add_row(vec![
        Cell::new("Failed permanently"),
        Cell::new(status.failed_total).fg(Color::Red),
    ]);
    table.add_row(vec![
        Cell::new("Retries scheduled"),
        Cell::new(status.retries_total).fg(Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("Rejected (queue full)"),
        Cell::new(report.rejected),
    ]);
    table.add_row(vec![
        Cell::new("Elapsed"),
        Cell::new(format!("{}ms", report.elapsed_ms)),
    ]);

    println!("{table}");

    if status.failed_total == 0 && report.rejected == 0 {
        crate::print_success("All notifications delivered");
    }
}
