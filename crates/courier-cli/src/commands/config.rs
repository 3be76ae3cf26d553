//! Config command - Show the effective queue configuration
//!
//! Usage:
//! ```bash
//! courier config
//! COURIER_BACKOFF_BASE_MS=250 courier config --json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::QueueArgs;

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    queue: QueueArgs,

    /// Output raw JSON
    #[arg(long)]
    json: bool,
}

/// Run the config command
pub fn run(args: ConfigArgs) -> Result<()> {
    let config = args.queue.resolve();
    let validation = config.validate();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        validation?;
        return Ok(());
    }

    let or_unset = |v: Option<String>| v.unwrap_or_else(|| "unset".dimmed().to_string());

    println!("{}", "Courier Queue Configuration".bold().cyan());
    println!("{}", "═".repeat(50).cyan());
    println!();
    println!(
        "  {} {}",
        "CLI Version:".dimmed(),
        env!("CARGO_PKG_VERSION").green()
    );
    println!();

    println!("{}", "Retry:".bold());
    println!(
        "  {} {}ms",
        "Backoff base:".dimmed(),
        config.backoff_base_ms
    );
    println!(
        "  {} {}",
        "Backoff cap:".dimmed(),
        or_unset(config.backoff_max_ms.map(|v| format!("{v}ms")))
    );
    println!(
        "  {} {}",
        "Default max attempts:".dimmed(),
        config.default_max_attempts
    );
    println!();

    println!("{}", "Processing loop:".bold());
    println!("  {} {}ms", "Yield pause:".dimmed(), config.yield_ms);
    println!(
        "  {} {}",
        "Attempt timeout:".dimmed(),
        or_unset(config.attempt_timeout_ms.map(|v| format!("{v}ms")))
    );
    println!(
        "  {} {}",
        "Max queue length:".dimmed(),
        or_unset(config.max_queue_length.map(|v| v.to_string()))
    );
    println!();

    match validation {
        Ok(()) => crate::print_success("Configuration is valid"),
        Err(e) => {
            crate::print_error(&e.to_string());
            return Err(e.into());
        }
    }

    Ok(())
}
