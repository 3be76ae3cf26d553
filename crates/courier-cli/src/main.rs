//! Courier CLI - operator tooling for the notification dispatch queue
//!
//! # Usage
//!
//! ```bash
//! # Push 50 notifications through a flaky simulated mail relay
//! courier simulate --jobs 50 --fail-rate 0.4
//!
//! # Same run, machine-readable summary
//! courier simulate --jobs 50 --json
//!
//! # Show the effective queue configuration
//! courier config
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::{config, simulate};

/// Courier - outbound notification dispatch
///
/// Drives the in-process dispatch queue against a simulated delivery
/// backend so retry and backoff settings can be tried out before rollout.
#[derive(Parser)]
#[command(
    name = "courier",
    version,
    about = "Courier CLI - notification dispatch queue tooling",
    long_about = "Courier queues outbound notifications in memory and delivers them\n\
                  one at a time, retrying failures with exponential backoff."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated dispatch session
    #[command(name = "simulate")]
    Simulate(simulate::SimulateArgs),

    /// Show the effective queue configuration
    #[command(name = "config")]
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Simulate(args) => simulate::run(args).await,
        Commands::Config(args) => config::run(args),
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Print a success message with a checkmark
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message with an X
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}
