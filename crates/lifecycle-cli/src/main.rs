//! Driver lifecycle CLI: bring the embedded client driver up, hold it,
//! and drain it.
//!
//! This is the main entry point for the drv-lifecycle harness tool.

mod config;
mod harness;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "drv-lifecycle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one initialize/hold/shutdown cycle
    Run {
        /// Path to the harness configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Override how long to hold the driver before draining (ms)
        #[arg(long)]
        hold_ms: Option<u64>,
    },

    /// Load and validate a configuration file
    Check {
        /// Path to the harness configuration file
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Run { config, hold_ms } => {
            run_harness(&config, hold_ms, cli.format)?;
        }
        Commands::Check { config } => {
            check_config(&config)?;
        }
    }

    Ok(())
}

fn run_harness(config_path: &PathBuf, hold_ms: Option<u64>, format: OutputFormat) -> Result<()> {
    tracing::info!("Loading configuration from {:?}", config_path);

    let mut config = config::load_config(config_path)?;
    if let Some(hold_ms) = hold_ms {
        config.run.hold_ms = hold_ms;
    }

    let harness = harness::Harness::new(config)?;
    let report = harness.run()?;

    output::print_report(&report, format)?;

    if !report.drained {
        anyhow::bail!("Driver did not drain within the configured retries");
    }

    Ok(())
}

fn check_config(config_path: &PathBuf) -> Result<()> {
    let config = config::load_config(config_path)?;

    println!("Configuration OK: {}", config.name);
    println!(
        "  call_shutdown_at_exit: {}",
        config.driver.call_shutdown_at_exit
    );
    println!("  shutdown_grace_ms:     {}", config.driver.shutdown_grace_ms);
    println!("  driver params:         {}", config.driver.params.len());
    println!("  hold_ms:               {}", config.run.hold_ms);
    println!("  max_shutdown_retries:  {}", config.run.max_shutdown_retries);

    Ok(())
}
