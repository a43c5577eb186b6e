//! Proofshot CLI - Main Entry Point
//!
//! Runs UI test suites against a real browser and manages the screenshot
//! runs they leave behind.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use proofshot_cli::commands::{init, report, run, runs};
use proofshot_cli::output;
use proofshot_common::{ProofshotConfig, DEFAULT_CONFIG_FILE};

/// Proofshot - screenshot evidence for browser UI tests
#[derive(Parser)]
#[command(name = "proofshot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, short, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run test suites and record screenshots
    Run(run::RunArgs),

    /// Regenerate the HTML report for a run
    Report(report::ReportArgs),

    /// List recorded runs
    Runs(runs::RunsArgs),

    /// Write a starter config and example suite
    Init(init::InitArgs),

    /// Show version information
    Version,
}

async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Run(args) => {
            let config = ProofshotConfig::load(&cli.config)?;
            return run::execute(args, config, cli.format).await;
        }
        Commands::Report(args) => report::execute(args, cli.format).await?,
        Commands::Runs(args) => {
            let config = ProofshotConfig::load(&cli.config)?;
            runs::execute(args, config, cli.format).await?
        }
        Commands::Init(args) => init::execute(args, &cli.config).await?,
        Commands::Version => {
            println!("Proofshot CLI v{}", proofshot_common::VERSION);
            println!("Browser automation via Playwright (node)");
        }
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}
