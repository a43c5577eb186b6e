//! Regenerate the HTML report for an existing run

use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use colored::Colorize;

use proofshot_common::report::{self, ReportSummary};

use crate::output::{self, OutputFormat};

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Run directory, e.g. test-output/2025-01-15_14-30-00_Run_003
    pub run_root: PathBuf,

    /// Also point the `latest` link at this run
    #[arg(long)]
    pub latest: bool,
}

pub async fn execute(args: ReportArgs, format: OutputFormat) -> anyhow::Result<()> {
    if !args.run_root.is_dir() {
        bail!("run directory not found: {}", args.run_root.display());
    }

    let Some(path) = report::generate(&args.run_root)? else {
        bail!("nothing to report in {}", args.run_root.display());
    };
    if args.latest {
        report::link_latest(&args.run_root)?;
    }

    let summary = ReportSummary::scan(&args.run_root)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&summary)?),
        _ => {
            output::print_success(&format!("Report written to {}", path.display()));
            println!(
                "   {} tests, {} screenshots, {}",
                summary.total_tests,
                summary.total_screenshots,
                if summary.failures.is_empty() {
                    "no failures".green()
                } else {
                    format!("{} failure(s)", summary.failures.len()).red()
                }
            );
        }
    }
    Ok(())
}
