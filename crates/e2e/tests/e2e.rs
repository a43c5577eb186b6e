//! Browser suite harness entry point
//!
//! Runs the YAML and keyword suites under `--suites` against a real browser.
//! Run with: cargo test --package proofshot-e2e --test e2e -- --suites ../../suites

use clap::Parser;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use proofshot_common::{BrowserKind, ProofshotConfig, Session, SessionConfig};
use proofshot_e2e::runner::{discover, preset_variables};
use proofshot_e2e::{BridgeConfig, E2eResult, KeywordRegistry, PlaywrightBridge, SuiteRunner, TestFilter};

#[derive(Parser, Debug)]
#[command(name = "proofshot-e2e")]
#[command(about = "Browser suite harness for Proofshot")]
struct Args {
    /// Path to the suites directory
    #[arg(short, long, default_value = "suites")]
    suites: PathBuf,

    /// Run only tests carrying this tag
    #[arg(short, long)]
    tag: Vec<String>,

    /// Run only a specific test by name
    #[arg(short, long)]
    name: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    browser: BrowserKind,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Output directory for runs
    #[arg(short, long, default_value = "test-output")]
    output: PathBuf,

    /// Base URL of the app under test
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if !args.suites.is_dir() {
        warn!("No suites at {}, nothing to run", args.suites.display());
        return;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let mut config = ProofshotConfig::default();
    config.apply_env();
    config.output.root = args.output;
    config.browser.name = args.browser;
    config.browser.headless = !args.headed;
    if let Some(base_url) = args.base_url {
        config.app.base_url = base_url;
    }

    let suites = discover(&args.suites, &preset_variables(&config))?;
    let bridge = PlaywrightBridge::launch(BridgeConfig::from_config(&config)).await?;

    let runner = SuiteRunner::new(KeywordRegistry::with_builtins()).with_filter(TestFilter {
        tags: args.tag,
        name: args.name,
    });
    let result = runner
        .run(&bridge, Session::new(SessionConfig::from(&config)), &suites)
        .await;

    bridge.close().await?;
    result.write()?;

    Ok(result.success())
}
