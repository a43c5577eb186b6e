//! Run suites against a browser

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;
use colored::Colorize;
use comfy_table::Color;
use tracing::debug;

use proofshot_common::{BrowserKind, ProofshotConfig, RunNaming, Session, SessionConfig};
use proofshot_e2e::runner::{discover, preset_variables};
use proofshot_e2e::{BridgeConfig, KeywordRegistry, PlaywrightBridge, SuiteRunner, TestFilter, TestResult};

use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Suites directory (overrides [suites] dir)
    #[arg(long)]
    pub suites: Option<PathBuf>,

    /// Browser to use (chromium, firefox, webkit); repeat to run several
    /// browsers one after another in the same run
    #[arg(long)]
    pub browser: Vec<BrowserKind>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Base URL of the app under test
    #[arg(long)]
    pub base_url: Option<String>,

    /// Run only tests carrying this tag (repeatable)
    #[arg(long)]
    pub tag: Vec<String>,

    /// Run only the test with this name
    #[arg(long)]
    pub name: Option<String>,

    /// Output root for runs (overrides [output] root)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Name the run `Run_<timestamp>` instead of numbering it
    #[arg(long)]
    pub timestamped: bool,

    /// Do not update the `latest` link
    #[arg(long)]
    pub no_latest: bool,

    /// Directory providing the `playwright` package
    #[arg(long, default_value = "node_modules")]
    pub node_modules: PathBuf,
}

impl RunArgs {
    /// Command-line flags win over the config file
    pub fn apply(&self, config: &mut ProofshotConfig) {
        if let Some(dir) = &self.suites {
            config.suites.dir = dir.clone();
        }
        if !self.browser.is_empty() {
            config.browser.browsers = self.browser.clone();
        }
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(url) = &self.base_url {
            config.app.base_url = url.clone();
        }
        if let Some(root) = &self.output {
            config.output.root = root.clone();
        }
        if self.timestamped {
            config.output.naming = RunNaming::Timestamped;
        }
        if self.no_latest {
            config.output.latest_link = false;
        }
    }
}

impl TableDisplay for TestResult {
    fn headers() -> Vec<&'static str> {
        vec!["#", "Browser", "Suite", "Test", "Status", "Duration", "Screenshots"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            format!("{:02}", self.ordinal),
            self.browser.clone(),
            self.suite.clone(),
            self.name.clone(),
            if self.success() { "passed" } else { "failed" }.to_string(),
            format!("{} ms", self.duration_ms),
            self.screenshots.len().to_string(),
        ]
    }

    fn status(&self) -> Option<(usize, Color)> {
        Some((4, if self.success() { Color::Green } else { Color::Red }))
    }
}

/// Returns whether every selected test passed
pub async fn execute(args: RunArgs, mut config: ProofshotConfig, format: OutputFormat) -> anyhow::Result<bool> {
    args.apply(&mut config);

    let suites = discover(&config.suites.dir, &preset_variables(&config))
        .with_context(|| format!("loading suites from {}", config.suites.dir.display()))?;
    if suites.is_empty() {
        output::print_warning(&format!("No suites found in {}", config.suites.dir.display()));
        return Ok(true);
    }
    debug!("Loaded {} suite(s) from {}", suites.len(), config.suites.dir.display());

    let mut bridge_config = BridgeConfig::from_config(&config);
    bridge_config.node_modules = args.node_modules;

    let runner = SuiteRunner::new(KeywordRegistry::with_builtins()).with_filter(TestFilter {
        tags: args.tag,
        name: args.name,
    });
    let session = Session::new(SessionConfig::from(&config));
    let mut progress = runner.begin(&session, &suites);
    let mut launch_errors = Vec::new();

    for browser in config.browser.targets() {
        let bridge = match PlaywrightBridge::launch(bridge_config.clone().with_browser(browser)).await {
            Ok(bridge) => bridge,
            Err(e) => {
                output::print_error(&format!("Could not start {}: {}", browser, e));
                launch_errors.push(browser);
                continue;
            }
        };
        runner
            .run_browser(&mut progress, browser.as_str(), &bridge, &session, &suites)
            .await;
        if let Err(e) = bridge.close().await {
            output::print_warning(&format!("{} did not shut down cleanly: {}", browser, e));
        }
    }

    let result = progress.finish(session);
    result.write()?;

    output::print_list(&result.results, format);
    if format == OutputFormat::Table {
        println!();
        let summary = format!(
            "{} passed, {} failed, {} skipped ({} ms)",
            result.passed, result.failed, result.skipped, result.duration_ms
        );
        if result.success() {
            println!("{}", summary.green().bold());
        } else {
            println!("{}", summary.red().bold());
        }
        if let Some(run_id) = &result.run_id {
            println!("{} {}", "Run:".bold(), run_id);
        }
        if let Some(report) = &result.report {
            println!("{} {}", "Report:".bold(), report.display());
        }
    }

    if !launch_errors.is_empty() {
        let names: Vec<&str> = launch_errors.iter().map(|b| b.as_str()).collect();
        bail!("browser(s) failed to start: {}", names.join(", "));
    }
    Ok(result.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofshot_common::TestOutcome;

    #[test]
    fn test_flags_override_config() {
        let mut config = ProofshotConfig::default();
        let args = RunArgs {
            browser: vec![BrowserKind::Webkit, BrowserKind::Firefox],
            headed: true,
            base_url: Some("http://127.0.0.1:8080".into()),
            timestamped: true,
            no_latest: true,
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.browser.targets(), vec![BrowserKind::Webkit, BrowserKind::Firefox]);
        assert!(!config.browser.headless);
        assert_eq!(config.app.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.output.naming, RunNaming::Timestamped);
        assert!(!config.output.latest_link);
        assert_eq!(config.suites.dir, PathBuf::from("suites"));
    }

    #[test]
    fn test_result_row() {
        let result = TestResult {
            browser: "firefox".into(),
            suite: "Todo".into(),
            name: "Add Todo".into(),
            ordinal: 2,
            outcome: TestOutcome::Failed("boom".into()),
            duration_ms: 1200,
            screenshots: vec![PathBuf::from("a.png")],
            failure_screenshot: None,
        };
        assert_eq!(
            result.row(),
            vec!["02", "firefox", "Todo", "Add Todo", "failed", "1200 ms", "1"]
        );
        assert_eq!(result.status(), Some((4, Color::Red)));
    }
}
