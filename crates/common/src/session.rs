//! Instrumentation session
//!
//! A [`Session`] owns all state that lives for one test run: the run
//! identity, the ordinal cache and the step counters. The execution host
//! creates it before the first test, drives it through the test lifecycle
//! hooks, and consumes it with [`Session::finish`], which renders the report.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactWriter, TestContext};
use crate::config::ProofshotConfig;
use crate::driver::PageDriver;
use crate::ordinal::OrdinalResolver;
use crate::report;
use crate::run_id::{RunIdentity, RunNaming};
use crate::steps::StepRecorder;
use crate::Result;

/// Settings a session needs from its host
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Parent directory shared by all runs
    pub output_root: PathBuf,
    pub naming: RunNaming,
    /// Browser directory name used by [`Session::begin_test`]
    pub browser_label: String,
    pub latest_link: bool,
}

impl From<&ProofshotConfig> for SessionConfig {
    fn from(config: &ProofshotConfig) -> Self {
        Self {
            output_root: config.output.root.clone(),
            naming: config.output.naming,
            browser_label: config
                .browser
                .targets()
                .first()
                .copied()
                .unwrap_or(config.browser.name)
                .as_str()
                .to_string(),
            latest_link: config.output.latest_link,
        }
    }
}

/// How a test ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed(String),
}

impl TestOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TestOutcome::Failed(_))
    }
}

/// State of one instrumented test run
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    identity: OnceCell<RunIdentity>,
    ordinals: OrdinalResolver,
    steps: StepRecorder,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            identity: OnceCell::new(),
            ordinals: OrdinalResolver::new(),
            steps: StepRecorder::new(),
        }
    }

    /// Identity of this run, allocated on first use
    pub fn run_identity(&self) -> &RunIdentity {
        self.identity.get_or_init(|| {
            let identity = RunIdentity::allocate(&self.config.output_root, self.config.naming);
            info!("Test run {}", identity);
            identity
        })
    }

    /// Directory holding this run's artifacts (not created until first capture)
    pub fn run_root(&self) -> PathBuf {
        self.config.output_root.join(self.run_identity().to_string())
    }

    pub fn browser_label(&self) -> &str {
        &self.config.browser_label
    }

    pub fn steps(&self) -> &StepRecorder {
        &self.steps
    }

    pub fn ordinals(&self) -> &OrdinalResolver {
        &self.ordinals
    }

    fn writer(&self) -> ArtifactWriter {
        ArtifactWriter::new(self.run_root())
    }

    /// Declare a test's position ahead of time
    pub fn register_ordinal(&self, test_name: &str, ordinal: u32) {
        self.ordinals.register(test_name, ordinal);
    }

    /// Before-test hook: bind a context for `test_name` in the session's
    /// configured browser
    pub fn begin_test(&self, test_name: &str, suite_source: Option<&Path>) -> TestContext {
        self.begin_test_in(&self.config.browser_label, test_name, suite_source)
    }

    /// Before-test hook for a host that runs the same tests in several
    /// browsers under one run. Each browser gets its own directory and step
    /// numbering; the ordinal is shared.
    pub fn begin_test_in(&self, browser: &str, test_name: &str, suite_source: Option<&Path>) -> TestContext {
        // Allocating here pins the run identity to the session start
        self.run_identity();

        let ordinal = self.ordinals.resolve(test_name, suite_source);
        debug!("Test '{}' has ordinal {} ({})", test_name, ordinal, browser);

        TestContext {
            name: test_name.to_string(),
            ordinal,
            browser_label: browser.to_string(),
        }
    }

    /// Capture the next step screenshot for a test
    pub async fn capture(&self, driver: &dyn PageDriver, ctx: &TestContext, label: &str) -> Result<PathBuf> {
        self.writer().capture(driver, &self.steps, ctx, label).await
    }

    /// After-test hook. A failed test gets one extra screenshot in the
    /// failures folder when the page can still be reached. Problems here are
    /// logged and never change the test's outcome.
    pub async fn end_test(
        &self,
        driver: &dyn PageDriver,
        ctx: &TestContext,
        outcome: &TestOutcome,
    ) -> Option<PathBuf> {
        let TestOutcome::Failed(reason) = outcome else {
            return None;
        };
        debug!("Test '{}' failed: {}", ctx.name, reason);

        if !driver.is_alive().await {
            warn!("Browser unreachable, no failure screenshot for '{}'", ctx.name);
            return None;
        }

        match self.writer().capture_failure(driver, &ctx.name).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failure screenshot for '{}' not captured: {}", ctx.name, e);
                None
            }
        }
    }

    /// Session-end hook: render the report for this run.
    ///
    /// Returns the report path, or `None` when nothing was captured or the
    /// report could not be written.
    pub fn finish(self) -> Option<PathBuf> {
        let Some(identity) = self.identity.get() else {
            info!("Session ended before any test started, no report");
            return None;
        };
        let run_root = self.config.output_root.join(identity.to_string());

        match report::generate(&run_root) {
            Ok(Some(path)) => {
                if self.config.latest_link {
                    if let Err(e) = report::link_latest(&run_root) {
                        warn!("Could not update latest link: {}", e);
                    }
                }
                Some(path)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Report generation failed for {}: {}", run_root.display(), e);
                None
            }
        }
    }
}
