//! Suite runner: drives suites through a page and an instrumentation session

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use proofshot_common::{ProofshotConfig, Session, TestContext, TestOutcome};

use crate::error::{E2eError, E2eResult};
use crate::keyword_suite::{KeywordSuite, KeywordTest};
use crate::keywords::KeywordRegistry;
use crate::page::Page;
use crate::suite::{ScriptSuite, ScriptTest};

/// Name of the results file written into the run directory
pub const RESULTS_FILE: &str = "results.json";

/// What a running test can reach: the page, the session, and its own identity
pub struct TestScope<'a> {
    pub page: &'a dyn Page,
    pub session: &'a Session,
    pub test: &'a TestContext,
    screenshots: Vec<PathBuf>,
}

impl<'a> TestScope<'a> {
    pub fn new(page: &'a dyn Page, session: &'a Session, test: &'a TestContext) -> Self {
        Self {
            page,
            session,
            test,
            screenshots: Vec::new(),
        }
    }

    /// Capture the next step screenshot for this test
    pub async fn capture(&mut self, label: &str) -> E2eResult<PathBuf> {
        let path = self.session.capture(self.page.driver(), self.test, label).await?;
        self.screenshots.push(path.clone());
        Ok(path)
    }

    /// Screenshots captured so far, in order
    pub fn screenshots(&self) -> &[PathBuf] {
        &self.screenshots
    }
}

/// A suite file of either kind
#[derive(Debug, Clone)]
pub enum Suite {
    Script(ScriptSuite),
    Keyword(KeywordSuite),
}

impl Suite {
    pub fn name(&self) -> &str {
        match self {
            Suite::Script(s) => &s.name,
            Suite::Keyword(k) => &k.name,
        }
    }

    pub fn source(&self) -> &Path {
        match self {
            Suite::Script(s) => &s.source,
            Suite::Keyword(k) => &k.source,
        }
    }

    /// `(ordinal, name)` of every test, in declaration order
    pub fn ordinals(&self) -> Vec<(u32, &str)> {
        match self {
            Suite::Script(s) => s.ordered_tests().map(|(o, t)| (o, t.name.as_str())).collect(),
            Suite::Keyword(k) => k.ordered_tests().map(|(o, t)| (o, t.name.as_str())).collect(),
        }
    }

    /// Load one suite file, choosing the parser by extension
    pub fn load(path: &Path, variables: &HashMap<String, String>) -> E2eResult<Option<Self>> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Ok(Some(Suite::Script(ScriptSuite::from_file(path)?))),
            "robot" => Ok(Some(Suite::Keyword(KeywordSuite::from_file(path, variables)?))),
            _ => Ok(None),
        }
    }
}

/// Load every suite under `dir`, sorted by path
pub fn discover(dir: &Path, variables: &HashMap<String, String>) -> E2eResult<Vec<Suite>> {
    if !dir.is_dir() {
        return Err(E2eError::SuiteParse {
            path: dir.to_path_buf(),
            reason: "suite directory not found".into(),
        });
    }

    let mut suites = Vec::new();
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if let Some(suite) = Suite::load(entry.path(), variables)? {
            debug!("Loaded suite '{}' from {}", suite.name(), entry.path().display());
            suites.push(suite);
        }
    }
    Ok(suites)
}

/// Variables every keyword suite starts with
pub fn preset_variables(config: &ProofshotConfig) -> HashMap<String, String> {
    HashMap::from([
        ("BASE_URL".to_string(), config.app.base_url.clone()),
        ("BROWSER".to_string(), config.browser.name.to_string()),
        ("HEADLESS".to_string(), config.browser.headless.to_string()),
    ])
}

/// Which tests to run
#[derive(Debug, Clone, Default)]
pub struct TestFilter {
    /// Run tests carrying any of these tags (all tests when empty)
    pub tags: Vec<String>,
    /// Run only the test with this name
    pub name: Option<String>,
}

impl TestFilter {
    pub fn matches(&self, name: &str, tags: &[String]) -> bool {
        let name_ok = self
            .name
            .as_ref()
            .map_or(true, |wanted| wanted.eq_ignore_ascii_case(name));
        let tags_ok = self.tags.is_empty()
            || self
                .tags
                .iter()
                .any(|wanted| tags.iter().any(|t| t.eq_ignore_ascii_case(wanted)));
        name_ok && tags_ok
    }
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub browser: String,
    pub suite: String,
    pub name: String,
    pub ordinal: u32,
    pub outcome: TestOutcome,
    pub duration_ms: u64,
    pub screenshots: Vec<PathBuf>,
    pub failure_screenshot: Option<PathBuf>,
}

impl TestResult {
    pub fn success(&self) -> bool {
        !self.outcome.is_failure()
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// `None` when no test ran
    pub run_id: Option<String>,
    pub run_root: Option<PathBuf>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
    pub report: Option<PathBuf>,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    /// Write the results as JSON into the run directory
    pub fn write(&self) -> E2eResult<Option<PathBuf>> {
        let Some(run_root) = &self.run_root else {
            return Ok(None);
        };
        std::fs::create_dir_all(run_root)?;

        let path = run_root.join(RESULTS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(Some(path))
    }
}

/// Results gathered so far by a run that may span several browsers
#[derive(Debug)]
pub struct RunProgress {
    start: Instant,
    results: Vec<TestResult>,
    skipped: usize,
}

impl RunProgress {
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// End the session, render the report and summarise the run
    pub fn finish(self, session: Session) -> RunResult {
        let RunProgress {
            start,
            results,
            skipped,
        } = self;

        let passed = results.iter().filter(|r| r.success()).count();
        let failed = results.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        let (run_id, run_root) = if results.is_empty() {
            (None, None)
        } else {
            (Some(session.run_identity().to_string()), Some(session.run_root()))
        };

        let report = session.finish();
        if let Some(report) = &report {
            info!("Report: {}", report.display());
        }

        RunResult {
            run_id,
            run_root,
            total: results.len() + skipped,
            passed,
            failed,
            skipped,
            duration_ms,
            results,
            report,
        }
    }
}

enum TestBody<'s> {
    Script(&'s ScriptTest),
    Keyword(&'s KeywordSuite, &'s KeywordTest),
}

/// Runs suites against one page, one test at a time
#[derive(Debug, Clone)]
pub struct SuiteRunner {
    registry: KeywordRegistry,
    filter: TestFilter,
}

impl SuiteRunner {
    pub fn new(registry: KeywordRegistry) -> Self {
        Self {
            registry,
            filter: TestFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: TestFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn registry(&self) -> &KeywordRegistry {
        &self.registry
    }

    /// Run every selected test in the session's browser, then end the
    /// session and render the report
    pub async fn run(&self, page: &dyn Page, session: Session, suites: &[Suite]) -> RunResult {
        let mut progress = self.begin(&session, suites);
        let browser = session.browser_label().to_string();
        self.run_browser(&mut progress, &browser, page, &session, suites).await;
        progress.finish(session)
    }

    /// Register ordinals for every suite before anything runs
    pub fn begin(&self, session: &Session, suites: &[Suite]) -> RunProgress {
        let mut seen = HashSet::new();
        for suite in suites {
            for (ordinal, name) in suite.ordinals() {
                if !seen.insert(name.to_lowercase()) {
                    warn!(
                        "Test name '{}' appears in more than one suite; it keeps its first position",
                        name
                    );
                }
                session.register_ordinal(name, ordinal);
            }
        }

        RunProgress {
            start: Instant::now(),
            results: Vec::new(),
            skipped: 0,
        }
    }

    /// One pass over every selected test in `browser`. Call once per
    /// browser, sharing the session so all passes land in the same run.
    pub async fn run_browser(
        &self,
        progress: &mut RunProgress,
        browser: &str,
        page: &dyn Page,
        session: &Session,
        suites: &[Suite],
    ) {
        info!("Browser: {}", browser);
        for suite in suites {
            info!("Suite: {} ({})", suite.name(), suite.source().display());
            match suite {
                Suite::Script(script) => {
                    for test in &script.tests {
                        let tags = merged_tags(&script.tags, &test.tags);
                        if !self.filter.matches(&test.name, &tags) {
                            progress.skipped += 1;
                            continue;
                        }
                        let result = self
                            .execute(page, session, browser, suite, &test.name, TestBody::Script(test))
                            .await;
                        progress.results.push(result);
                    }
                }
                Suite::Keyword(keyword) => {
                    for test in &keyword.tests {
                        let tags = merged_tags(&keyword.tags, &test.tags);
                        if !self.filter.matches(&test.name, &tags) {
                            progress.skipped += 1;
                            continue;
                        }
                        let result = self
                            .execute(
                                page,
                                session,
                                browser,
                                suite,
                                &test.name,
                                TestBody::Keyword(keyword, test),
                            )
                            .await;
                        progress.results.push(result);
                    }
                }
            }
        }
    }

    async fn execute(
        &self,
        page: &dyn Page,
        session: &Session,
        browser: &str,
        suite: &Suite,
        name: &str,
        body: TestBody<'_>,
    ) -> TestResult {
        let start = Instant::now();
        let ctx = session.begin_test_in(browser, name, Some(suite.source()));
        let mut scope = TestScope::new(page, session, &ctx);

        info!("Test {:02}: {}", ctx.ordinal, name);
        let result = match body {
            TestBody::Script(test) => run_script_test(&mut scope, test).await,
            TestBody::Keyword(suite, test) => self.run_keyword_test(&mut scope, suite, test).await,
        };
        let screenshots = scope.screenshots().to_vec();

        let outcome = match result {
            Ok(()) => TestOutcome::Passed,
            Err(e) => TestOutcome::Failed(e.to_string()),
        };
        let failure_screenshot = session.end_test(page.driver(), &ctx, &outcome).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            TestOutcome::Passed => info!("✓ {} ({} ms)", name, duration_ms),
            TestOutcome::Failed(reason) => error!("✗ {} - {}", name, reason),
        }

        TestResult {
            browser: ctx.browser_label.clone(),
            suite: suite.name().to_string(),
            name: name.to_string(),
            ordinal: ctx.ordinal,
            outcome,
            duration_ms,
            screenshots,
            failure_screenshot,
        }
    }

    /// Setup, body, then teardown. Teardown always runs; its failure fails
    /// the test only if nothing failed before it.
    async fn run_keyword_test(
        &self,
        scope: &mut TestScope<'_>,
        suite: &KeywordSuite,
        test: &KeywordTest,
    ) -> E2eResult<()> {
        let mut variables = suite.variables.clone();
        variables.insert("TEST NAME".to_string(), test.name.clone());
        variables.insert("BROWSER".to_string(), scope.test.browser_label.clone());
        variables.insert("SUITE NAME".to_string(), suite.name.clone());

        let mut result = Ok(());
        let setup = suite.setup_for(test).into_iter();
        for call in setup.chain(test.body.iter()) {
            if let Err(e) = self.registry.call(scope, call, &mut variables).await {
                result = Err(E2eError::StepFailed {
                    step: format!("{} (line {})", call.keyword, call.line),
                    reason: e.to_string(),
                });
                break;
            }
        }

        if let Some(teardown) = suite.teardown_for(test) {
            if let Err(e) = self.registry.call(scope, teardown, &mut variables).await {
                warn!("Teardown of '{}' failed: {}", test.name, e);
                if result.is_ok() {
                    result = Err(E2eError::StepFailed {
                        step: format!("{} (teardown)", teardown.keyword),
                        reason: e.to_string(),
                    });
                }
            }
        }

        result
    }
}

async fn run_script_test(scope: &mut TestScope<'_>, test: &ScriptTest) -> E2eResult<()> {
    for step in &test.steps {
        debug!("  {}", step.describe());
        step.run(scope).await.map_err(|e| E2eError::StepFailed {
            step: step.describe(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

fn merged_tags(suite: &[String], test: &[String]) -> Vec<String> {
    suite.iter().chain(test.iter()).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filter() {
        let tags = vec!["smoke".to_string(), "todos".to_string()];
        assert!(TestFilter::default().matches("anything", &[]));

        let by_tag = TestFilter {
            tags: vec!["SMOKE".into()],
            name: None,
        };
        assert!(by_tag.matches("add", &tags));
        assert!(!by_tag.matches("add", &[]));

        let by_name = TestFilter {
            tags: vec![],
            name: Some("Add Todo".into()),
        };
        assert!(by_name.matches("add todo", &[]));
        assert!(!by_name.matches("delete todo", &[]));
    }

    #[test]
    fn test_discover_mixed_suites() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("b_todo.robot"),
            "*** Test Cases ***\nFirst\n    Log    ${BASE_URL}\n",
        )
        .unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        std::fs::write(
            tmp.path().join("nested/a.yaml"),
            "name: nested\ntests:\n  - name: one\n    steps: []\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("README.md"), "not a suite").unwrap();

        let suites = discover(tmp.path(), &preset_variables(&ProofshotConfig::default())).unwrap();
        let names: Vec<_> = suites.iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["B Todo", "nested"]);
        assert_eq!(suites[0].ordinals(), vec![(1, "First")]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let err = discover(&tmp.path().join("nope"), &HashMap::new()).unwrap_err();
        assert!(matches!(err, E2eError::SuiteParse { .. }));
    }

    #[test]
    fn test_run_result_without_tests_writes_nothing() {
        let result = RunResult {
            run_id: None,
            run_root: None,
            total: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            duration_ms: 0,
            results: vec![],
            report: None,
        };
        assert!(result.success());
        assert_eq!(result.write().unwrap(), None);
    }
}
