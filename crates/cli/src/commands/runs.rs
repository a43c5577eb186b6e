//! List runs under the output root

use std::path::{Path, PathBuf};

use clap::Args;
use comfy_table::Color;
use serde::Serialize;

use proofshot_common::report::{ReportSummary, REPORT_FILE};
use proofshot_common::run_id::list_runs;
use proofshot_common::ProofshotConfig;

use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct RunsArgs {
    /// Output root to scan (overrides [output] root)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Show only the most recent N runs
    #[arg(long)]
    pub last: Option<usize>,
}

/// One row of the runs table
#[derive(Debug, Clone, Serialize)]
pub struct RunEntry {
    pub run_id: String,
    pub started: String,
    pub tests: usize,
    pub screenshots: usize,
    pub failures: usize,
    pub report: Option<PathBuf>,
}

impl TableDisplay for RunEntry {
    fn headers() -> Vec<&'static str> {
        vec!["Run", "Started", "Tests", "Screenshots", "Failures", "Report"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.run_id.clone(),
            self.started.clone(),
            self.tests.to_string(),
            self.screenshots.to_string(),
            self.failures.to_string(),
            self.report
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]
    }

    fn status(&self) -> Option<(usize, Color)> {
        Some((4, if self.failures == 0 { Color::Green } else { Color::Red }))
    }
}

/// Runs under `root`, oldest first
pub fn collect(root: &Path) -> anyhow::Result<Vec<RunEntry>> {
    let mut entries = Vec::new();
    for identity in list_runs(root) {
        let run_id = identity.to_string();
        let run_root = root.join(&run_id);
        let summary = ReportSummary::scan(&run_root)?;
        let report = run_root.join(REPORT_FILE);

        entries.push(RunEntry {
            started: identity
                .started_at()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| identity.timestamp.clone()),
            run_id,
            tests: summary.total_tests,
            screenshots: summary.total_screenshots,
            failures: summary.failures.len(),
            report: report.is_file().then_some(report),
        });
    }
    Ok(entries)
}

pub async fn execute(args: RunsArgs, config: ProofshotConfig, format: OutputFormat) -> anyhow::Result<()> {
    let root = args.output.unwrap_or(config.output.root);
    let mut entries = collect(&root)?;

    if let Some(last) = args.last {
        let skip = entries.len().saturating_sub(last);
        entries.drain(..skip);
    }

    if entries.is_empty() && format == OutputFormat::Table {
        output::print_info(&format!("No runs in {}", root.display()));
        return Ok(());
    }
    output::print_list(&entries, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_runs() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("2025-01-15_14-30-00_Run_001");
        let second = tmp.path().join("2025-01-15_15-00-00_Run_002");

        std::fs::create_dir_all(first.join("chromium/01_login")).unwrap();
        std::fs::write(first.join("chromium/01_login/01_page_loaded.png"), b"png").unwrap();
        std::fs::create_dir_all(second.join("failures")).unwrap();
        std::fs::create_dir_all(second.join("01_login")).unwrap();
        std::fs::write(second.join("01_login/01_page_loaded.png"), b"png").unwrap();
        std::fs::write(second.join("01_login/02_logged_in.png"), b"png").unwrap();
        std::fs::write(second.join("failures/login_failure.png"), b"png").unwrap();
        std::fs::write(second.join(REPORT_FILE), "<html></html>").unwrap();
        std::fs::create_dir_all(tmp.path().join("not-a-run")).unwrap();

        let entries = collect(tmp.path()).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].run_id, "2025-01-15_14-30-00_Run_001");
        assert_eq!(entries[0].started, "2025-01-15 14:30:00");
        assert_eq!(entries[0].tests, 1);
        assert_eq!(entries[0].failures, 0);
        assert!(entries[0].report.is_none());

        assert_eq!(entries[1].screenshots, 2);
        assert_eq!(entries[1].failures, 1);
        assert!(entries[1].report.is_some());
        assert_eq!(entries[1].status(), Some((4, Color::Red)));
    }

    #[test]
    fn test_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(collect(&tmp.path().join("missing")).unwrap().is_empty());
    }
}
