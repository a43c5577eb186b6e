//! Run report aggregation
//!
//! After a session, the run directory is scanned from scratch and rendered
//! into a single self-contained `index.html` (inline CSS, no JavaScript) that
//! can be opened straight from disk. Nothing is carried over from the
//! capture side; what is on disk is what gets reported.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::artifact::{FAILURES_DIR, VIDEOS_DIR};
use crate::Result;

/// File name of the rendered report inside the run root
pub const REPORT_FILE: &str = "index.html";

/// File name of the machine-readable summary inside the run root
pub const SUMMARY_FILE: &str = "summary.json";

/// Name of the link pointing at the most recent reported run
pub const LATEST_LINK: &str = "latest";

const REPORT_STYLE: &str = include_str!("assets/report.css");

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// One test folder found in the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    /// Folder name, e.g. `01_test_login_page_loads`
    pub test_name: String,

    /// Browser group the folder sits in, if the run is grouped by browser
    pub browser: Option<String>,

    pub screenshot_count: usize,

    /// Lexicographically smallest image in the folder
    pub first_screenshot: Option<String>,
}

impl TestSummary {
    /// Display title: ordinal prefix dropped, underscores as spaces
    pub fn title(&self) -> String {
        let name = match self.test_name.split_once('_') {
            Some((prefix, rest)) if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) => rest,
            _ => self.test_name.as_str(),
        };
        name.replace('_', " ")
    }

    /// Link to the representative screenshot, relative to the run root
    pub fn href(&self) -> Option<String> {
        let first = self.first_screenshot.as_ref()?;
        Some(match &self.browser {
            Some(browser) => format!("{}/{}/{}", browser, self.test_name, first),
            None => format!("{}/{}", self.test_name, first),
        })
    }
}

/// Everything the report shows, derived from the run directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub run_id: String,
    pub tests: Vec<TestSummary>,
    /// Images in the reserved failures folder
    pub failures: Vec<String>,
    pub total_tests: usize,
    /// Per-test screenshots only; failure images are not counted
    pub total_screenshots: usize,
}

impl ReportSummary {
    /// Scan a run directory.
    ///
    /// Each immediate subdirectory (except `failures` and `videos`) is a test
    /// folder, unless it holds no images but does hold subdirectories, in
    /// which case it is a browser group whose subdirectories are the tests.
    pub fn scan(run_root: &Path) -> Result<Self> {
        let run_id = run_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut tests = Vec::new();

        for dir in subdirs(run_root)? {
            let name = file_name(&dir);
            if name == FAILURES_DIR || name == VIDEOS_DIR {
                continue;
            }

            let images = images_in(&dir)?;
            let nested = subdirs(&dir)?;

            if images.is_empty() && !nested.is_empty() {
                for test_dir in nested {
                    tests.push(summarize(&test_dir, Some(name.clone()))?);
                }
            } else {
                tests.push(TestSummary {
                    test_name: name,
                    browser: None,
                    screenshot_count: images.len(),
                    first_screenshot: images.into_iter().next(),
                });
            }
        }

        let failures_dir = run_root.join(FAILURES_DIR);
        let failures = if failures_dir.is_dir() {
            images_in(&failures_dir)?
        } else {
            Vec::new()
        };

        let total_tests = tests.len();
        let total_screenshots = tests.iter().map(|t| t.screenshot_count).sum();

        debug!(
            "Scanned {}: {} tests, {} screenshots, {} failures",
            run_root.display(),
            total_tests,
            total_screenshots,
            failures.len()
        );

        Ok(Self {
            run_id,
            tests,
            failures,
            total_tests,
            total_screenshots,
        })
    }

    /// Distinct browser groups, in report order
    pub fn browsers(&self) -> Vec<&str> {
        let mut browsers: Vec<&str> = Vec::new();
        for browser in self.tests.iter().filter_map(|t| t.browser.as_deref()) {
            if !browsers.contains(&browser) {
                browsers.push(browser);
            }
        }
        browsers
    }

    /// Render the report page
    pub fn render_html(&self, generated_at: &str) -> String {
        let mut html = String::new();
        let run_id = escape_html(&self.run_id);

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"UTF-8\">\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
        let _ = writeln!(html, "<title>Test Run Report - {}</title>", run_id);
        let _ = writeln!(html, "<style>\n{}</style>", REPORT_STYLE);
        html.push_str("</head>\n<body>\n");

        html.push_str("<div class=\"header\">\n");
        html.push_str("<h1>Test Automation Report</h1>\n");
        let _ = writeln!(html, "<p>Run ID: <strong>{}</strong></p>", run_id);
        let _ = writeln!(html, "<p>Generated: {}</p>", escape_html(generated_at));
        html.push_str("</div>\n");

        html.push_str("<div class=\"panel summary\">\n<h2>Summary</h2>\n<div class=\"summary-grid\">\n");
        let browsers = self.browsers();
        if !browsers.is_empty() {
            summary_item(&mut html, browsers.len(), "Browsers Tested", "");
        }
        summary_item(&mut html, self.total_tests, "Total Tests", "");
        summary_item(&mut html, self.total_screenshots, "Screenshots", "");
        if !self.failures.is_empty() {
            summary_item(&mut html, self.failures.len(), "Failure Screenshots", " failed");
        }
        html.push_str("</div>\n</div>\n");

        html.push_str("<div class=\"panel\">\n<h2>Tests</h2>\n<div class=\"test-grid\">\n");
        for test in &self.tests {
            html.push_str("<div class=\"test-card\">\n");
            let _ = writeln!(html, "<div class=\"test-title\">{}</div>", escape_html(&test.title()));
            html.push_str("<div class=\"test-meta\">");
            if let Some(browser) = &test.browser {
                let _ = write!(html, "<span class=\"browser-tag\">{}</span>", escape_html(browser));
            }
            let _ = write!(
                html,
                "<span class=\"screenshot-count\">{} screenshots</span>",
                test.screenshot_count
            );
            html.push_str("</div>\n");
            match test.href() {
                Some(href) => {
                    let _ = writeln!(
                        html,
                        "<a href=\"./{}\" class=\"view-btn\" target=\"_blank\">View Screenshots</a>",
                        escape_html(&href)
                    );
                }
                None => html.push_str("<a href=\"#\" class=\"view-btn disabled\">No Screenshots</a>\n"),
            }
            html.push_str("</div>\n");
        }
        html.push_str("</div>\n");
        if self.tests.is_empty() {
            html.push_str("<p class=\"empty\">No test artifacts were captured in this run.</p>\n");
        }
        html.push_str("</div>\n");

        if !self.failures.is_empty() {
            html.push_str("<div class=\"panel\">\n<h2>Failures</h2>\n<ul class=\"failure-list\">\n");
            for failure in &self.failures {
                let escaped = escape_html(failure);
                let _ = writeln!(
                    html,
                    "<li><a href=\"./{}/{}\" target=\"_blank\">{}</a></li>",
                    FAILURES_DIR, escaped, escaped
                );
            }
            html.push_str("</ul>\n</div>\n");
        }

        html.push_str("</body>\n</html>\n");
        html
    }
}

/// Build the report for a finished run.
///
/// Returns `Ok(None)` without writing anything when the run directory does
/// not exist (the session captured nothing).
pub fn generate(run_root: &Path) -> Result<Option<PathBuf>> {
    if !run_root.is_dir() {
        info!("No artifacts under {}, skipping report", run_root.display());
        return Ok(None);
    }

    let summary = ReportSummary::scan(run_root)?;
    let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let report_path = run_root.join(REPORT_FILE);
    std::fs::write(&report_path, summary.render_html(&generated_at))?;
    std::fs::write(
        run_root.join(SUMMARY_FILE),
        serde_json::to_string_pretty(&summary)?,
    )?;

    info!(
        "Test report created: {} ({} tests, {} screenshots)",
        report_path.display(),
        summary.total_tests,
        summary.total_screenshots
    );
    info!("Open in browser: file://{}", absolute(&report_path).display());

    Ok(Some(report_path))
}

/// Point `<parent>/latest` at `run_root`. Only replaces an existing symlink.
pub fn link_latest(run_root: &Path) -> Result<()> {
    let Some(parent) = run_root.parent() else {
        return Ok(());
    };
    let link = parent.join(LATEST_LINK);

    if let Ok(meta) = std::fs::symlink_metadata(&link) {
        if !meta.file_type().is_symlink() {
            warn!("{} exists and is not a link, leaving it alone", link.display());
            return Ok(());
        }
        std::fs::remove_file(&link)?;
    }

    #[cfg(unix)]
    {
        let target = run_root.file_name().map(PathBuf::from).unwrap_or_else(|| run_root.to_path_buf());
        std::os::unix::fs::symlink(&target, &link)?;
        debug!("{} -> {}", link.display(), target.display());
    }

    Ok(())
}

fn summarize(dir: &Path, browser: Option<String>) -> Result<TestSummary> {
    let images = images_in(dir)?;
    Ok(TestSummary {
        test_name: file_name(dir),
        browser,
        screenshot_count: images.len(),
        first_screenshot: images.into_iter().next(),
    })
}

/// Immediate subdirectories, sorted by name
fn subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Image file names directly inside `dir`, sorted
fn images_in(dir: &Path) -> Result<Vec<String>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_image {
            images.push(file_name(&path));
        }
    }
    images.sort();
    Ok(images)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn summary_item(html: &mut String, value: usize, label: &str, extra_class: &str) {
    let _ = writeln!(
        html,
        "<div class=\"summary-item\"><div class=\"summary-number{}\">{}</div><div class=\"summary-label\">{}</div></div>",
        extra_class, value, label
    );
}

/// Replace HTML special characters with entities
pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"\x89PNG").unwrap();
    }

    #[test]
    fn test_missing_run_root_skips() {
        let tmp = TempDir::new().unwrap();
        let run = tmp.path().join("2025-01-01_00-00-00_Run_001");
        assert_eq!(generate(&run).unwrap(), None);
        assert!(!run.exists());
    }

    #[test]
    fn test_empty_run_root() {
        let tmp = TempDir::new().unwrap();
        let run = tmp.path().join("run");
        std::fs::create_dir(&run).unwrap();

        let report = generate(&run).unwrap().unwrap();
        let summary = ReportSummary::scan(&run).unwrap();
        assert_eq!(summary.total_tests, 0);
        assert_eq!(summary.total_screenshots, 0);
        assert!(summary.tests.is_empty());

        let html = std::fs::read_to_string(report).unwrap();
        assert!(!html.contains("class=\"test-card\""));
        assert!(!html.contains("<script"));
    }

    #[test]
    fn test_flat_layout_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let run = tmp.path().join("Run_2025-01-01_00-00-00");
        touch(&run.join("01_test_login_page_loads/02_logged_in.png"));
        touch(&run.join("01_test_login_page_loads/01_page_loaded.png"));
        touch(&run.join("02_test_add_new_todo/01_todo_added.png"));
        touch(&run.join("failures/test_add_new_todo_failure.png"));
        std::fs::create_dir_all(run.join("videos")).unwrap();

        let summary = ReportSummary::scan(&run).unwrap();
        assert_eq!(summary.total_tests, 2);
        assert_eq!(summary.total_screenshots, 3);
        assert_eq!(summary.failures, vec!["test_add_new_todo_failure.png"]);
        assert_eq!(
            summary.tests[0].href().as_deref(),
            Some("01_test_login_page_loads/01_page_loaded.png")
        );
        assert_eq!(summary.tests[0].title(), "test login page loads");

        let html = std::fs::read_to_string(generate(&run).unwrap().unwrap()).unwrap();
        assert_eq!(html.matches("class=\"test-card\"").count(), 2);
        let first = html.find("01_test_login_page_loads/01_page_loaded.png").unwrap();
        let second = html.find("02_test_add_new_todo/01_todo_added.png").unwrap();
        assert!(first < second);
        assert!(run.join(SUMMARY_FILE).exists());
    }

    #[test]
    fn test_browser_grouped_layout() {
        let tmp = TempDir::new().unwrap();
        let run = tmp.path().join("run");
        touch(&run.join("chromium/01_login/01_page_loaded.png"));
        touch(&run.join("chromium/02_add_todo/01_typed.png"));
        touch(&run.join("chromium/02_add_todo/02_added.png"));
        touch(&run.join("firefox/01_login/01_page_loaded.png"));

        let summary = ReportSummary::scan(&run).unwrap();
        assert_eq!(summary.total_tests, 3);
        assert_eq!(summary.total_screenshots, 4);
        assert_eq!(summary.browsers(), vec!["chromium", "firefox"]);
        assert_eq!(
            summary.tests[1].href().as_deref(),
            Some("chromium/02_add_todo/01_typed.png")
        );
    }

    #[test]
    fn test_non_image_files_ignored() {
        let tmp = TempDir::new().unwrap();
        let run = tmp.path().join("run");
        touch(&run.join("01_t/01_a.PNG"));
        std::fs::write(run.join("01_t/notes.txt"), "x").unwrap();

        let summary = ReportSummary::scan(&run).unwrap();
        assert_eq!(summary.tests[0].screenshot_count, 1);
        assert_eq!(summary.tests[0].first_screenshot.as_deref(), Some("01_a.PNG"));
    }

    #[test]
    fn test_regeneration_is_stable() {
        let tmp = TempDir::new().unwrap();
        let run = tmp.path().join("run");
        touch(&run.join("01_a/01_x.png"));
        touch(&run.join("02_b/01_y.png"));

        generate(&run).unwrap();
        let first: ReportSummary =
            serde_json::from_str(&std::fs::read_to_string(run.join(SUMMARY_FILE)).unwrap()).unwrap();
        generate(&run).unwrap();
        let second: ReportSummary =
            serde_json::from_str(&std::fs::read_to_string(run.join(SUMMARY_FILE)).unwrap()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_escaping() {
        let summary = ReportSummary {
            run_id: "<run>".into(),
            tests: vec![TestSummary {
                test_name: "01_a&b".into(),
                browser: None,
                screenshot_count: 0,
                first_screenshot: None,
            }],
            failures: vec![],
            total_tests: 1,
            total_screenshots: 0,
        };
        let html = summary.render_html("now");
        assert!(html.contains("&lt;run&gt;"));
        assert!(html.contains("a&amp;b"));
        assert!(html.contains("No Screenshots"));
    }

    #[cfg(unix)]
    #[test]
    fn test_latest_link() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("Run_2025-01-01_00-00-00");
        let second = tmp.path().join("Run_2025-01-01_00-00-01");
        std::fs::create_dir(&first).unwrap();
        std::fs::create_dir(&second).unwrap();

        link_latest(&first).unwrap();
        link_latest(&second).unwrap();

        let target = std::fs::read_link(tmp.path().join(LATEST_LINK)).unwrap();
        assert_eq!(target, PathBuf::from("Run_2025-01-01_00-00-01"));
    }
}
