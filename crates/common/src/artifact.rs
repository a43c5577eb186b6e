//! Artifact paths and screenshot capture
//!
//! Layout under a run root:
//!
//! ```text
//! <run>/<browser>/<ordinal:02>_<test>/<step:02>_<label>.png
//! <run>/failures/<test>_failure.png
//! ```
//!
//! Two-digit padding keeps directory listings in logical order up to 99
//! tests and 99 steps per test. Past that the numbers just get wider and
//! lexicographic order stops matching.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::driver::PageDriver;
use crate::steps::StepRecorder;
use crate::{Error, Result};

/// Reserved subdirectory for failure screenshots
pub const FAILURES_DIR: &str = "failures";

/// Reserved subdirectory for recorded videos
pub const VIDEOS_DIR: &str = "videos";

/// Extension of captured screenshots
pub const IMAGE_EXTENSION: &str = "png";

/// Identity of one test while it runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestContext {
    /// Test name as reported by the harness
    pub name: String,

    /// 1-based position in the declaring suite
    pub ordinal: u32,

    /// Browser directory name (chromium, firefox, webkit)
    pub browser_label: String,
}

impl TestContext {
    /// Folder name for this test: `<ordinal:02>_<sanitized name>`
    pub fn dir_name(&self) -> String {
        format!("{:02}_{}", self.ordinal, sanitize(&self.name))
    }
}

/// Replace everything outside `[A-Za-z0-9]` with `_`
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Writes screenshots into one run directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    run_root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(run_root: impl Into<PathBuf>) -> Self {
        Self {
            run_root: run_root.into(),
        }
    }

    /// Run directory this writer targets
    pub fn run_root(&self) -> &Path {
        &self.run_root
    }

    /// Directory holding every artifact of one test
    pub fn test_dir(&self, ctx: &TestContext) -> PathBuf {
        self.run_root.join(&ctx.browser_label).join(ctx.dir_name())
    }

    /// Path of the artifact for a given step and label
    pub fn artifact_path(&self, ctx: &TestContext, step: u32, label: &str) -> PathBuf {
        self.test_dir(ctx).join(format!(
            "{:02}_{}.{}",
            step,
            sanitize(label),
            IMAGE_EXTENSION
        ))
    }

    /// Path of the failure screenshot for a test
    pub fn failure_path(&self, test_name: &str) -> PathBuf {
        self.run_root.join(FAILURES_DIR).join(format!(
            "{}_failure.{}",
            sanitize(test_name),
            IMAGE_EXTENSION
        ))
    }

    /// Take the next step for `ctx` and write a full-page screenshot for it.
    ///
    /// The step is consumed even when the capture fails, so a failed capture
    /// leaves a gap in the numbering rather than being silently reused.
    pub async fn capture(
        &self,
        driver: &dyn PageDriver,
        steps: &StepRecorder,
        ctx: &TestContext,
        label: &str,
    ) -> Result<PathBuf> {
        let step = steps.next_step_in(&ctx.browser_label, &ctx.name);
        let path = self.artifact_path(ctx, step, label);

        ensure_dir(&self.test_dir(ctx)).await?;

        if path.exists() {
            return Err(Error::DuplicateArtifact(path));
        }

        write_screenshot(driver, &path).await?;
        info!("  Step {}: {} -> {}", step, label, path.display());
        Ok(path)
    }

    /// Write the extra screenshot taken when a test fails
    pub async fn capture_failure(&self, driver: &dyn PageDriver, test_name: &str) -> Result<PathBuf> {
        let path = self.failure_path(test_name);
        ensure_dir(&self.run_root.join(FAILURES_DIR)).await?;

        write_screenshot(driver, &path).await?;
        info!("Failure screenshot saved: {}", path.display());
        Ok(path)
    }
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| Error::Directory {
            path: dir.to_path_buf(),
            source,
        })
}

async fn write_screenshot(driver: &dyn PageDriver, path: &Path) -> Result<()> {
    match driver.screenshot(path, true).await {
        Ok(()) => Ok(()),
        Err(e) => {
            // No partial or placeholder files
            if path.exists() {
                if let Err(rm) = tokio::fs::remove_file(path).await {
                    warn!("Could not remove partial screenshot {}: {}", path.display(), rm);
                }
            }
            debug!("Driver failed to capture {}: {}", path.display(), e);
            Err(match e {
                Error::Capture { .. } => e,
                other => Error::Capture {
                    path: path.to_path_buf(),
                    reason: other.to_string(),
                },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// Writes a fixed payload, or fails once `closed` is set
    struct StubDriver {
        closed: AtomicBool,
    }

    impl StubDriver {
        fn new() -> Self {
            Self {
                closed: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl PageDriver for StubDriver {
        async fn screenshot(&self, path: &Path, _full_page: bool) -> Result<()> {
            if self.closed.load(Ordering::SeqCst) {
                // Simulate a driver that dies mid-write
                std::fs::write(path, b"partial")?;
                return Err(Error::Driver("Target page has been closed".into()));
            }
            std::fs::write(path, b"\x89PNG")?;
            Ok(())
        }
    }

    fn ctx(name: &str, ordinal: u32) -> TestContext {
        TestContext {
            name: name.to_string(),
            ordinal,
            browser_label: "chromium".to_string(),
        }
    }

    #[test]
    fn test_paths() {
        let writer = ArtifactWriter::new("/out/run");
        let c = ctx("test login page loads", 3);
        assert_eq!(
            writer.artifact_path(&c, 7, "page loaded"),
            PathBuf::from("/out/run/chromium/03_test_login_page_loads/07_page_loaded.png")
        );
        assert_eq!(
            writer.failure_path("Add Todo!"),
            PathBuf::from("/out/run/failures/Add_Todo__failure.png")
        );
    }

    #[test]
    fn test_wide_numbers() {
        let writer = ArtifactWriter::new("r");
        let c = ctx("t", 100);
        assert_eq!(
            writer.artifact_path(&c, 123, "x"),
            PathBuf::from("r/chromium/100_t/123_x.png")
        );
    }

    #[tokio::test]
    async fn test_capture_sequence() {
        let tmp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(tmp.path().join("run"));
        let steps = StepRecorder::new();
        let driver = StubDriver::new();
        let c = ctx("login", 1);

        let first = writer.capture(&driver, &steps, &c, "page_loaded").await.unwrap();
        let second = writer.capture(&driver, &steps, &c, "email_filled").await.unwrap();

        assert!(first.ends_with("chromium/01_login/01_page_loaded.png"));
        assert!(second.ends_with("chromium/01_login/02_email_filled.png"));
        assert!(first.exists() && second.exists());
    }

    #[tokio::test]
    async fn test_browsers_number_steps_independently() {
        let tmp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(tmp.path().join("run"));
        let steps = StepRecorder::new();
        let driver = StubDriver::new();
        let chromium = ctx("login", 1);
        let firefox = TestContext {
            browser_label: "firefox".to_string(),
            ..chromium.clone()
        };

        writer.capture(&driver, &steps, &chromium, "page_loaded").await.unwrap();
        writer.capture(&driver, &steps, &chromium, "logged_in").await.unwrap();
        let other = writer.capture(&driver, &steps, &firefox, "page_loaded").await.unwrap();

        assert!(other.ends_with("firefox/01_login/01_page_loaded.png"));
        assert_eq!(steps.current_in("chromium", "login"), 2);
        assert_eq!(steps.current_in("firefox", "login"), 1);
    }

    #[tokio::test]
    async fn test_existing_artifact_is_never_overwritten() {
        let tmp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(tmp.path().join("run"));
        let driver = StubDriver::new();
        let c = ctx("login", 1);

        writer
            .capture(&driver, &StepRecorder::new(), &c, "page_loaded")
            .await
            .unwrap();

        // Same run, same tuple, fresh counters: second writer must refuse
        let err = writer
            .capture(&driver, &StepRecorder::new(), &c, "page_loaded")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateArtifact(_)));

        let files: Vec<_> = std::fs::read_dir(writer.test_dir(&c)).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_capture_failure_leaves_no_file() {
        let tmp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(tmp.path().join("run"));
        let steps = StepRecorder::new();
        let driver = StubDriver::new();
        let c = ctx("login", 1);

        driver.closed.store(true, Ordering::SeqCst);
        let err = writer.capture(&driver, &steps, &c, "page_loaded").await.unwrap_err();
        assert!(matches!(err, Error::Capture { .. }));
        assert!(!writer.artifact_path(&c, 1, "page_loaded").exists());

        // The failed step stays consumed
        driver.closed.store(false, Ordering::SeqCst);
        let next = writer.capture(&driver, &steps, &c, "retry").await.unwrap();
        assert!(next.ends_with("02_retry.png"));
    }

    #[tokio::test]
    async fn test_failure_screenshot_ignores_steps() {
        let tmp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(tmp.path().join("run"));
        let steps = StepRecorder::new();
        let driver = StubDriver::new();

        let path = writer.capture_failure(&driver, "add todo").await.unwrap();
        assert!(path.ends_with("failures/add_todo_failure.png"));
        assert!(path.exists());
        assert_eq!(steps.current("add todo"), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_directory_failure() {
        let tmp = TempDir::new().unwrap();
        // A file where the run directory should be
        let blocker = tmp.path().join("run");
        std::fs::write(&blocker, b"").unwrap();

        let writer = ArtifactWriter::new(&blocker);
        let err = writer
            .capture(&StubDriver::new(), &StepRecorder::new(), &ctx("t", 1), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Directory { .. }));
    }
}
