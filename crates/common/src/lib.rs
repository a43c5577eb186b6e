//! Proofshot Common Library
//!
//! The test-run instrumentation engine: run identities, test ordinals,
//! per-test step counters, screenshot placement and the post-run HTML report.

pub mod artifact;
pub mod config;
pub mod driver;
pub mod error;
pub mod ordinal;
pub mod report;
pub mod run_id;
pub mod session;
pub mod steps;

// Re-export commonly used types
pub use artifact::{sanitize, ArtifactWriter, TestContext, FAILURES_DIR, VIDEOS_DIR};
pub use config::{BrowserConfig, BrowserKind, ProofshotConfig};
pub use driver::PageDriver;
pub use error::{Error, Result};
pub use ordinal::OrdinalResolver;
pub use report::ReportSummary;
pub use run_id::{RunIdentity, RunNaming};
pub use session::{Session, SessionConfig, TestOutcome};
pub use steps::StepRecorder;

/// Proofshot version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "proofshot.toml";
