//! Proofshot browser harness
//!
//! This crate is the execution host for the instrumentation engine in
//! `proofshot-common`:
//! - Drives a Playwright page through a long-lived node bridge
//! - Parses declarative YAML suites and plain-text keyword suites
//! - Runs tests one at a time, capturing step screenshots into the run
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SuiteRunner (Rust)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  discover(dir) -> [Suite]                                   │
//! │    ├── ScriptSuite (YAML)   steps: navigate, fill, ...      │
//! │    └── KeywordSuite (.robot) calls into KeywordRegistry     │
//! │  begin(session, suites) -> RunProgress                      │
//! │  run_browser(progress, browser, page, ..) per browser       │
//! │    ├── session.begin_test_in(browser, name, source)         │
//! │    ├── TestScope::capture(label) -> step screenshot         │
//! │    ├── session.end_test(..) -> failure screenshot           │
//! │    └── progress.finish(session) -> index.html               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PlaywrightBridge: node + JSON lines  (impl Page)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod keyword_suite;
pub mod keywords;
pub mod page;
pub mod playwright;
pub mod runner;
pub mod suite;

pub use error::{E2eError, E2eResult};
pub use keyword_suite::KeywordSuite;
pub use keywords::{Keyword, KeywordRegistry};
pub use page::{Locator, Page, WaitState};
pub use playwright::{BridgeConfig, PlaywrightBridge};
pub use runner::{RunProgress, RunResult, Suite, SuiteRunner, TestFilter, TestResult, TestScope};
pub use suite::{ScriptStep, ScriptSuite};
