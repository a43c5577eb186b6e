//! Error types for the browser harness

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Browser bridge exited")]
    BridgeClosed,

    #[error("Suite parse error in {path}: {reason}")]
    SuiteParse { path: PathBuf, reason: String },

    #[error("Unknown keyword: {0}")]
    UnknownKeyword(String),

    #[error("Keyword '{keyword}' expects {expected} argument(s), got {got}")]
    KeywordArguments {
        keyword: String,
        expected: String,
        got: usize,
    },

    #[error("Variable not defined: {0}")]
    UndefinedVariable(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error(transparent)]
    Engine(#[from] proofshot_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
