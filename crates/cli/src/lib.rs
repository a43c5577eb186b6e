//! Proofshot CLI
//!
//! Command-line interface for running UI suites and browsing the
//! screenshot runs they produce.

pub mod commands;
pub mod output;
