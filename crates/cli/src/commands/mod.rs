//! CLI Commands

pub mod init;
pub mod report;
pub mod run;
pub mod runs;
