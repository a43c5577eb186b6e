//! Run identity allocation
//!
//! Every session gets one identity, used as the name of its directory under
//! the shared output root. Sequenced identities look like
//! `2025-01-31_14-02-09_Run_004`; the sequence is one past the highest
//! sequence already present in the parent directory. A sibling whose number
//! does not fit in a `u64` counts as the ceiling, and once the ceiling is
//! taken allocation falls back to the timestamped form.
//!
//! Allocation scans the parent and then (later, on first artifact) creates
//! the run directory. That is not atomic: two processes allocating against
//! the same parent at the same time can compute the same sequence.

use chrono::{Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Timestamp layout shared by both naming conventions
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

static SEQUENCED_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2})_Run_(\d+)$").expect("valid run pattern")
});

static TIMESTAMPED_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Run_(\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2})$").expect("valid run pattern")
});

/// Run directory naming convention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunNaming {
    /// `<timestamp>_Run_<seq:03>`, unique within the parent directory
    #[default]
    Sequenced,
    /// `Run_<timestamp>`, no disambiguation between runs in the same second
    Timestamped,
}

/// Identity of one test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Local start time, formatted with [`TIMESTAMP_FORMAT`]
    pub timestamp: String,

    /// Present for [`RunNaming::Sequenced`] identities
    pub sequence: Option<u64>,
}

impl RunIdentity {
    /// Allocate an identity for a run starting now
    pub fn allocate(parent: &Path, naming: RunNaming) -> Self {
        Self::allocate_at(parent, naming, Local::now().naive_local())
    }

    /// Allocate an identity for a run starting at `now`
    pub fn allocate_at(parent: &Path, naming: RunNaming, now: NaiveDateTime) -> Self {
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();

        let sequence = match naming {
            RunNaming::Sequenced => {
                let highest = existing_sequences(parent).into_iter().max().unwrap_or(0);
                match highest.checked_add(1) {
                    Some(next) => Some(next),
                    None => {
                        warn!(
                            "Run sequence exhausted under {}, using a timestamped run name",
                            parent.display()
                        );
                        None
                    }
                }
            }
            RunNaming::Timestamped => None,
        };

        let identity = Self { timestamp, sequence };
        debug!("Allocated run identity {} under {}", identity, parent.display());
        identity
    }

    /// Parse a run directory name in either convention.
    ///
    /// Sequenced names whose number does not fit in a `u64` are rejected,
    /// since they would not format back to the same name.
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(caps) = SEQUENCED_RUN.captures(name) {
            let sequence = caps[2].parse().ok()?;
            return Some(Self {
                timestamp: caps[1].to_string(),
                sequence: Some(sequence),
            });
        }

        TIMESTAMPED_RUN.captures(name).map(|caps| Self {
            timestamp: caps[1].to_string(),
            sequence: None,
        })
    }

    /// Start time, if the timestamp is well formed
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).ok()
    }
}

impl fmt::Display for RunIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sequence {
            Some(seq) => write!(f, "{}_Run_{:03}", self.timestamp, seq),
            None => write!(f, "Run_{}", self.timestamp),
        }
    }
}

/// Sequence numbers of sequenced runs already present in `parent`.
///
/// A missing or unreadable directory counts as empty. Numbers too large for
/// a `u64` are reported as `u64::MAX`.
pub fn existing_sequences(parent: &Path) -> Vec<u64> {
    let entries = match std::fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("No existing runs in {}: {}", parent.display(), e);
            return Vec::new();
        }
    };

    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name();
            let caps = SEQUENCED_RUN.captures(name.to_str()?)?;
            // `\d+` only fails to parse on overflow
            Some(caps[2].parse::<u64>().unwrap_or(u64::MAX))
        })
        .collect()
}

/// All run identities found directly under `parent`, oldest first
pub fn list_runs(parent: &Path) -> Vec<RunIdentity> {
    let mut runs: Vec<RunIdentity> = match std::fs::read_dir(parent) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| RunIdentity::parse(e.file_name().to_str()?))
            .collect(),
        Err(_) => Vec::new(),
    };

    runs.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.sequence.cmp(&b.sequence))
    });
    runs
}
