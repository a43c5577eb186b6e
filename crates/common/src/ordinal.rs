//! Test ordinal resolution
//!
//! Artifacts are grouped by a test's position in its declaring suite so a
//! report reads top to bottom in source order, whatever order the tests
//! actually ran in.
//!
//! Harnesses that know the order up front call [`OrdinalResolver::register`].
//! Otherwise the suite source is scanned:
//!
//! - keyword suites: top-level lines of the `*** Test Cases ***` section
//! - script suites: `test('name', ...)` calls
//!
//! The scan is a heuristic over the suite text, not a parser. Anything it
//! cannot make sense of resolves to ordinal 1.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Ordinal used when a test cannot be located
pub const DEFAULT_ORDINAL: u32 = 1;

static TEST_CASES_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\*+\s*test\s*cases?\s*\**\s*$").expect("valid header pattern")
});

static SCRIPT_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\btest(?:\.only)?\(\s*['"]([^'"]+)['"]"#).expect("valid declaration pattern")
});

/// Resolves and caches the 1-based ordinal of each test name
#[derive(Debug, Default)]
pub struct OrdinalResolver {
    registered: Mutex<HashMap<String, u32>>,
    resolved: Mutex<HashMap<String, u32>>,
}

impl OrdinalResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a test's ordinal explicitly. Takes precedence over scanning
    /// unless the name has already been resolved. The first registration of
    /// a name wins; later ones are ignored.
    pub fn register(&self, test_name: &str, ordinal: u32) {
        self.registered
            .lock()
            .entry(test_name.to_string())
            .or_insert(ordinal.max(1));
    }

    /// Ordinal of `test_name`. The first answer for a name is kept for the
    /// rest of the session, even if the suite source changes afterwards.
    pub fn resolve(&self, test_name: &str, suite_source: Option<&Path>) -> u32 {
        if let Some(ordinal) = self.resolved.lock().get(test_name) {
            return *ordinal;
        }

        let ordinal = match self.registered.lock().get(test_name) {
            Some(ordinal) => *ordinal,
            None => match suite_source {
                Some(path) => match ordinal_in_file(test_name, path) {
                    Ok(Some(ordinal)) => ordinal,
                    Ok(None) => {
                        debug!("'{}' not declared in {}", test_name, path.display());
                        DEFAULT_ORDINAL
                    }
                    Err(e) => {
                        warn!("{}", e);
                        DEFAULT_ORDINAL
                    }
                },
                None => DEFAULT_ORDINAL,
            },
        };

        self.resolved.lock().insert(test_name.to_string(), ordinal);
        ordinal
    }
}

/// Read a suite file and locate `test_name` in it
pub fn ordinal_in_file(test_name: &str, path: &Path) -> Result<Option<u32>> {
    let source = std::fs::read_to_string(path).map_err(|e| Error::Resolution {
        test: test_name.to_string(),
        reason: format!("{}: {}", path.display(), e),
    })?;
    Ok(ordinal_in_source(test_name, &source))
}

/// Locate `test_name` in suite source text (case-insensitive)
pub fn ordinal_in_source(test_name: &str, source: &str) -> Option<u32> {
    let wanted = test_name.trim().to_lowercase();
    declarations(source)
        .iter()
        .position(|name| name.to_lowercase() == wanted)
        .map(|index| index as u32 + 1)
}

/// Test declarations in source order
pub fn declarations(source: &str) -> Vec<String> {
    if source.lines().any(|line| TEST_CASES_HEADER.is_match(line.trim_end())) {
        keyword_declarations(source)
    } else {
        script_declarations(source)
    }
}

/// Top-level, non-comment lines of the test cases section
fn keyword_declarations(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut in_section = false;

    for line in source.lines() {
        let line = line.trim_end();

        if line.starts_with('*') {
            in_section = TEST_CASES_HEADER.is_match(line);
            continue;
        }

        if !in_section || line.is_empty() {
            continue;
        }

        // Indented lines are the body of the test above them
        if line.starts_with(|c: char| c.is_whitespace()) {
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        // Cells are separated by two or more spaces or a tab
        let name = split_first_cell(line);
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }

    names
}

fn script_declarations(source: &str) -> Vec<String> {
    SCRIPT_DECLARATION
        .captures_iter(source)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn split_first_cell(line: &str) -> &str {
    let end = line
        .find('\t')
        .into_iter()
        .chain(line.find("  "))
        .min()
        .unwrap_or(line.len());
    line[..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_case::test_case;

    const SUITE: &str = "\
*** Settings ***
Library    CustomKeywordsLibrary

*** Variables ***
${URL}    http://localhost:3000

*** Test Cases ***
A
    Go To Page    ${URL}
# B is commented out
B
    [Documentation]    second test
    Login    user@test.com    password

C
    Add Todo    milk

*** Keywords ***
Helper
    Log    not a test
";

    #[test_case("A", Some(1) ; "first")]
    #[test_case("B", Some(2) ; "second")]
    #[test_case("C", Some(3) ; "third")]
    #[test_case("c", Some(3) ; "case insensitive")]
    #[test_case("D", None ; "missing")]
    #[test_case("Helper", None ; "keyword section ignored")]
    fn test_keyword_suite(name: &str, expected: Option<u32>) {
        assert_eq!(ordinal_in_source(name, SUITE), expected);
    }

    #[test]
    fn test_singular_header_and_cells() {
        let src = "*** Test Case ***\nFirst One    [Tags]    smoke\n    Log    x\nSecond\tbody\n";
        assert_eq!(declarations(src), vec!["First One", "Second"]);
    }

    #[test]
    fn test_script_suite() {
        let src = r#"
test.describe('todo', () => {
  test('login page loads', async ({ page }) => {});
  test("add new todo", async ({ page }) => {});
});
"#;
        assert_eq!(ordinal_in_source("add new todo", src), Some(2));
        assert_eq!(ordinal_in_source("login page loads", src), Some(1));
    }

    #[test]
    fn test_resolver_fallbacks() {
        let tmp = TempDir::new().unwrap();
        let resolver = OrdinalResolver::new();

        assert_eq!(resolver.resolve("x", None), DEFAULT_ORDINAL);
        assert_eq!(
            resolver.resolve("y", Some(&tmp.path().join("missing.robot"))),
            DEFAULT_ORDINAL
        );
    }

    #[test]
    fn test_resolver_caches_first_answer() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("suite.robot");
        std::fs::write(&path, SUITE).unwrap();

        let resolver = OrdinalResolver::new();
        assert_eq!(resolver.resolve("B", Some(&path)), 2);

        // Editing the suite mid-run does not move the test
        std::fs::write(&path, "*** Test Cases ***\nB\n").unwrap();
        assert_eq!(resolver.resolve("B", Some(&path)), 2);
    }

    #[test]
    fn test_registered_ordinal_wins() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("suite.robot");
        std::fs::write(&path, SUITE).unwrap();

        let resolver = OrdinalResolver::new();
        resolver.register("A", 7);
        assert_eq!(resolver.resolve("A", Some(&path)), 7);
    }

    #[test]
    fn test_first_registration_wins() {
        let resolver = OrdinalResolver::new();
        resolver.register("Shared", 1);
        resolver.register("Shared", 2);
        assert_eq!(resolver.resolve("Shared", None), 1);
    }

    #[test]
    fn test_unreadable_source_is_resolution_error() {
        let tmp = TempDir::new().unwrap();
        let err = ordinal_in_file("A", &tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
    }
}
