//! Plain-text keyword suites
//!
//! ```text
//! *** Settings ***
//! Documentation     Todo flows
//! Test Setup        Go To Page    ${BASE_URL}
//!
//! *** Variables ***
//! ${EMAIL}          test@example.com
//!
//! *** Test Cases ***
//! Login
//!     [Tags]    smoke
//!     Login    ${EMAIL}    secret
//!     ${count}=    Count Todos
//!     Should Be Equal    ${count}    0
//! ```
//!
//! Cells are separated by two or more spaces or a tab. Top-level lines in
//! the test cases section start a test; indented lines are its body. A row
//! starting with `...` continues the row above it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};

static SECTION_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*+\s*([^*]+?)\s*\**\s*$").expect("valid section pattern"));

static CELL_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}|\t").expect("valid separator pattern"));

static ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{([^}]+)\}\s*=?$").expect("valid assignment pattern"));

static VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid variable pattern"));

/// One keyword invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordCall {
    /// Variable receiving the keyword's return value
    pub assign: Option<String>,
    pub keyword: String,
    pub args: Vec<String>,
    /// 1-based source line
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordTest {
    pub name: String,
    pub documentation: Option<String>,
    pub tags: Vec<String>,
    /// Overrides the suite's test setup when set
    pub setup: Option<KeywordCall>,
    /// Overrides the suite's test teardown when set
    pub teardown: Option<KeywordCall>,
    pub body: Vec<KeywordCall>,
}

/// A parsed keyword suite
#[derive(Debug, Clone, Default)]
pub struct KeywordSuite {
    /// Derived from the file name
    pub name: String,
    pub documentation: Option<String>,
    pub test_setup: Option<KeywordCall>,
    pub test_teardown: Option<KeywordCall>,
    /// Tags added to every test
    pub tags: Vec<String>,
    /// Suite-level variables, values already substituted
    pub variables: HashMap<String, String>,
    pub tests: Vec<KeywordTest>,
    pub source: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Settings,
    Variables,
    TestCases,
    Ignored,
}

impl Section {
    fn from_header(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "settings" | "setting" => Section::Settings,
            "variables" | "variable" => Section::Variables,
            "test cases" | "test case" | "testcases" => Section::TestCases,
            other => {
                warn!("Ignoring unsupported section '{}'", other);
                Section::Ignored
            }
        }
    }
}

/// A row of cells with its line number
struct Row {
    line: usize,
    indented: bool,
    cells: Vec<String>,
}

impl KeywordSuite {
    /// Parse a suite file. `preset` variables (such as `BASE_URL`) are
    /// visible to the file and may be overridden by its variables section.
    pub fn from_file(path: &Path, preset: &HashMap<String, String>) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path, preset)
    }

    pub fn parse(content: &str, source: &Path, preset: &HashMap<String, String>) -> E2eResult<Self> {
        let mut suite = KeywordSuite {
            name: suite_name(source),
            variables: preset.clone(),
            source: source.to_path_buf(),
            ..Default::default()
        };

        let mut section = Section::None;
        let mut rows: Vec<(Section, Row)> = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim_end();
            if let Some(caps) = SECTION_HEADER.captures(line) {
                section = Section::from_header(&caps[1]);
                continue;
            }
            if section == Section::None || section == Section::Ignored {
                continue;
            }
            let Some(row) = split_row(index + 1, line) else {
                continue;
            };

            // Continuation rows extend the previous row in place
            if row.cells.first().map(String::as_str) == Some("...") {
                match rows.last_mut() {
                    Some((_, previous)) => previous.cells.extend(row.cells.into_iter().skip(1)),
                    None => return Err(suite.error(row.line, "continuation without a row to continue")),
                }
                continue;
            }
            rows.push((section, row));
        }

        // Variables first so settings and tests can refer to them
        for (_, row) in rows.iter().filter(|(s, _)| *s == Section::Variables) {
            suite.parse_variable(row)?;
        }
        for (section, row) in &rows {
            match section {
                Section::Settings => suite.parse_setting(row)?,
                Section::TestCases => suite.parse_test_row(row)?,
                _ => {}
            }
        }

        suite.validate()?;
        debug!("Parsed {} test(s) from {}", suite.tests.len(), source.display());
        Ok(suite)
    }

    fn error(&self, line: usize, reason: impl std::fmt::Display) -> E2eError {
        E2eError::SuiteParse {
            path: self.source.clone(),
            reason: format!("line {}: {}", line, reason),
        }
    }

    fn parse_variable(&mut self, row: &Row) -> E2eResult<()> {
        let Some(caps) = ASSIGNMENT.captures(&row.cells[0]) else {
            return Err(self.error(row.line, format!("invalid variable name '{}'", row.cells[0])));
        };
        let name = caps[1].to_string();
        let value = substitute(&row.cells[1..].join(" "), &self.variables).map_err(|missing| {
            self.error(row.line, format!("variable '${{{}}}' is not defined", missing))
        })?;
        self.variables.insert(name, value);
        Ok(())
    }

    fn parse_setting(&mut self, row: &Row) -> E2eResult<()> {
        let values = &row.cells[1..];
        match row.cells[0].to_lowercase().as_str() {
            "documentation" => self.documentation = Some(values.join(" ")),
            "test setup" => self.test_setup = self.call_from(row.line, values)?,
            "test teardown" => self.test_teardown = self.call_from(row.line, values)?,
            "force tags" | "test tags" | "default tags" => self.tags.extend(values.iter().cloned()),
            "library" | "resource" | "variables" => {
                debug!("Setting '{}' has no effect here", row.cells[0])
            }
            other => warn!("{}:{}: unsupported setting '{}'", self.source.display(), row.line, other),
        }
        Ok(())
    }

    fn parse_test_row(&mut self, row: &Row) -> E2eResult<()> {
        let mut cells = row.cells.as_slice();

        if !row.indented {
            self.tests.push(KeywordTest {
                name: cells[0].clone(),
                ..Default::default()
            });
            // `Name    Keyword    args` puts the first call on the same line
            cells = &cells[1..];
            if cells.is_empty() {
                return Ok(());
            }
        }

        if self.tests.is_empty() {
            return Err(self.error(row.line, "keyword call before any test name"));
        }

        let first = cells[0].as_str();
        if first.starts_with('[') && first.ends_with(']') {
            let setting = first[1..first.len() - 1].to_lowercase();
            let values = &cells[1..];
            let call = match setting.as_str() {
                "setup" | "teardown" => self.call_from(row.line, values)?,
                _ => None,
            };
            let source = self.source.clone();
            let test = self.current_test();
            match setting.as_str() {
                "tags" => test.tags.extend(values.iter().cloned()),
                "documentation" => test.documentation = Some(values.join(" ")),
                "setup" => test.setup = call,
                "teardown" => test.teardown = call,
                other => warn!("{}:{}: unsupported test setting [{}]", source.display(), row.line, other),
            }
            return Ok(());
        }

        if let Some(call) = self.call_from(row.line, cells)? {
            self.current_test().body.push(call);
        }
        Ok(())
    }

    fn current_test(&mut self) -> &mut KeywordTest {
        let last = self.tests.len() - 1;
        &mut self.tests[last]
    }

    /// Build a call from `[${var}=] Keyword args...`; an empty or `NONE`
    /// row yields no call
    fn call_from(&self, line: usize, cells: &[String]) -> E2eResult<Option<KeywordCall>> {
        let (assign, rest) = match cells.first().and_then(|c| ASSIGNMENT.captures(c)) {
            Some(caps) => (Some(caps[1].to_string()), &cells[1..]),
            None => (None, cells),
        };
        match rest.split_first() {
            Some((keyword, _)) if keyword.eq_ignore_ascii_case("none") => Ok(None),
            Some((keyword, args)) => Ok(Some(KeywordCall {
                assign,
                keyword: keyword.clone(),
                args: args.to_vec(),
                line,
            })),
            None if assign.is_some() => Err(self.error(line, "assignment without a keyword")),
            None => Ok(None),
        }
    }

    fn validate(&self) -> E2eResult<()> {
        let mut seen = HashMap::new();
        for test in &self.tests {
            if let Some(previous) = seen.insert(test.name.to_lowercase(), &test.name) {
                return Err(E2eError::SuiteParse {
                    path: self.source.clone(),
                    reason: format!("duplicate test name '{}' ('{}')", test.name, previous),
                });
            }
        }
        Ok(())
    }

    /// Tests paired with their 1-based ordinals
    pub fn ordered_tests(&self) -> impl Iterator<Item = (u32, &KeywordTest)> {
        self.tests
            .iter()
            .enumerate()
            .map(|(index, test)| (index as u32 + 1, test))
    }

    /// Setup for `test`, its own taking precedence over the suite's
    pub fn setup_for<'a>(&'a self, test: &'a KeywordTest) -> Option<&'a KeywordCall> {
        test.setup.as_ref().or(self.test_setup.as_ref())
    }

    pub fn teardown_for<'a>(&'a self, test: &'a KeywordTest) -> Option<&'a KeywordCall> {
        test.teardown.as_ref().or(self.test_teardown.as_ref())
    }
}

/// `todo_flows.robot` -> `Todo Flows`
fn suite_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    stem.split(|c: char| c == '_' || c == ' ')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_row(line_number: usize, line: &str) -> Option<Row> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let mut cells = Vec::new();
    for cell in CELL_SEPARATOR.split(trimmed) {
        let cell = cell.trim();
        if cell.starts_with('#') {
            break;
        }
        if !cell.is_empty() {
            cells.push(cell.to_string());
        }
    }
    if cells.is_empty() {
        return None;
    }

    Some(Row {
        line: line_number,
        indented: trimmed.len() != line.len(),
        cells,
    })
}

/// Replace `${NAME}` references. `${EMPTY}` and `${SPACE}` are always
/// defined; the first undefined name is returned as the error.
pub fn substitute(text: &str, variables: &HashMap<String, String>) -> Result<String, String> {
    let mut missing = None;
    let replaced = VARIABLE.replace_all(text, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match variables.get(name) {
            Some(value) => value.clone(),
            None => match name {
                "EMPTY" => String::new(),
                "SPACE" => " ".to_string(),
                _ => {
                    missing.get_or_insert_with(|| name.to_string());
                    caps[0].to_string()
                }
            },
        }
    });
    match missing {
        Some(name) => Err(name),
        None => Ok(replaced.into_owned()),
    }
}
