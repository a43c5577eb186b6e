//! Declarative YAML page-script suites
//!
//! ```yaml
//! name: todo
//! tags: [smoke]
//! tests:
//!   - name: add a todo
//!     steps:
//!       - action: navigate
//!         url: /todos
//!       - action: fill
//!         target: { placeholder: What needs to be done? }
//!         value: Buy milk
//!       - action: screenshot
//!         label: todo_typed
//! ```
//!
//! A test's ordinal is its 1-based position in the file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{E2eError, E2eResult};
use crate::page::{Locator, WaitState};
use crate::runner::TestScope;

/// A suite file parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSuite {
    /// Suite name, shown in logs and results
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags applied to every test in the suite
    #[serde(default)]
    pub tags: Vec<String>,

    /// Tests in declaration order
    pub tests: Vec<ScriptTest>,

    /// File the suite was read from
    #[serde(skip)]
    pub source: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptTest {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps to execute in order
    pub steps: Vec<ScriptStep>,
}

/// A single step in a test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Navigate to a URL (relative to the base URL)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for: Option<Locator>,
    },

    /// Fill an input field
    Fill {
        #[serde(alias = "selector")]
        target: Locator,
        value: String,
    },

    /// Click an element
    Click {
        #[serde(alias = "selector")]
        target: Locator,
    },

    /// Press a key, on an element or the page
    Press {
        #[serde(default, alias = "selector")]
        target: Option<Locator>,
        key: String,
    },

    /// Wait for an element to reach a state
    Wait {
        #[serde(alias = "selector")]
        target: Locator,
        #[serde(default)]
        state: WaitState,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Wait for the page URL to match a glob
    WaitForUrl {
        pattern: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Assert something about an element or the page URL
    Assert {
        #[serde(default, alias = "selector")]
        target: Option<Locator>,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        count: Option<usize>,
        /// Substring the current page URL must contain
        #[serde(default)]
        url_contains: Option<String>,
    },

    /// Capture the next step screenshot
    Screenshot {
        #[serde(alias = "name")]
        label: String,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep { ms: u64 },

    /// Log a message
    Log { message: String },
}

impl ScriptStep {
    /// Short description for logs and failure messages
    pub fn describe(&self) -> String {
        match self {
            ScriptStep::Navigate { url, .. } => format!("navigate:{}", url),
            ScriptStep::Fill { target, .. } => format!("fill:{}", target),
            ScriptStep::Click { target } => format!("click:{}", target),
            ScriptStep::Press { key, .. } => format!("press:{}", key),
            ScriptStep::Wait { target, .. } => format!("wait:{}", target),
            ScriptStep::WaitForUrl { pattern, .. } => format!("wait_for_url:{}", pattern),
            ScriptStep::Assert {
                target: Some(target), ..
            } => format!("assert:{}", target),
            ScriptStep::Assert { url_contains, .. } => {
                format!("assert:url~{}", url_contains.as_deref().unwrap_or(""))
            }
            ScriptStep::Screenshot { label } => format!("screenshot:{}", label),
            ScriptStep::Sleep { ms } => format!("sleep:{}ms", ms),
            ScriptStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }

    /// Execute this step against the scope's page
    pub async fn run(&self, scope: &mut TestScope<'_>) -> E2eResult<()> {
        let page = scope.page;
        match self {
            ScriptStep::Navigate { url, wait_for } => {
                page.goto(url).await?;
                if let Some(target) = wait_for {
                    page.wait_for(target, WaitState::Visible, None).await?;
                }
            }
            ScriptStep::Fill { target, value } => page.fill(target, value).await?,
            ScriptStep::Click { target } => page.click(target).await?,
            ScriptStep::Press { target, key } => page.press(target.as_ref(), key).await?,
            ScriptStep::Wait {
                target,
                state,
                timeout_ms,
            } => {
                page.wait_for(target, *state, timeout_ms.map(Duration::from_millis))
                    .await?
            }
            ScriptStep::WaitForUrl { pattern, timeout_ms } => {
                page.wait_for_url(pattern, timeout_ms.map(Duration::from_millis))
                    .await?
            }
            ScriptStep::Assert {
                target,
                visible,
                text_contains,
                count,
                url_contains,
            } => {
                if let Some(expected) = url_contains {
                    let url = page.current_url().await?;
                    if !url.contains(expected.as_str()) {
                        return Err(E2eError::AssertionFailed(format!(
                            "page is at '{}', expected the URL to contain '{}'",
                            url, expected
                        )));
                    }
                }
                let element_checks = visible.is_some() || text_contains.is_some() || count.is_some();
                let target = match target {
                    Some(target) => target,
                    None if element_checks => {
                        return Err(E2eError::AssertionFailed(
                            "element assertion without a target".to_string(),
                        ))
                    }
                    None => return Ok(()),
                };
                if let Some(visible) = visible {
                    let state = if *visible {
                        WaitState::Visible
                    } else {
                        WaitState::Hidden
                    };
                    page.wait_for(target, state, None).await?;
                }
                if let Some(expected) = text_contains {
                    let text = page.text(target).await?;
                    if !text.contains(expected.as_str()) {
                        return Err(E2eError::AssertionFailed(format!(
                            "{} has text '{}', expected it to contain '{}'",
                            target, text, expected
                        )));
                    }
                }
                if let Some(expected) = count {
                    let actual = page.count(target).await?;
                    if actual != *expected {
                        return Err(E2eError::AssertionFailed(format!(
                            "{} matched {} element(s), expected {}",
                            target, actual, expected
                        )));
                    }
                }
            }
            ScriptStep::Screenshot { label } => {
                scope.capture(label).await?;
            }
            ScriptStep::Sleep { ms } => page.pause(Duration::from_millis(*ms)).await?,
            ScriptStep::Log { message } => info!("[TEST LOG] {}", message),
        }
        Ok(())
    }
}

impl ScriptSuite {
    /// Parse a suite from a YAML string
    pub fn from_yaml(yaml: &str, source: &Path) -> E2eResult<Self> {
        let mut suite: Self = serde_yaml::from_str(yaml).map_err(|e| E2eError::SuiteParse {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        suite.source = source.to_path_buf();
        suite.validate()?;
        Ok(suite)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content, path)
    }

    fn validate(&self) -> E2eResult<()> {
        let mut seen = HashSet::new();
        for test in &self.tests {
            let name = test.name.trim();
            if name.is_empty() {
                return Err(self.parse_error("test with an empty name"));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(self.parse_error(&format!("duplicate test name '{}'", name)));
            }
        }
        Ok(())
    }

    fn parse_error(&self, reason: &str) -> E2eError {
        E2eError::SuiteParse {
            path: self.source.clone(),
            reason: reason.to_string(),
        }
    }

    /// Tests paired with their 1-based ordinals
    pub fn ordered_tests(&self) -> impl Iterator<Item = (u32, &ScriptTest)> {
        self.tests
            .iter()
            .enumerate()
            .map(|(index, test)| (index as u32 + 1, test))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TODO_SUITE: &str = r##"
name: todo
description: Todo list flows
tags: [smoke]
tests:
  - name: login
    steps:
      - action: navigate
        url: /
        wait_for: { label: Email Address }
      - action: fill
        target: { label: Email Address }
        value: test@example.com
      - action: click
        target: { role: button, name: Sign In }
      - action: wait_for_url
        pattern: "**/todos"
      - action: screenshot
        label: logged_in
  - name: add todo
    tags: [todos]
    steps:
      - action: fill
        selector: "#todo-input"
        value: Buy milk
      - action: press
        key: Enter
      - action: assert
        target: { role: listitem, has_text: Buy milk }
        visible: true
        count: 1
      - action: sleep
        ms: 500
      - action: log
        message: done
"##;

    #[test]
    fn test_parse_suite() {
        let suite = ScriptSuite::from_yaml(TODO_SUITE, Path::new("suites/todo.yaml")).unwrap();
        assert_eq!(suite.name, "todo");
        assert_eq!(suite.tags, vec!["smoke"]);
        assert_eq!(suite.tests.len(), 2);
        assert_eq!(suite.tests[0].steps.len(), 5);
        assert_eq!(suite.source, PathBuf::from("suites/todo.yaml"));

        let ordinals: Vec<_> = suite.ordered_tests().map(|(o, t)| (o, t.name.as_str())).collect();
        assert_eq!(ordinals, vec![(1, "login"), (2, "add todo")]);

        match &suite.tests[1].steps[0] {
            ScriptStep::Fill { target, value } => {
                assert_eq!(target, &Locator::css("#todo-input"));
                assert_eq!(value, "Buy milk");
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert!(matches!(
            suite.tests[1].steps[1],
            ScriptStep::Press { target: None, .. }
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let yaml = r#"
name: dup
tests:
  - name: Login
    steps: []
  - name: login
    steps: []
"#;
        let err = ScriptSuite::from_yaml(yaml, Path::new("dup.yaml")).unwrap_err();
        assert!(matches!(err, E2eError::SuiteParse { .. }));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let yaml = r#"
name: bad
tests:
  - name: t
    steps:
      - action: teleport
"#;
        let err = ScriptSuite::from_yaml(yaml, Path::new("bad.yaml")).unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_describe() {
        let step = ScriptStep::Click {
            target: Locator::role("button", Some("Add")),
        };
        assert_eq!(step.describe(), "click:role=button[name=Add]");
        let log = ScriptStep::Log {
            message: "x".repeat(100),
        };
        assert_eq!(log.describe().len(), "log:".len() + 30);
    }
}
