//! Keyword registry and the built-in todo-app keywords
//!
//! Keyword names match case-insensitively, ignoring spaces and underscores,
//! so `Add Todo`, `add todo` and `add_todo` are the same keyword.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::keyword_suite::{substitute, KeywordCall};
use crate::page::{Locator, WaitState};
use crate::runner::TestScope;

/// Route the app redirects to after signing in
const TODOS_URL_PATTERN: &str = "**/todos";
const LOGIN_TIMEOUT: Duration = Duration::from_millis(10_000);
const VISIBILITY_TIMEOUT: Duration = Duration::from_millis(5_000);
/// Settle time after actions that re-render the list
const SETTLE: Duration = Duration::from_millis(500);
const CLEAR_SETTLE: Duration = Duration::from_millis(300);
/// Upper bound on delete clicks in `Clear All Todos`
const CLEAR_LIMIT: usize = 500;

const TODO_CHECKBOX: &str = "button[data-testid^='todo-checkbox']";
const TODO_DELETE: &str = "button[data-testid^='delete-button']";

/// A named action usable from keyword suites
#[async_trait]
pub trait Keyword: Send + Sync {
    /// Display name, e.g. `Add Todo`
    fn name(&self) -> &str;

    /// Accepted argument counts
    fn arity(&self) -> RangeInclusive<usize>;

    /// Run with already-substituted arguments. The returned value can be
    /// assigned to a variable by the caller.
    async fn run(&self, scope: &mut TestScope<'_>, args: &[String]) -> E2eResult<Option<String>>;
}

/// Normalised lookup key for a keyword name
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Keywords available to keyword suites
#[derive(Clone, Default)]
pub struct KeywordRegistry {
    keywords: HashMap<String, Arc<dyn Keyword>>,
}

impl KeywordRegistry {
    /// Registry without any keywords
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in keyword
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for builtin in Builtin::ALL {
            registry.register(Arc::new(builtin));
        }
        registry
    }

    /// Add a keyword, replacing any keyword with the same normalised name
    pub fn register(&mut self, keyword: Arc<dyn Keyword>) {
        let key = normalize(keyword.name());
        if self.keywords.insert(key, keyword.clone()).is_some() {
            debug!("Keyword '{}' replaced", keyword.name());
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Keyword>> {
        self.keywords.get(&normalize(name)).cloned()
    }

    /// Display names, sorted
    pub fn names(&self) -> Vec<String> {
        let sorted: BTreeMap<_, _> = self
            .keywords
            .iter()
            .map(|(key, keyword)| (key.clone(), keyword.name().to_string()))
            .collect();
        sorted.into_values().collect()
    }

    /// Resolve, substitute and run one call, storing its result in
    /// `variables` when the call assigns one
    pub async fn call(
        &self,
        scope: &mut TestScope<'_>,
        call: &KeywordCall,
        variables: &mut HashMap<String, String>,
    ) -> E2eResult<()> {
        let keyword = self
            .get(&call.keyword)
            .ok_or_else(|| E2eError::UnknownKeyword(call.keyword.clone()))?;

        let args = call
            .args
            .iter()
            .map(|arg| substitute(arg, variables).map_err(E2eError::UndefinedVariable))
            .collect::<E2eResult<Vec<_>>>()?;

        let arity = keyword.arity();
        if !arity.contains(&args.len()) {
            let expected = if arity.start() == arity.end() {
                arity.start().to_string()
            } else {
                format!("{} to {}", arity.start(), arity.end())
            };
            return Err(E2eError::KeywordArguments {
                keyword: keyword.name().to_string(),
                expected,
                got: args.len(),
            });
        }

        debug!("  {} {:?}", keyword.name(), args);
        let value = keyword.run(scope, &args).await?;

        if let Some(name) = &call.assign {
            variables.insert(name.clone(), value.unwrap_or_default());
        }
        Ok(())
    }
}

impl std::fmt::Debug for KeywordRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordRegistry")
            .field("keywords", &self.names())
            .finish()
    }
}

/// Keywords shipped with the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    GoToPage,
    Login,
    AddTodo,
    CompleteTodo,
    DeleteTodo,
    FilterTodos,
    VerifyTodoVisible,
    VerifyTodoNotVisible,
    CountTodos,
    ClearAllTodos,
    TakeScreenshot,
    Log,
    ShouldBeEqual,
    Sleep,
}

impl Builtin {
    pub const ALL: [Builtin; 14] = [
        Builtin::GoToPage,
        Builtin::Login,
        Builtin::AddTodo,
        Builtin::CompleteTodo,
        Builtin::DeleteTodo,
        Builtin::FilterTodos,
        Builtin::VerifyTodoVisible,
        Builtin::VerifyTodoNotVisible,
        Builtin::CountTodos,
        Builtin::ClearAllTodos,
        Builtin::TakeScreenshot,
        Builtin::Log,
        Builtin::ShouldBeEqual,
        Builtin::Sleep,
    ];
}

/// Screenshot label fragment for free text: spaces become underscores
fn label_part(text: &str) -> String {
    text.replace(' ', "_")
}

fn todo_item(text: &str) -> Locator {
    Locator::role_with_text("listitem", text)
}

#[async_trait]
impl Keyword for Builtin {
    fn name(&self) -> &str {
        match self {
            Builtin::GoToPage => "Go To Page",
            Builtin::Login => "Login",
            Builtin::AddTodo => "Add Todo",
            Builtin::CompleteTodo => "Complete Todo",
            Builtin::DeleteTodo => "Delete Todo",
            Builtin::FilterTodos => "Filter Todos",
            Builtin::VerifyTodoVisible => "Verify Todo Visible",
            Builtin::VerifyTodoNotVisible => "Verify Todo Not Visible",
            Builtin::CountTodos => "Count Todos",
            Builtin::ClearAllTodos => "Clear All Todos",
            Builtin::TakeScreenshot => "Take Screenshot",
            Builtin::Log => "Log",
            Builtin::ShouldBeEqual => "Should Be Equal",
            Builtin::Sleep => "Sleep",
        }
    }

    fn arity(&self) -> RangeInclusive<usize> {
        match self {
            Builtin::CountTodos | Builtin::ClearAllTodos => 0..=0,
            Builtin::Login => 2..=2,
            Builtin::Log => 1..=2,
            Builtin::ShouldBeEqual => 2..=3,
            _ => 1..=1,
        }
    }

    async fn run(&self, scope: &mut TestScope<'_>, args: &[String]) -> E2eResult<Option<String>> {
        let page = scope.page;
        match self {
            Builtin::GoToPage => {
                page.goto(&args[0]).await?;
                scope.capture("page_loaded").await?;
            }
            Builtin::Login => {
                page.fill(&Locator::label("Email Address"), &args[0]).await?;
                scope.capture("email_filled").await?;

                page.fill(&Locator::label("Password"), &args[1]).await?;
                scope.capture("password_filled").await?;

                page.click(&Locator::role("button", Some("Sign In"))).await?;
                page.wait_for_url(TODOS_URL_PATTERN, Some(LOGIN_TIMEOUT)).await?;
                scope.capture("logged_in").await?;
            }
            Builtin::AddTodo => {
                let text = &args[0];
                page.fill(&Locator::placeholder("What needs to be done?"), text)
                    .await?;
                scope.capture(&format!("todo_typed_{}", label_part(text))).await?;

                page.click(&Locator::role("button", Some("Add"))).await?;
                page.pause(SETTLE).await?;
                scope.capture(&format!("todo_added_{}", label_part(text))).await?;
            }
            Builtin::CompleteTodo => {
                let text = &args[0];
                page.click(&todo_item(text).within(TODO_CHECKBOX)).await?;
                scope.capture(&format!("todo_completed_{}", label_part(text))).await?;
            }
            Builtin::DeleteTodo => {
                let text = &args[0];
                page.click(&todo_item(text).within(TODO_DELETE)).await?;
                page.pause(SETTLE).await?;
                scope.capture(&format!("todo_deleted_{}", label_part(text))).await?;
            }
            Builtin::FilterTodos => {
                let status = &args[0];
                page.click(&Locator::role("button", Some(status.to_lowercase().as_str())))
                    .await?;
                page.pause(SETTLE).await?;
                scope.capture(&format!("filtered_{}", status)).await?;
            }
            Builtin::VerifyTodoVisible => {
                let text = &args[0];
                page.wait_for(&todo_item(text), WaitState::Attached, Some(VISIBILITY_TIMEOUT))
                    .await?;
                scope.capture(&format!("todo_visible_{}", label_part(text))).await?;
            }
            Builtin::VerifyTodoNotVisible => {
                let text = &args[0];
                page.wait_for(&todo_item(text), WaitState::Detached, Some(VISIBILITY_TIMEOUT))
                    .await?;
                scope.capture(&format!("todo_not_visible_{}", label_part(text))).await?;
            }
            Builtin::CountTodos => {
                let count = page.count(&Locator::role("listitem", None)).await?;
                return Ok(Some(count.to_string()));
            }
            Builtin::ClearAllTodos => {
                let delete = Locator::css(TODO_DELETE);
                let mut clicks = 0;
                while page.count(&delete).await? > 0 {
                    if clicks == CLEAR_LIMIT {
                        return Err(E2eError::StepFailed {
                            step: self.name().to_string(),
                            reason: format!("todos still present after {} deletions", CLEAR_LIMIT),
                        });
                    }
                    page.click(&delete.clone().first()).await?;
                    page.pause(CLEAR_SETTLE).await?;
                    clicks += 1;
                }
                scope.capture("all_todos_cleared").await?;
            }
            Builtin::TakeScreenshot => {
                let path = scope.capture(&args[0]).await?;
                return Ok(Some(path.display().to_string()));
            }
            Builtin::Log => {
                let level = args.get(1).map(|l| l.to_uppercase());
                match level.as_deref() {
                    Some("WARN") | Some("ERROR") => warn!("[{}] {}", scope.test.name, args[0]),
                    Some("DEBUG") | Some("TRACE") => debug!("[{}] {}", scope.test.name, args[0]),
                    _ => info!("[{}] {}", scope.test.name, args[0]),
                }
            }
            Builtin::ShouldBeEqual => {
                if args[0] != args[1] {
                    let message = args
                        .get(2)
                        .cloned()
                        .unwrap_or_else(|| format!("'{}' != '{}'", args[0], args[1]));
                    return Err(E2eError::AssertionFailed(message));
                }
            }
            Builtin::Sleep => {
                let duration = parse_duration(&args[0]).ok_or_else(|| E2eError::StepFailed {
                    step: self.name().to_string(),
                    reason: format!("invalid duration '{}'", args[0]),
                })?;
                page.pause(duration).await?;
            }
        }
        Ok(None)
    }
}

/// `500ms`, `2s`, `1.5 seconds`, or a bare number of seconds
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim().to_lowercase();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: f64 = number.parse().ok()?;
    let seconds = match unit.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => value,
        "ms" | "millis" | "milliseconds" => value / 1000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => value * 60.0,
        _ => return None,
    };
    Duration::try_from_secs_f64(seconds).ok()
}
