//! Page interaction surface shared by suites and keywords

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use proofshot_common::PageDriver;

use crate::error::E2eResult;

/// How to find an element on the page.
///
/// In YAML a bare string is a CSS selector; the other forms are maps:
///
/// ```yaml
/// target: "#todo-input"
/// target: { label: Email Address }
/// target: { role: button, name: Sign In }
/// target: { within: { role: listitem, has_text: Milk }, css: "button[data-testid^='delete-button']" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    Css(String),
    First {
        first: Box<Locator>,
    },
    Within {
        within: Box<Locator>,
        css: String,
    },
    Label {
        label: String,
    },
    Placeholder {
        placeholder: String,
    },
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_text: Option<String>,
    },
    Text {
        text: String,
    },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn label(label: impl Into<String>) -> Self {
        Locator::Label { label: label.into() }
    }

    pub fn placeholder(placeholder: impl Into<String>) -> Self {
        Locator::Placeholder {
            placeholder: placeholder.into(),
        }
    }

    pub fn role(role: impl Into<String>, name: Option<&str>) -> Self {
        Locator::Role {
            role: role.into(),
            name: name.map(String::from),
            has_text: None,
        }
    }

    /// `role` elements whose text contains `text`
    pub fn role_with_text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Locator::Role {
            role: role.into(),
            name: None,
            has_text: Some(text.into()),
        }
    }

    /// `css` matches inside this locator
    pub fn within(self, css: impl Into<String>) -> Self {
        Locator::Within {
            within: Box::new(self),
            css: css.into(),
        }
    }

    /// Only the first match
    pub fn first(self) -> Self {
        Locator::First { first: Box::new(self) }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "{}", s),
            Locator::First { first } => write!(f, "{} >> first", first),
            Locator::Within { within, css } => write!(f, "{} >> {}", within, css),
            Locator::Label { label } => write!(f, "label={}", label),
            Locator::Placeholder { placeholder } => write!(f, "placeholder={}", placeholder),
            Locator::Role { role, name, has_text } => {
                write!(f, "role={}", role)?;
                if let Some(name) = name {
                    write!(f, "[name={}]", name)?;
                }
                if let Some(text) = has_text {
                    write!(f, "[has_text={}]", text)?;
                }
                Ok(())
            }
            Locator::Text { text } => write!(f, "text={}", text),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

/// A live browser page
///
/// Timeouts of `None` fall back to the browser's configured defaults.
#[async_trait]
pub trait Page: PageDriver {
    /// This page as a screenshot source for the engine
    fn driver(&self) -> &dyn PageDriver;

    /// Navigate; relative URLs resolve against the configured base URL
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn fill(&self, target: &Locator, value: &str) -> E2eResult<()>;

    async fn click(&self, target: &Locator) -> E2eResult<()>;

    /// Press a key on an element, or on the page when `target` is `None`
    async fn press(&self, target: Option<&Locator>, key: &str) -> E2eResult<()>;

    async fn wait_for(&self, target: &Locator, state: WaitState, timeout: Option<Duration>) -> E2eResult<()>;

    /// Wait until the page URL matches a glob such as `**/todos`
    async fn wait_for_url(&self, pattern: &str, timeout: Option<Duration>) -> E2eResult<()>;

    async fn count(&self, target: &Locator) -> E2eResult<usize>;

    /// Inner text of the first match
    async fn text(&self, target: &Locator) -> E2eResult<String>;

    async fn current_url(&self) -> E2eResult<String>;

    /// Let the page settle for a fixed time
    async fn pause(&self, duration: Duration) -> E2eResult<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }
}
