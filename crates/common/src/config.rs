//! Proofshot configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::run_id::RunNaming;
use crate::Result;

/// Environment variable that overrides `[app].base_url`
pub const BASE_URL_ENV: &str = "BASE_URL";

/// Top-level configuration, usually read from `proofshot.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofshotConfig {
    /// Artifact output configuration
    pub output: OutputConfig,

    /// Browser configuration
    pub browser: BrowserConfig,

    /// Application under test
    pub app: AppConfig,

    /// Suite discovery
    pub suites: SuitesConfig,
}

/// Where and how run artifacts are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Parent directory shared by all runs
    pub root: PathBuf,

    /// Run directory naming convention
    pub naming: RunNaming,

    /// Repoint `<root>/latest` at the run after the report is written
    pub latest_link: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("test-output"),
            naming: RunNaming::Sequenced,
            latest_link: true,
        }
    }
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Browser engine: chromium, firefox or webkit
    pub name: BrowserKind,

    /// Engines to run one after another under a single run. Overrides
    /// `name` when not empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub browsers: Vec<BrowserKind>,

    /// Run without a visible window
    pub headless: bool,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Delay inserted by Playwright between actions
    pub slow_mo_ms: u64,

    /// Timeout for element waits, clicks and fills
    pub action_timeout_ms: u64,

    /// Timeout for navigations and URL waits
    pub navigation_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            name: BrowserKind::Chromium,
            browsers: Vec::new(),
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            slow_mo_ms: 0,
            action_timeout_ms: 20_000,
            navigation_timeout_ms: 20_000,
        }
    }
}

impl BrowserConfig {
    /// Engines a run covers, in order, without repeats
    pub fn targets(&self) -> Vec<BrowserKind> {
        if self.browsers.is_empty() {
            return vec![self.name];
        }
        let mut targets = Vec::new();
        for browser in &self.browsers {
            if !targets.contains(browser) {
                targets.push(*browser);
            }
        }
        targets
    }
}

/// Browser engines Playwright can launch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    /// Label used as the browser directory name inside a run
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl std::fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BrowserKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" | "safari" => Ok(BrowserKind::Webkit),
            other => Err(crate::Error::InvalidConfig(format!("unknown browser: {}", other))),
        }
    }
}

/// Application under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Suite discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuitesConfig {
    /// Directory searched recursively for `.yaml`/`.yml` and `.robot` suites
    pub dir: PathBuf,
}

impl Default for SuitesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("suites"),
        }
    }
}

impl ProofshotConfig {
    /// Load configuration from file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.app.base_url = url;
            }
        }
    }
}
