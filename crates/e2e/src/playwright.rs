//! Playwright browser automation
//!
//! [`PlaywrightBridge`] keeps one `node` process alive for the whole run. The
//! process owns the browser, context and page; Rust sends it one JSON request
//! per line on stdin and reads one JSON reply per line from stdout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use proofshot_common::{BrowserKind, PageDriver, ProofshotConfig};

use crate::error::{E2eError, E2eResult};
use crate::page::{Locator, Page, WaitState};

const BRIDGE_SCRIPT: &str = include_str!("assets/bridge.js");

/// Environment variable carrying the bridge configuration as JSON
const CONFIG_ENV: &str = "PROOFSHOT_BRIDGE_CONFIG";

/// How long the browser may take to come up
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Added on top of Playwright's own timeout before the bridge gives up
const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Budget for the liveness ping
const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for the browser bridge
#[derive(Debug, Clone, Serialize)]
pub struct BridgeConfig {
    pub browser: BrowserKind,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub slow_mo_ms: u64,
    pub action_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    /// Base for relative navigation URLs
    pub base_url: String,
    /// `node_modules` directory that provides `playwright`
    #[serde(skip)]
    pub node_modules: PathBuf,
}

impl BridgeConfig {
    pub fn from_config(config: &ProofshotConfig) -> Self {
        Self {
            browser: config.browser.name,
            headless: config.browser.headless,
            viewport_width: config.browser.viewport_width,
            viewport_height: config.browser.viewport_height,
            slow_mo_ms: config.browser.slow_mo_ms,
            action_timeout_ms: config.browser.action_timeout_ms,
            navigation_timeout_ms: config.browser.navigation_timeout_ms,
            base_url: config.app.base_url.clone(),
            node_modules: PathBuf::from("node_modules"),
        }
    }

    /// Same settings, another engine
    pub fn with_browser(mut self, browser: BrowserKind) -> Self {
        self.browser = browser;
        self
    }

    /// Longest a request may take when it names no timeout of its own
    fn default_limit(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms.max(self.navigation_timeout_ms))
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from_config(&ProofshotConfig::default())
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Command<'a> {
    Ping,
    Goto {
        url: &'a str,
    },
    Fill {
        target: &'a Locator,
        value: &'a str,
    },
    Click {
        target: &'a Locator,
    },
    Press {
        target: Option<&'a Locator>,
        key: &'a str,
    },
    WaitFor {
        target: &'a Locator,
        state: WaitState,
        timeout_ms: Option<u64>,
    },
    WaitForUrl {
        pattern: &'a str,
        timeout_ms: Option<u64>,
    },
    Count {
        target: &'a Locator,
    },
    Text {
        target: &'a Locator,
    },
    Url,
    Screenshot {
        path: &'a Path,
        full_page: bool,
    },
    Close,
}

impl Command<'_> {
    fn name(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Goto { .. } => "goto",
            Command::Fill { .. } => "fill",
            Command::Click { .. } => "click",
            Command::Press { .. } => "press",
            Command::WaitFor { .. } => "wait_for",
            Command::WaitForUrl { .. } => "wait_for_url",
            Command::Count { .. } => "count",
            Command::Text { .. } => "text",
            Command::Url => "url",
            Command::Screenshot { .. } => "screenshot",
            Command::Close => "close",
        }
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    #[serde(flatten)]
    command: Command<'a>,
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ready: Option<bool>,
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// Long-lived Playwright page driven over a node subprocess
pub struct PlaywrightBridge {
    config: BridgeConfig,
    io: Mutex<BridgeIo>,
    child: Mutex<Child>,
    next_id: AtomicU64,
    alive: AtomicBool,
    /// Holds the bridge script for the lifetime of the process
    _script_dir: TempDir,
}

impl PlaywrightBridge {
    /// Start node, launch the browser and open a page
    pub async fn launch(config: BridgeConfig) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        tokio::fs::write(&script_path, BRIDGE_SCRIPT).await?;

        info!(
            "Launching {} ({})",
            config.browser,
            if config.headless { "headless" } else { "headed" }
        );

        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .env(CONFIG_ENV, serde_json::to_string(&config)?)
            .env("NODE_PATH", absolute(&config.node_modules))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => E2eError::PlaywrightNotFound,
                _ => E2eError::Io(e),
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout unavailable".into()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[node] {}", line);
                }
            });
        }

        let mut io = BridgeIo {
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let ready = match timeout(LAUNCH_TIMEOUT, read_reply(&mut io.stdout)).await {
            Ok(reply) => reply?,
            Err(_) => return Err(E2eError::Timeout("browser launch".into())),
        };
        if ready.ready != Some(true) {
            let reason = ready.error.unwrap_or_else(|| "browser did not start".into());
            return Err(if reason.contains("Cannot find module 'playwright'") {
                E2eError::PlaywrightNotFound
            } else {
                E2eError::Playwright(reason)
            });
        }

        debug!("Browser bridge ready (pid: {:?})", child.id());

        Ok(Self {
            config,
            io: Mutex::new(io),
            child: Mutex::new(child),
            next_id: AtomicU64::new(1),
            alive: AtomicBool::new(true),
            _script_dir: script_dir,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Send one request and wait for its reply
    async fn request(&self, command: Command<'_>, limit: Option<Duration>) -> E2eResult<serde_json::Value> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(E2eError::BridgeClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let name = command.name();
        let mut line = serde_json::to_string(&Request { id, command })?;
        line.push('\n');

        let limit = limit.unwrap_or_else(|| self.config.default_limit()) + TIMEOUT_GRACE;
        let deadline = Instant::now() + limit;
        let mut io = self.io.lock().await;

        // A request cut off mid-write leaves a partial line on stdin, and
        // nothing sent after it would parse
        match timeout_at(deadline, send_line(&mut io.stdin, &line)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.alive.store(false, Ordering::SeqCst);
                return Err(e);
            }
            Err(_) => {
                self.alive.store(false, Ordering::SeqCst);
                return Err(E2eError::Timeout(format!(
                    "sending {} after {} ms",
                    name,
                    limit.as_millis()
                )));
            }
        }

        let reply = match timeout_at(deadline, await_reply(&mut io.stdout, id)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                if matches!(e, E2eError::BridgeClosed | E2eError::Io(_)) {
                    self.alive.store(false, Ordering::SeqCst);
                }
                return Err(e);
            }
            Err(_) => {
                return Err(E2eError::Timeout(format!("{} after {} ms", name, limit.as_millis())));
            }
        };

        if reply.ok {
            Ok(reply.value)
        } else {
            Err(E2eError::Playwright(
                reply.error.unwrap_or_else(|| format!("{} failed", name)),
            ))
        }
    }

    /// Close the browser and wait for node to exit
    pub async fn close(&self) -> E2eResult<()> {
        if self.alive.load(Ordering::SeqCst) {
            if let Err(e) = self.request(Command::Close, Some(Duration::from_secs(10))).await {
                warn!("Browser did not close cleanly: {}", e);
            }
            self.alive.store(false, Ordering::SeqCst);
        }

        let mut child = self.child.lock().await;
        if timeout(Duration::from_secs(5), child.wait()).await.is_err() {
            // Try graceful shutdown first
            #[cfg(unix)]
            {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;

                if let Some(pid) = child.id() {
                    debug!("Sending SIGTERM to bridge (pid: {})", pid);
                    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
                    if timeout(Duration::from_millis(500), child.wait()).await.is_ok() {
                        return Ok(());
                    }
                }
            }
            child.kill().await?;
        }
        Ok(())
    }
}

async fn send_line<W: AsyncWrite + Unpin>(stdin: &mut W, line: &str) -> E2eResult<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

/// Read replies until the one answering `id`
async fn await_reply<R: AsyncBufRead + Unpin>(stdout: &mut Lines<R>, id: u64) -> E2eResult<Reply> {
    loop {
        let reply = read_reply(stdout).await?;
        if reply.id == Some(id) {
            return Ok(reply);
        }
        // Late answer to a request that already timed out
        debug!("Discarding bridge reply {:?} while waiting for {}", reply.id, id);
    }
}

async fn read_reply<R: AsyncBufRead + Unpin>(stdout: &mut Lines<R>) -> E2eResult<Reply> {
    loop {
        let Some(line) = stdout.next_line().await? else {
            return Err(E2eError::BridgeClosed);
        };
        match serde_json::from_str::<Reply>(&line) {
            Ok(reply) => return Ok(reply),
            Err(_) => debug!("[node] {}", line),
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn millis(duration: Option<Duration>) -> Option<u64> {
    duration.map(|d| d.as_millis() as u64)
}

fn decode<T: serde::de::DeserializeOwned>(what: &str, value: serde_json::Value) -> E2eResult<T> {
    serde_json::from_value(value).map_err(|e| E2eError::Playwright(format!("unexpected {} reply: {}", what, e)))
}

#[async_trait]
impl PageDriver for PlaywrightBridge {
    async fn screenshot(&self, path: &Path, full_page: bool) -> proofshot_common::Result<()> {
        let path = absolute(path);
        let limit = self.config.default_limit();
        self.request(Command::Screenshot { path: &path, full_page }, Some(limit))
            .await
            .map(|_| ())
            .map_err(|e| match e {
                E2eError::Timeout(what) => proofshot_common::Error::Timeout {
                    what,
                    millis: limit.as_millis() as u64,
                },
                other => proofshot_common::Error::Driver(other.to_string()),
            })
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
            && matches!(
                timeout(PING_TIMEOUT, self.request(Command::Ping, Some(PING_TIMEOUT))).await,
                Ok(Ok(_))
            )
    }
}

#[async_trait]
impl Page for PlaywrightBridge {
    fn driver(&self) -> &dyn PageDriver {
        self
    }

    async fn goto(&self, url: &str) -> E2eResult<()> {
        let limit = Duration::from_millis(self.config.navigation_timeout_ms);
        self.request(Command::Goto { url }, Some(limit)).await.map(|_| ())
    }

    async fn fill(&self, target: &Locator, value: &str) -> E2eResult<()> {
        self.request(Command::Fill { target, value }, None).await.map(|_| ())
    }

    async fn click(&self, target: &Locator) -> E2eResult<()> {
        self.request(Command::Click { target }, None).await.map(|_| ())
    }

    async fn press(&self, target: Option<&Locator>, key: &str) -> E2eResult<()> {
        self.request(Command::Press { target, key }, None).await.map(|_| ())
    }

    async fn wait_for(&self, target: &Locator, state: WaitState, limit: Option<Duration>) -> E2eResult<()> {
        let timeout_ms = millis(limit);
        self.request(Command::WaitFor { target, state, timeout_ms }, limit)
            .await
            .map(|_| ())
    }

    async fn wait_for_url(&self, pattern: &str, limit: Option<Duration>) -> E2eResult<()> {
        let timeout_ms = millis(limit);
        self.request(Command::WaitForUrl { pattern, timeout_ms }, limit)
            .await
            .map(|_| ())
    }

    async fn count(&self, target: &Locator) -> E2eResult<usize> {
        let value = self.request(Command::Count { target }, None).await?;
        decode("count", value)
    }

    async fn text(&self, target: &Locator) -> E2eResult<String> {
        let value = self.request(Command::Text { target }, None).await?;
        decode("text", value)
    }

    async fn current_url(&self) -> E2eResult<String> {
        let value = self.request(Command::Url, None).await?;
        decode("url", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let target = Locator::label("Email Address");
        let line = serde_json::to_value(Request {
            id: 7,
            command: Command::Fill {
                target: &target,
                value: "a@b.c",
            },
        })
        .unwrap();
        assert_eq!(
            line,
            serde_json::json!({
                "id": 7,
                "cmd": "fill",
                "target": { "label": "Email Address" },
                "value": "a@b.c"
            })
        );

        let ping = serde_json::to_value(Request { id: 1, command: Command::Ping }).unwrap();
        assert_eq!(ping, serde_json::json!({ "id": 1, "cmd": "ping" }));
    }

    #[test]
    fn test_wait_for_wire_format() {
        let target = Locator::role_with_text("listitem", "Milk");
        let line = serde_json::to_value(Request {
            id: 3,
            command: Command::WaitFor {
                target: &target,
                state: WaitState::Detached,
                timeout_ms: Some(5000),
            },
        })
        .unwrap();
        assert_eq!(line["cmd"], "wait_for");
        assert_eq!(line["state"], "detached");
        assert_eq!(line["timeout_ms"], 5000);
    }

    #[test]
    fn test_reply_parsing() {
        let ok: Reply = serde_json::from_str(r#"{"id":4,"ok":true,"value":3}"#).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.value, serde_json::json!(3));

        let ready: Reply = serde_json::from_str(r#"{"ready":true}"#).unwrap();
        assert_eq!(ready.ready, Some(true));
        assert_eq!(ready.id, None);

        let failed: Reply = serde_json::from_str(r#"{"id":5,"ok":false,"error":"Timeout 20000ms exceeded"}"#).unwrap();
        assert!(!failed.ok);
        assert_eq!(failed.error.as_deref(), Some("Timeout 20000ms exceeded"));
    }

    #[tokio::test]
    async fn test_stale_replies_are_skipped() {
        let input: &[u8] =
            b"{\"id\":1,\"ok\":true}\nbrowser log line\n{\"id\":2,\"ok\":true,\"value\":\"/todos\"}\n";
        let mut lines = BufReader::new(input).lines();

        let reply = await_reply(&mut lines, 2).await.unwrap();
        assert_eq!(reply.id, Some(2));
        assert_eq!(reply.value, serde_json::json!("/todos"));

        // Stream ends before the reply arrives
        assert!(matches!(await_reply(&mut lines, 3).await, Err(E2eError::BridgeClosed)));
    }

    #[tokio::test]
    async fn test_stalled_write_does_not_complete() {
        // Nobody reads the other end, so the line never fits
        let (mut stdin, _stdout) = tokio::io::duplex(8);
        let line = format!("{}\n", "x".repeat(64));
        let sent = timeout(Duration::from_millis(50), send_line(&mut stdin, &line)).await;
        assert!(sent.is_err());
    }

    #[test]
    fn test_bridge_config_env() {
        let mut config = ProofshotConfig::default();
        config.browser.name = BrowserKind::Firefox;
        let bridge = BridgeConfig::from_config(&config);
        let json = serde_json::to_value(&bridge).unwrap();
        assert_eq!(json["browser"], "firefox");
        assert_eq!(json["base_url"], "http://localhost:3000");
        assert!(json.get("node_modules").is_none());
        assert_eq!(bridge.default_limit(), Duration::from_millis(20000));

        let webkit = bridge.with_browser(BrowserKind::Webkit);
        assert_eq!(serde_json::to_value(&webkit).unwrap()["browser"], "webkit");
    }

    #[test]
    fn test_script_handles_every_command() {
        for cmd in [
            "ping", "goto", "fill", "click", "press", "wait_for", "wait_for_url", "count", "text",
            "url", "screenshot", "close",
        ] {
            assert!(BRIDGE_SCRIPT.contains(&format!("{}: async", cmd)), "missing handler {}", cmd);
        }
    }
}
