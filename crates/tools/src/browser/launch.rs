//! Browser process discovery and launch.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::info;
use webcell_core::{Error, Result};

/// Supported browser engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserEngine {
    Chrome,
    Edge,
    Firefox,
}

impl BrowserEngine {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "firefox" | "ff" => Self::Firefox,
            "edge" | "msedge" => Self::Edge,
            _ => Self::Chrome,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "edge",
            Self::Firefox => "firefox",
        }
    }
}

/// A launched browser process with its remote debugging port.
pub struct LaunchedBrowser {
    pub engine: BrowserEngine,
    pub debug_port: u16,
    /// Browser-level WebSocket endpoint from `/json/version`.
    pub browser_ws_url: String,
    pub process: Child,
}

/// Options for [`launch`].
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub engine: BrowserEngine,
    /// Explicit executable; discovered when `None`.
    pub binary: Option<PathBuf>,
    pub user_data_dir: PathBuf,
    pub headless: bool,
}

pub async fn launch(opts: &LaunchOptions) -> Result<LaunchedBrowser> {
    let browser_path = match &opts.binary {
        Some(p) => p.display().to_string(),
        None => find_browser_binary(opts.engine).ok_or_else(|| {
            Error::NotFound(format!("{} not found. Please install it.", opts.engine.name()))
        })?,
    };

    std::fs::create_dir_all(&opts.user_data_dir)?;

    let debug_port = find_free_port().await?;
    let args = build_browser_args(opts.engine, debug_port, &opts.user_data_dir, !opts.headless);

    info!(
        port = debug_port,
        headless = opts.headless,
        browser = opts.engine.name(),
        binary = %browser_path,
        "Launching browser"
    );

    let process = Command::new(&browser_path)
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Browser(format!("Failed to launch {}: {}", opts.engine.name(), e)))?;

    let browser_ws_url = wait_for_cdp_ready(debug_port, Duration::from_secs(15)).await?;

    Ok(LaunchedBrowser {
        engine: opts.engine,
        debug_port,
        browser_ws_url,
        process,
    })
}

/// Build browser-specific command line arguments.
fn build_browser_args(engine: BrowserEngine, debug_port: u16, user_data_dir: &Path, headed: bool) -> Vec<String> {
    match engine {
        BrowserEngine::Firefox => {
            let mut args = vec![
                "--remote-debugging-port".to_string(),
                debug_port.to_string(),
                "--profile".to_string(),
                user_data_dir.display().to_string(),
                "--no-remote".to_string(),
            ];
            if !headed {
                args.push("--headless".to_string());
            }
            args.push("about:blank".to_string());
            args
        }
        BrowserEngine::Chrome | BrowserEngine::Edge => {
            let mut args = vec![
                format!("--remote-debugging-port={}", debug_port),
                format!("--user-data-dir={}", user_data_dir.display()),
                "--no-first-run".to_string(),
                "--no-default-browser-check".to_string(),
                "--disable-background-networking".to_string(),
                "--disable-extensions".to_string(),
                "--disable-sync".to_string(),
                "--disable-translate".to_string(),
                "--password-store=basic".to_string(),
            ];
            if !headed {
                args.push("--headless=new".to_string());
            }
            args.push("--window-size=1280,720".to_string());
            args.push("about:blank".to_string());
            args
        }
    }
}

/// Find a browser binary on the system for the given engine.
pub fn find_browser_binary(engine: BrowserEngine) -> Option<String> {
    let candidates = match engine {
        BrowserEngine::Chrome => {
            if cfg!(target_os = "macos") {
                vec![
                    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                    "/Applications/Chromium.app/Contents/MacOS/Chromium",
                ]
            } else if cfg!(target_os = "linux") {
                vec![
                    "google-chrome", "google-chrome-stable",
                    "chromium", "chromium-browser",
                    "/usr/bin/google-chrome", "/usr/bin/chromium",
                ]
            } else {
                vec![
                    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                ]
            }
        }
        BrowserEngine::Edge => {
            if cfg!(target_os = "macos") {
                vec!["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"]
            } else if cfg!(target_os = "linux") {
                vec!["microsoft-edge", "microsoft-edge-stable", "/usr/bin/microsoft-edge"]
            } else {
                vec![
                    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
                ]
            }
        }
        BrowserEngine::Firefox => {
            if cfg!(target_os = "macos") {
                vec!["/Applications/Firefox.app/Contents/MacOS/firefox"]
            } else if cfg!(target_os = "linux") {
                vec!["firefox", "/usr/bin/firefox"]
            } else {
                vec![r"C:\Program Files\Mozilla Firefox\firefox.exe"]
            }
        }
    };

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

/// List all available browser engines on the system.
pub fn list_available_browsers() -> Vec<(BrowserEngine, String)> {
    [BrowserEngine::Chrome, BrowserEngine::Edge, BrowserEngine::Firefox]
        .into_iter()
        .filter_map(|engine| find_browser_binary(engine).map(|path| (engine, path)))
        .collect()
}

async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Poll `/json/version` until the debugging endpoint answers.
async fn wait_for_cdp_ready(port: u16, timeout: Duration) -> Result<String> {
    let start = Instant::now();
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Timeout(format!(
                "browser CDP endpoint not ready after {}s on port {}",
                timeout.as_secs(),
                port
            )));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// `(targetId, webSocketDebuggerUrl)` of every page target.
pub async fn list_page_targets(port: u16) -> Result<Vec<(String, String)>> {
    let url = format!("http://127.0.0.1:{}/json/list", port);
    let targets: Vec<Value> = reqwest::get(&url)
        .await
        .map_err(|e| Error::Http(e.to_string()))?
        .json()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;
    Ok(page_targets(&targets))
}

fn page_targets(targets: &[Value]) -> Vec<(String, String)> {
    targets
        .iter()
        .filter(|t| t.get("type").and_then(|v| v.as_str()) == Some("page"))
        .filter_map(|t| {
            let id = t.get("id").or_else(|| t.get("targetId"))?.as_str()?;
            let ws = t.get("webSocketDebuggerUrl")?.as_str()?;
            Some((id.to_string(), ws.to_string()))
        })
        .collect()
}

/// Resolve a targetId to its WebSocket debugger URL, retrying while the
/// target registers.
pub async fn get_target_ws_url(port: u16, target_id: &str) -> Result<String> {
    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let targets = match list_page_targets(port).await {
            Ok(t) => t,
            Err(_) => continue,
        };
        if let Some((_, ws)) = targets.into_iter().find(|(id, _)| id == target_id) {
            return Ok(ws);
        }
    }
    Err(Error::Browser(format!(
        "No WebSocket URL found for targetId '{}' after retries",
        target_id
    )))
}
