//! Chrome DevTools backend for the driver traits.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use webcell_core::{BrowserConfig, Error, Paths, Result};

use super::cdp::CdpClient;
use super::driver::{BrowserDriver, DownloadEvent, FileChooser, NodeId, PageDriver, RawElement, ReadyState};
use super::launch::{self, BrowserEngine, LaunchOptions};
use super::snapshot::{canonical_role, parse_ax_candidates, BoundingBox};

/// Attributes carried into the snapshot. Everything else is noise for the
/// decision process.
const KEPT_ATTRIBUTES: &[&str] = &[
    "id", "name", "type", "href", "value", "placeholder", "title", "alt",
    "aria-label", "aria-expanded", "aria-checked", "checked", "multiple",
    "role", "accept",
];

const IS_VISIBLE_JS: &str = "function() { \
    const s = window.getComputedStyle(this); \
    return s.visibility !== 'hidden' && s.display !== 'none' && Number(s.opacity) !== 0; }";

const CHECK_JS: &str = "function() { \
    if (!this.checked) { this.click(); } \
    return !!this.checked; }";

const SELECT_OPTIONS_JS: &str = "function(labels) { \
    if (this.tagName !== 'SELECT') { throw new Error('Element is not a <select> element'); } \
    const picked = []; \
    for (const o of this.options) { \
        const hit = labels.includes(o.label) || labels.includes(o.text.trim()); \
        o.selected = hit && (this.multiple || picked.length === 0); \
        if (o.selected) { picked.push(o.label); } \
    } \
    this.dispatchEvent(new Event('input', { bubbles: true })); \
    this.dispatchEvent(new Event('change', { bubbles: true })); \
    return picked; }";

/// Per-page settings shared by every page of a browser.
#[derive(Debug, Clone)]
struct PageSettings {
    load_timeout: Duration,
    /// Downloads land here under their guid before being saved.
    staging_dir: PathBuf,
}

pub struct CdpBrowser {
    engine: BrowserEngine,
    debug_port: u16,
    client: CdpClient,
    process: Mutex<Child>,
    settings: PageSettings,
}

impl CdpBrowser {
    /// Launch a browser according to `config` and connect to it.
    pub async fn launch(config: &BrowserConfig, paths: &Paths) -> Result<Self> {
        let engine = BrowserEngine::parse(&config.browser);
        let user_data_dir = config
            .user_data_dir
            .clone()
            .unwrap_or_else(|| paths.profiles_dir().join(engine.name()));

        let launched = launch::launch(&LaunchOptions {
            engine,
            binary: config.browser_instance_dir.clone(),
            user_data_dir,
            headless: config.headless,
        })
        .await?;

        let client = CdpClient::connect(&launched.browser_ws_url).await?;
        let staging_dir = paths
            .workspace()
            .join("staging")
            .join(launched.debug_port.to_string());
        std::fs::create_dir_all(&staging_dir)?;

        info!(browser = engine.name(), port = launched.debug_port, "Browser connected");

        Ok(Self {
            engine,
            debug_port: launched.debug_port,
            client,
            process: Mutex::new(launched.process),
            settings: PageSettings {
                load_timeout: Duration::from_millis(config.load_timeout_ms),
                staging_dir,
            },
        })
    }

    pub fn engine(&self) -> BrowserEngine {
        self.engine
    }
}

#[async_trait]
impl BrowserDriver for CdpBrowser {
    async fn initial_page(&self) -> Result<Arc<dyn PageDriver>> {
        let mut targets = Vec::new();
        for attempt in 0..10 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            targets = launch::list_page_targets(self.debug_port).await.unwrap_or_default();
            if !targets.is_empty() {
                break;
            }
        }
        let (target_id, ws_url) = targets
            .into_iter()
            .next()
            .ok_or_else(|| Error::Browser("No page target found after retries".to_string()))?;
        let page = CdpPage::attach(target_id, &ws_url, self.settings.clone()).await?;
        Ok(Arc::new(page))
    }

    async fn new_page(&self) -> Result<Arc<dyn PageDriver>> {
        let target_id = self.client.create_target("about:blank").await?;
        let ws_url = launch::get_target_ws_url(self.debug_port, &target_id).await?;
        let page = CdpPage::attach(target_id, &ws_url, self.settings.clone()).await?;
        Ok(Arc::new(page))
    }

    async fn shutdown(&self) -> Result<()> {
        if let Err(e) = self.client.send_command("Browser.close", json!({})).await {
            debug!("CDP Browser.close failed (may already be closed): {}", e);
        }
        let mut process = self.process.lock().await;
        let _ = process.kill().await;
        if let Err(e) = std::fs::remove_dir_all(&self.settings.staging_dir) {
            debug!(error = %e, "Could not remove download staging dir");
        }
        Ok(())
    }
}

/// One page target with its own CDP connection.
pub struct CdpPage {
    target_id: String,
    client: CdpClient,
    settings: PageSettings,
    /// Download guid -> last reported state.
    downloads: Arc<Mutex<HashMap<String, String>>>,
    _progress_task: tokio::task::JoinHandle<()>,
}

impl CdpPage {
    async fn attach(target_id: String, ws_url: &str, settings: PageSettings) -> Result<Self> {
        let client = CdpClient::connect(ws_url).await?;
        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;
        client.enable_domain("DOM").await?;
        client.enable_domain("Accessibility").await?;
        client.set_download_behavior(&settings.staging_dir).await?;

        let downloads: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));
        let mut progress = client.subscribe_event("Browser.downloadProgress").await;
        let tracked = downloads.clone();
        let progress_task = tokio::spawn(async move {
            while let Some(params) = progress.recv().await {
                let guid = params.get("guid").and_then(|v| v.as_str()).unwrap_or_default();
                let state = params.get("state").and_then(|v| v.as_str()).unwrap_or_default();
                if !guid.is_empty() {
                    tracked.lock().await.insert(guid.to_string(), state.to_string());
                }
            }
        });

        debug!(target = %target_id, "Attached to page target");

        Ok(Self {
            target_id,
            client,
            settings,
            downloads,
            _progress_task: progress_task,
        })
    }

    async fn raw_element(&self, backend_node_id: i64, role: &str, name: &str) -> Result<Option<RawElement>> {
        let node = self.client.describe_node(backend_node_id).await?;
        let tag = node
            .get("localName")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let attributes = kept_attributes(&node);
        if canonical_role(role, &tag, &attributes).is_none() {
            return Ok(None);
        }

        // Elements without layout have no box model.
        let bounding_box = match self.client.get_box_model(backend_node_id).await {
            Ok(quad) => BoundingBox::from_quad(&quad),
            Err(_) => None,
        };
        let visible = match bounding_box {
            Some(_) => {
                let object_id = self.client.resolve_node(backend_node_id).await?;
                self.client
                    .call_function_on(&object_id, IS_VISIBLE_JS, vec![])
                    .await?
                    .as_bool()
                    .unwrap_or(false)
            }
            None => false,
        };

        Ok(Some(RawElement {
            node_id: backend_node_id,
            tag,
            role: role.to_string(),
            name: name.to_string(),
            bounding_box,
            attributes,
            visible,
        }))
    }

    async fn center_of(&self, node: NodeId) -> Result<(f64, f64)> {
        let quad = self.client.get_box_model(node).await?;
        BoundingBox::from_quad(&quad)
            .map(|b| b.center())
            .ok_or_else(|| Error::Browser(format!("node {} has no box model", node)))
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    fn id(&self) -> &str {
        &self.target_id
    }

    async fn ready_state(&self) -> Result<ReadyState> {
        let state = self.client.evaluate_js("document.readyState").await?;
        let state = state.as_str().unwrap_or_default();
        ReadyState::parse(state)
            .ok_or_else(|| Error::Browser(format!("unexpected document.readyState '{}'", state)))
    }

    async fn wait_for_load(&self) -> Result<()> {
        let start = Instant::now();
        loop {
            if let Ok(ReadyState::Complete) = self.ready_state().await {
                return Ok(());
            }
            if start.elapsed() > self.settings.load_timeout {
                return Err(Error::Timeout(format!(
                    "page {} did not finish loading within {}ms",
                    self.target_id,
                    self.settings.load_timeout.as_millis()
                )));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn elements(&self) -> Result<Vec<RawElement>> {
        let tree = self.client.get_accessibility_tree().await?;
        let mut out = Vec::new();
        for candidate in parse_ax_candidates(&tree) {
            // Cheap role filter before the per-node round trips; file inputs
            // report as buttons so they survive it.
            if canonical_role(&candidate.role, "", &HashMap::new()).is_none() {
                continue;
            }
            match self
                .raw_element(candidate.backend_node_id, &candidate.role, &candidate.name)
                .await
            {
                Ok(Some(el)) => out.push(el),
                Ok(None) => {}
                Err(e) => debug!(node = candidate.backend_node_id, error = %e, "Skipping node"),
            }
        }
        Ok(out)
    }

    async fn is_attached(&self, node: NodeId) -> Result<bool> {
        let object_id = match self.client.resolve_node(node).await {
            Ok(id) => id,
            Err(_) => return Ok(false),
        };
        let connected = self
            .client
            .call_function_on(&object_id, "function() { return this.isConnected; }", vec![])
            .await?;
        Ok(connected.as_bool().unwrap_or(false))
    }

    async fn scroll_into_view(&self, node: NodeId) -> Result<()> {
        self.client.scroll_into_view(node).await
    }

    async fn click(&self, node: NodeId) -> Result<()> {
        let (x, y) = match self.center_of(node).await {
            Ok(c) => c,
            Err(_) => {
                // No layout box: fall back to a DOM click
                let object_id = self.client.resolve_node(node).await?;
                self.client
                    .call_function_on(&object_id, "function() { this.click(); }", vec![])
                    .await?;
                return Ok(());
            }
        };
        self.client.dispatch_mouse_event("mouseMoved", x, y, "none", 0).await?;
        self.client.dispatch_mouse_event("mousePressed", x, y, "left", 1).await?;
        self.client.dispatch_mouse_event("mouseReleased", x, y, "left", 1).await?;
        Ok(())
    }

    async fn check(&self, node: NodeId) -> Result<()> {
        let object_id = self.client.resolve_node(node).await?;
        let checked = self.client.call_function_on(&object_id, CHECK_JS, vec![]).await?;
        if checked.as_bool() != Some(true) {
            return Err(Error::Browser(format!("element {} did not become checked", node)));
        }
        Ok(())
    }

    async fn press_on(&self, node: NodeId, keys: &str) -> Result<()> {
        self.client.focus(node).await?;
        self.press_key(keys).await
    }

    async fn type_text(&self, node: NodeId, text: &str, delay: Duration) -> Result<()> {
        self.client.focus(node).await?;
        for ch in text.chars() {
            let (key, code) = match ch {
                '\n' => ("Enter".to_string(), "Enter".to_string()),
                '\t' => ("Tab".to_string(), "Tab".to_string()),
                c => (c.to_string(), String::new()),
            };
            self.client.dispatch_key_event("keyDown", &key, &code, 0).await?;
            self.client.dispatch_key_event("keyUp", &key, &code, 0).await?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    async fn select_options(&self, node: NodeId, labels: &[String]) -> Result<Vec<String>> {
        let object_id = self.client.resolve_node(node).await?;
        let picked = self
            .client
            .call_function_on(&object_id, SELECT_OPTIONS_JS, vec![json!(labels)])
            .await?;
        Ok(picked
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default())
    }

    async fn click_for_file_chooser(&self, node: NodeId, timeout: Duration) -> Result<FileChooser> {
        let mut opened = self.client.subscribe_event("Page.fileChooserOpened").await;
        self.client.set_intercept_file_chooser(true).await?;

        let result = async {
            self.click(node).await?;
            CdpClient::next_event(&mut opened, "file chooser", timeout).await
        }
        .await;

        if let Err(e) = self.client.set_intercept_file_chooser(false).await {
            warn!(error = %e, "Failed to disable file chooser interception");
        }

        let params = result?;
        Ok(FileChooser {
            multiple: params.get("mode").and_then(|v| v.as_str()) == Some("selectMultiple"),
            input: params.get("backendNodeId").and_then(|v| v.as_i64()),
        })
    }

    async fn set_input_files(&self, chooser: &FileChooser, node: NodeId, files: &[PathBuf]) -> Result<()> {
        let files = files.iter().map(|f| f.display().to_string()).collect();
        self.client
            .set_file_input_files(files, chooser.input.unwrap_or(node))
            .await
    }

    async fn click_for_download(&self, node: NodeId, timeout: Duration) -> Result<DownloadEvent> {
        let mut begun = self.client.subscribe_event("Browser.downloadWillBegin").await;
        self.click(node).await?;
        let params = CdpClient::next_event(&mut begun, "download", timeout).await?;
        Ok(download_event(&params))
    }

    async fn save_download(&self, download: &DownloadEvent, path: &Path) -> Result<()> {
        let start = Instant::now();
        loop {
            let state = self.downloads.lock().await.get(&download.guid).cloned();
            match state.as_deref() {
                Some("completed") => break,
                Some("canceled") => {
                    return Err(Error::Download(format!(
                        "download of {} was canceled",
                        download.suggested_filename
                    )))
                }
                _ => {}
            }
            if start.elapsed() > self.settings.load_timeout {
                return Err(Error::Timeout(format!(
                    "download of {} did not complete",
                    download.suggested_filename
                )));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let staged = self.settings.staging_dir.join(&download.guid);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if std::fs::rename(&staged, path).is_err() {
            // Staging and target may sit on different filesystems.
            std::fs::copy(&staged, path)?;
            std::fs::remove_file(&staged)?;
        }
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.client.navigate(url).await?;
        self.wait_for_load().await
    }

    async fn go_back(&self) -> Result<()> {
        let history = self
            .client
            .send_command("Page.getNavigationHistory", json!({}))
            .await?;
        if let Some(entry_id) = previous_history_entry(&history) {
            self.client
                .send_command("Page.navigateToHistoryEntry", json!({"entryId": entry_id}))
                .await?;
        }
        self.wait_for_load().await
    }

    async fn press_key(&self, keys: &str) -> Result<()> {
        let (key, code, modifiers) = parse_key_spec(keys);
        self.client.dispatch_key_event("keyDown", &key, &code, modifiers).await?;
        self.client.dispatch_key_event("keyUp", &key, &code, modifiers).await?;
        Ok(())
    }

    async fn mouse_wheel(&self, delta_x: i64, delta_y: i64) -> Result<()> {
        let viewport = self
            .client
            .evaluate_js("[window.innerWidth / 2, window.innerHeight / 2]")
            .await?;
        let x = viewport.get(0).and_then(|v| v.as_f64()).unwrap_or(0.0);
        let y = viewport.get(1).and_then(|v| v.as_f64()).unwrap_or(0.0);
        self.client.dispatch_mouse_wheel(x, y, delta_x, delta_y).await
    }

    async fn content(&self) -> Result<String> {
        let html = self
            .client
            .evaluate_js("document.documentElement.outerHTML")
            .await?;
        Ok(html.as_str().unwrap_or_default().to_string())
    }

    async fn bring_to_front(&self) -> Result<()> {
        self.client.send_command("Page.bringToFront", json!({})).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.send_command("Page.close", json!({})).await?;
        Ok(())
    }
}

fn kept_attributes(node: &Value) -> HashMap<String, String> {
    let flat = node
        .get("attributes")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    flat.chunks(2)
        .filter_map(|pair| {
            let name = pair.first()?.as_str()?;
            let value = pair.get(1)?.as_str()?;
            KEPT_ATTRIBUTES
                .contains(&name)
                .then(|| (name.to_string(), value.to_string()))
        })
        .collect()
}

fn download_event(params: &Value) -> DownloadEvent {
    let field = |k: &str| params.get(k).and_then(|v| v.as_str()).unwrap_or_default().to_string();
    DownloadEvent {
        guid: field("guid"),
        suggested_filename: field("suggestedFilename"),
        url: field("url"),
    }
}

fn previous_history_entry(history: &Value) -> Option<i64> {
    let current = history.get("currentIndex")?.as_u64()? as usize;
    if current == 0 {
        return None;
    }
    history
        .get("entries")?
        .as_array()?
        .get(current - 1)?
        .get("id")?
        .as_i64()
}

/// Parse a key specification like "Enter", "Control+A" or "Shift+Tab" into
/// `(key, code, modifiers)`. Modifier bits follow CDP: Alt=1, Ctrl=2,
/// Meta=4, Shift=8.
fn parse_key_spec(spec: &str) -> (String, String, i32) {
    let parts: Vec<&str> = spec.split('+').collect();
    let mut modifiers = 0i32;
    let mut main_key = spec.to_string();

    if parts.len() > 1 {
        for &part in &parts[..parts.len() - 1] {
            match part.trim().to_lowercase().as_str() {
                "ctrl" | "control" => modifiers |= 2,
                "alt" | "option" => modifiers |= 1,
                "shift" => modifiers |= 8,
                "meta" | "cmd" | "command" => modifiers |= 4,
                _ => {}
            }
        }
        main_key = parts.last().map(|k| k.trim()).unwrap_or(spec).to_string();
    }

    let (key, code) = match main_key.as_str() {
        "Enter" | "Return" => ("Enter", "Enter"),
        "Tab" => ("Tab", "Tab"),
        "Escape" | "Esc" => ("Escape", "Escape"),
        "Backspace" => ("Backspace", "Backspace"),
        "Delete" => ("Delete", "Delete"),
        "ArrowUp" | "Up" => ("ArrowUp", "ArrowUp"),
        "ArrowDown" | "Down" => ("ArrowDown", "ArrowDown"),
        "ArrowLeft" | "Left" => ("ArrowLeft", "ArrowLeft"),
        "ArrowRight" | "Right" => ("ArrowRight", "ArrowRight"),
        "Home" => ("Home", "Home"),
        "End" => ("End", "End"),
        "PageUp" => ("PageUp", "PageUp"),
        "PageDown" => ("PageDown", "PageDown"),
        "Space" | " " => (" ", "Space"),
        _ => {
            let mut chars = main_key.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => {
                    (c.to_string(), format!("Key{}", c.to_ascii_uppercase()), modifiers)
                }
                (Some(c), None) if c.is_ascii_digit() => (c.to_string(), format!("Digit{}", c), modifiers),
                _ => (main_key.clone(), main_key.clone(), modifiers),
            };
        }
    };

    (key.to_string(), code.to_string(), modifiers)
}
