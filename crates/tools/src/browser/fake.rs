//! In-memory driver for tests. Records every effect it receives.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webcell_core::{Error, Result};

use super::driver::{BrowserDriver, DownloadEvent, FileChooser, NodeId, PageDriver, RawElement, ReadyState};
use super::snapshot::BoundingBox;
use crate::clipboard::ClipboardProvider;
use crate::download::Fetcher;

type FailFn = Box<dyn Fn() -> Error + Send + Sync>;

pub fn element(node_id: NodeId, tag: &str, role: &str, name: &str) -> RawElement {
    RawElement {
        node_id,
        tag: tag.to_string(),
        role: role.to_string(),
        name: name.to_string(),
        bounding_box: Some(BoundingBox::new(10.0, 20.0 * node_id as f64, 120.0, 18.0)),
        attributes: HashMap::new(),
        visible: true,
    }
}

pub fn with_attr(mut el: RawElement, key: &str, value: &str) -> RawElement {
    el.attributes.insert(key.to_string(), value.to_string());
    el
}

pub fn button(node_id: NodeId, name: &str) -> RawElement {
    element(node_id, "button", "button", name)
}

pub fn link(node_id: NodeId, name: &str) -> RawElement {
    with_attr(element(node_id, "a", "link", name), "href", "https://example.test/")
}

pub fn textbox(node_id: NodeId, name: &str) -> RawElement {
    with_attr(element(node_id, "input", "textbox", name), "type", "text")
}

pub fn checkbox(node_id: NodeId, name: &str) -> RawElement {
    with_attr(element(node_id, "input", "checkbox", name), "type", "checkbox")
}

pub fn radio(node_id: NodeId, name: &str) -> RawElement {
    with_attr(element(node_id, "input", "radio", name), "type", "radio")
}

pub fn select(node_id: NodeId, name: &str) -> RawElement {
    element(node_id, "select", "combobox", name)
}

pub fn file_input(node_id: NodeId, name: &str) -> RawElement {
    with_attr(element(node_id, "input", "button", name), "type", "file")
}

#[derive(Default)]
struct PageState {
    ready: Option<ReadyState>,
    elements: Vec<RawElement>,
    detached: HashSet<NodeId>,
    options: HashMap<NodeId, Vec<String>>,
    html: String,
    download: Option<(DownloadEvent, Vec<u8>)>,
    chooser_multiple: bool,
    failures: HashMap<String, FailFn>,
    log: Vec<String>,
    closed: bool,
}

pub struct FakePage {
    id: String,
    state: Mutex<PageState>,
}

impl FakePage {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            state: Mutex::new(PageState::default()),
        }
    }

    pub fn set_elements(&self, elements: Vec<RawElement>) {
        self.state.lock().unwrap().elements = elements;
    }

    pub fn set_ready_state(&self, ready: ReadyState) {
        self.state.lock().unwrap().ready = Some(ready);
    }

    /// Mark a node as removed from the document.
    pub fn detach(&self, node: NodeId) {
        self.state.lock().unwrap().detached.insert(node);
    }

    pub fn set_options(&self, node: NodeId, labels: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .options
            .insert(node, labels.iter().map(|s| s.to_string()).collect());
    }

    pub fn set_html(&self, html: &str) {
        self.state.lock().unwrap().html = html.to_string();
    }

    /// The next `click_for_download` yields this download.
    pub fn set_download(&self, suggested_filename: &str, url: &str, body: &[u8]) {
        let event = DownloadEvent {
            guid: format!("guid-{}", suggested_filename),
            suggested_filename: suggested_filename.to_string(),
            url: url.to_string(),
        };
        self.state.lock().unwrap().download = Some((event, body.to_vec()));
    }

    pub fn set_chooser_multiple(&self, multiple: bool) {
        self.state.lock().unwrap().chooser_multiple = multiple;
    }

    /// Make the named operation fail with the error built by `make`.
    pub fn fail_on<F>(&self, op: &str, make: F)
    where
        F: Fn() -> Error + Send + Sync + 'static,
    {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op.to_string(), Box::new(make));
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Record `entry` for `op`, or fail if a failure is registered for it.
    fn record(&self, op: &str, entry: String) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(make) = state.failures.get(op) {
            return Err(make());
        }
        state.log.push(entry);
        Ok(())
    }
}

#[async_trait]
impl PageDriver for FakePage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn ready_state(&self) -> Result<ReadyState> {
        Ok(self.state.lock().unwrap().ready.unwrap_or(ReadyState::Complete))
    }

    async fn wait_for_load(&self) -> Result<()> {
        self.record("wait_for_load", "wait_for_load".to_string())
    }

    async fn elements(&self) -> Result<Vec<RawElement>> {
        self.record("elements", "elements".to_string())?;
        Ok(self.state.lock().unwrap().elements.clone())
    }

    async fn is_attached(&self, node: NodeId) -> Result<bool> {
        Ok(!self.state.lock().unwrap().detached.contains(&node))
    }

    async fn scroll_into_view(&self, node: NodeId) -> Result<()> {
        self.record("scroll_into_view", format!("scroll_into_view:{}", node))
    }

    async fn click(&self, node: NodeId) -> Result<()> {
        self.record("click", format!("click:{}", node))
    }

    async fn check(&self, node: NodeId) -> Result<()> {
        self.record("check", format!("check:{}", node))
    }

    async fn press_on(&self, node: NodeId, keys: &str) -> Result<()> {
        self.record("press_on", format!("press_on:{}:{}", node, keys))
    }

    async fn type_text(&self, node: NodeId, text: &str, _delay: Duration) -> Result<()> {
        self.record("type_text", format!("type_text:{}:{}", node, text))
    }

    async fn select_options(&self, node: NodeId, labels: &[String]) -> Result<Vec<String>> {
        self.record("select_options", format!("select_options:{}:{}", node, labels.join(",")))?;
        let state = self.state.lock().unwrap();
        let options = state
            .options
            .get(&node)
            .ok_or_else(|| Error::Browser("Element is not a <select> element".to_string()))?;
        Ok(options.iter().filter(|o| labels.contains(o)).cloned().collect())
    }

    async fn click_for_file_chooser(&self, node: NodeId, _timeout: Duration) -> Result<FileChooser> {
        self.record("click_for_file_chooser", format!("click_for_file_chooser:{}", node))?;
        Ok(FileChooser {
            multiple: self.state.lock().unwrap().chooser_multiple,
            input: None,
        })
    }

    async fn set_input_files(&self, chooser: &FileChooser, node: NodeId, files: &[PathBuf]) -> Result<()> {
        let names: Vec<String> = files
            .iter()
            .map(|f| f.file_name().unwrap_or_default().to_string_lossy().to_string())
            .collect();
        self.record(
            "set_input_files",
            format!("set_input_files:{}:{}", chooser.input.unwrap_or(node), names.join(",")),
        )
    }

    async fn click_for_download(&self, node: NodeId, timeout: Duration) -> Result<DownloadEvent> {
        self.record("click_for_download", format!("click_for_download:{}", node))?;
        self.state
            .lock()
            .unwrap()
            .download
            .as_ref()
            .map(|(event, _)| event.clone())
            .ok_or_else(|| Error::Timeout(format!("no download within {}ms", timeout.as_millis())))
    }

    async fn save_download(&self, download: &DownloadEvent, path: &Path) -> Result<()> {
        self.record("save_download", format!("save_download:{}", path.display()))?;
        let body = self
            .state
            .lock()
            .unwrap()
            .download
            .as_ref()
            .filter(|(event, _)| event.guid == download.guid)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| Error::Download("unknown download".to_string()))?;
        std::fs::write(path, body)?;
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.record("goto", format!("goto:{}", url))
    }

    async fn go_back(&self) -> Result<()> {
        self.record("go_back", "go_back".to_string())
    }

    async fn press_key(&self, keys: &str) -> Result<()> {
        self.record("press_key", format!("press_key:{}", keys))
    }

    async fn mouse_wheel(&self, delta_x: i64, delta_y: i64) -> Result<()> {
        self.record("mouse_wheel", format!("mouse_wheel:{}:{}", delta_x, delta_y))
    }

    async fn content(&self) -> Result<String> {
        self.record("content", "content".to_string())?;
        Ok(self.state.lock().unwrap().html.clone())
    }

    async fn bring_to_front(&self) -> Result<()> {
        self.record("bring_to_front", "bring_to_front".to_string())
    }

    async fn close(&self) -> Result<()> {
        self.record("close", "close".to_string())?;
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

#[derive(Default)]
struct BrowserState {
    pages: Vec<Arc<FakePage>>,
    shut_down: bool,
}

/// Browser whose pages are named `page-0`, `page-1`, ... in creation order.
#[derive(Default)]
pub struct FakeBrowser {
    state: Mutex<BrowserState>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self, id: &str) -> Option<Arc<FakePage>> {
        self.state
            .lock()
            .unwrap()
            .pages
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().unwrap().shut_down
    }

    fn create(&self) -> Arc<FakePage> {
        let mut state = self.state.lock().unwrap();
        let page = Arc::new(FakePage::new(&format!("page-{}", state.pages.len())));
        state.pages.push(page.clone());
        page
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn initial_page(&self) -> Result<Arc<dyn PageDriver>> {
        let existing = self.state.lock().unwrap().pages.first().cloned();
        let page = existing.unwrap_or_else(|| self.create());
        Ok(page)
    }

    async fn new_page(&self) -> Result<Arc<dyn PageDriver>> {
        Ok(self.create())
    }

    async fn shutdown(&self) -> Result<()> {
        self.state.lock().unwrap().shut_down = true;
        Ok(())
    }
}

/// Fetcher serving canned bodies by URL.
#[derive(Default)]
pub struct FakeFetcher {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with(url: &str, body: &[u8]) -> Self {
        let mut fetcher = Self::default();
        fetcher.bodies.insert(url.to_string(), body.to_vec());
        fetcher
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Http(format!("404 Not Found: {}", url)))
    }
}

#[derive(Default)]
pub struct FakeClipboard {
    text: Mutex<Option<String>>,
}

impl ClipboardProvider for FakeClipboard {
    fn copy(&self, text: &str) -> Result<()> {
        *self.text.lock().unwrap() = Some(text.to_string());
        Ok(())
    }

    fn paste(&self) -> Result<String> {
        Ok(self.text.lock().unwrap().clone().unwrap_or_default())
    }
}
