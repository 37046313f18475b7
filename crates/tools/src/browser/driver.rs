//! Driver traits between the action layer and a concrete browser backend.
//!
//! The CDP backend in [`super::chrome`] implements these against a real
//! Chrome/Edge process; tests use an in-memory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use webcell_core::Result;

use super::snapshot::BoundingBox;

/// Backend identifier of a DOM node (CDP `backendNodeId`).
pub type NodeId = i64;

/// `document.readyState` of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "loading" => Some(Self::Loading),
            "interactive" => Some(Self::Interactive),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    pub fn is_ready(self) -> bool {
        !matches!(self, Self::Loading)
    }
}

/// A candidate element reported by the backend, before snapshot filtering.
#[derive(Debug, Clone)]
pub struct RawElement {
    pub node_id: NodeId,
    pub tag: String,
    /// Accessibility role as reported by the backend (not yet normalized).
    pub role: String,
    pub name: String,
    /// `None` when the element has no layout box.
    pub bounding_box: Option<BoundingBox>,
    pub attributes: HashMap<String, String>,
    pub visible: bool,
}

/// A download started by the page.
#[derive(Debug, Clone)]
pub struct DownloadEvent {
    pub guid: String,
    pub suggested_filename: String,
    pub url: String,
}

/// A file chooser opened by the page.
#[derive(Debug, Clone, Copy)]
pub struct FileChooser {
    pub multiple: bool,
    /// The `<input type=file>` backing the chooser, when it differs from the
    /// clicked element.
    pub input: Option<NodeId>,
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Stable identifier of the page for the lifetime of the session.
    fn id(&self) -> &str;

    async fn ready_state(&self) -> Result<ReadyState>;
    /// Suspend until the page reports `complete` or the load timeout elapses.
    async fn wait_for_load(&self) -> Result<()>;
    /// Candidate elements in document order.
    async fn elements(&self) -> Result<Vec<RawElement>>;
    async fn is_attached(&self, node: NodeId) -> Result<bool>;

    async fn scroll_into_view(&self, node: NodeId) -> Result<()>;
    async fn click(&self, node: NodeId) -> Result<()>;
    /// Put a checkbox or radio into the checked state.
    async fn check(&self, node: NodeId) -> Result<()>;
    /// Press a key combination with the element focused.
    async fn press_on(&self, node: NodeId, keys: &str) -> Result<()>;
    async fn type_text(&self, node: NodeId, text: &str, delay: Duration) -> Result<()>;
    /// Select options by label; returns the labels that were selected.
    async fn select_options(&self, node: NodeId, labels: &[String]) -> Result<Vec<String>>;
    /// Click the element and wait for the file chooser it opens.
    async fn click_for_file_chooser(&self, node: NodeId, timeout: Duration) -> Result<FileChooser>;
    async fn set_input_files(&self, chooser: &FileChooser, node: NodeId, files: &[PathBuf]) -> Result<()>;
    /// Click the element and wait for the download it triggers.
    async fn click_for_download(&self, node: NodeId, timeout: Duration) -> Result<DownloadEvent>;
    async fn save_download(&self, download: &DownloadEvent, path: &Path) -> Result<()>;

    async fn goto(&self, url: &str) -> Result<()>;
    async fn go_back(&self) -> Result<()>;
    async fn press_key(&self, keys: &str) -> Result<()>;
    async fn mouse_wheel(&self, delta_x: i64, delta_y: i64) -> Result<()>;
    /// Serialized HTML of the page.
    async fn content(&self) -> Result<String>;

    async fn bring_to_front(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// The page the browser started with.
    async fn initial_page(&self) -> Result<Arc<dyn PageDriver>>;
    async fn new_page(&self) -> Result<Arc<dyn PageDriver>>;
    async fn shutdown(&self) -> Result<()>;
}
