//! The context every action executes against.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use webcell_core::{BrowserConfig, Error, Paths, Result};

use super::driver::{DownloadEvent, FileChooser, NodeId, PageDriver};
use super::session::Session;
use super::snapshot::{ElementNode, PageSnapshot};
use crate::clipboard::{ClipboardProvider, SystemClipboard};
use crate::download::{Fetcher, HttpFetcher};
use crate::extract::{ContentExtractor, MainContentExtractor};

/// A live handle to the element behind one snapshot index.
#[derive(Clone)]
pub struct ElementHandle {
    page: Arc<dyn PageDriver>,
    node: NodeId,
    index: usize,
}

impl ElementHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn page(&self) -> &Arc<dyn PageDriver> {
        &self.page
    }

    pub async fn scroll_into_view(&self) -> Result<()> {
        self.page.scroll_into_view(self.node).await
    }

    pub async fn click(&self) -> Result<()> {
        self.page.click(self.node).await
    }

    pub async fn check(&self) -> Result<()> {
        self.page.check(self.node).await
    }

    pub async fn press(&self, keys: &str) -> Result<()> {
        self.page.press_on(self.node, keys).await
    }

    pub async fn type_text(&self, text: &str, delay: Duration) -> Result<()> {
        self.page.type_text(self.node, text, delay).await
    }

    pub async fn select_options(&self, labels: &[String]) -> Result<Vec<String>> {
        self.page.select_options(self.node, labels).await
    }

    pub async fn click_for_file_chooser(&self, timeout: Duration) -> Result<FileChooser> {
        self.page.click_for_file_chooser(self.node, timeout).await
    }

    pub async fn set_input_files(&self, chooser: &FileChooser, files: &[PathBuf]) -> Result<()> {
        self.page.set_input_files(chooser, self.node, files).await
    }

    pub async fn click_for_download(&self, timeout: Duration) -> Result<DownloadEvent> {
        self.page.click_for_download(self.node, timeout).await
    }
}

/// Session plus the process-wide collaborators actions depend on.
pub struct Context {
    session: Session,
    config: BrowserConfig,
    downloads_dir: PathBuf,
    uploads_dir: PathBuf,
    extractor: Arc<dyn ContentExtractor>,
    fetcher: Arc<dyn Fetcher>,
    clipboard: Arc<dyn ClipboardProvider>,
}

impl Context {
    pub fn new(session: Session, config: BrowserConfig, paths: &Paths) -> Self {
        let downloads_dir = config.downloads_dir(paths);
        let uploads_dir = config.uploads_dir(paths);
        Self {
            session,
            config,
            downloads_dir,
            uploads_dir,
            extractor: Arc::new(MainContentExtractor),
            fetcher: Arc::new(HttpFetcher::new()),
            clipboard: Arc::new(SystemClipboard),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn ClipboardProvider>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_downloads_dir(mut self, dir: PathBuf) -> Self {
        self.downloads_dir = dir;
        self
    }

    pub fn with_uploads_dir(mut self, dir: PathBuf) -> Self {
        self.uploads_dir = dir;
        self
    }

    pub fn get_current_page(&self) -> Result<Arc<dyn PageDriver>> {
        self.session.current_page()
    }

    /// Resolve an index of the snapshot in effect to its node and a live
    /// handle. The element must still be attached to the page.
    pub async fn get_element_by_index(&self, index: usize) -> Result<(Arc<ElementNode>, ElementHandle)> {
        let page = self.get_current_page()?;
        let snapshot = self.session.snapshot().ok_or_else(|| Error::IndexResolution {
            index,
            reason: "no snapshot has been taken since the last navigation or tab change".to_string(),
        })?;
        if snapshot.page_id() != page.id() {
            return Err(Error::IndexResolution {
                index,
                reason: "the snapshot belongs to another tab".to_string(),
            });
        }
        let (node, node_id) = match (snapshot.get(index), snapshot.handle(index)) {
            (Some(node), Some(node_id)) => (node.clone(), node_id),
            _ => {
                return Err(Error::IndexResolution {
                    index,
                    reason: format!("the snapshot has {} elements", snapshot.len()),
                })
            }
        };

        if !page.is_attached(node_id).await? {
            return Err(Error::StaleElement { index });
        }
        debug!(index, role = %node.role, name = %node.name, "Resolved element");

        Ok((node, ElementHandle { page, node: node_id, index }))
    }

    pub fn get_session(&self) -> &Session {
        &self.session
    }

    pub fn get_session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub async fn refresh_snapshot(&mut self) -> Result<&PageSnapshot> {
        self.session.refresh_snapshot().await
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn extractor(&self) -> &dyn ContentExtractor {
        self.extractor.as_ref()
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub fn clipboard(&self) -> &dyn ClipboardProvider {
        self.clipboard.as_ref()
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.session.shutdown().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::browser::fake::{self, FakeBrowser, FakeClipboard, FakeFetcher, FakePage};

    /// Context over a fake browser with directories in a temp dir.
    pub(crate) async fn fake_context(dir: &Path) -> (Arc<FakeBrowser>, Context) {
        let browser = Arc::new(FakeBrowser::new());
        let session = Session::start(browser.clone()).await.unwrap();
        let paths = Paths::with_base(dir.to_path_buf());
        let mut config = BrowserConfig::default();
        config.type_delay_ms = 0;
        let ctx = Context::new(session, config, &paths)
            .with_fetcher(Arc::new(FakeFetcher::default()))
            .with_clipboard(Arc::new(FakeClipboard::default()))
            .with_downloads_dir(dir.join("downloads"))
            .with_uploads_dir(dir.join("uploads"));
        (browser, ctx)
    }

    pub(crate) fn page0(browser: &FakeBrowser) -> Arc<FakePage> {
        browser.page("page-0").unwrap()
    }

    #[tokio::test]
    async fn test_resolve_before_snapshot_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (_, ctx) = fake_context(dir.path()).await;
        let Err(err) = ctx.get_element_by_index(0).await else {
            panic!("resolution without a snapshot succeeded");
        };
        assert!(matches!(err, Error::IndexResolution { index: 0, .. }));
    }

    #[tokio::test]
    async fn test_resolve_in_and_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let (browser, mut ctx) = fake_context(dir.path()).await;
        page0(&browser).set_elements(vec![
            fake::button(7, "Save"),
            fake::link(8, "Docs"),
            fake::textbox(9, "Search"),
        ]);
        ctx.refresh_snapshot().await.unwrap();

        let (node, handle) = ctx.get_element_by_index(1).await.unwrap();
        assert_eq!(node.name, "Docs");
        assert_eq!(handle.index(), 1);
        assert!(Arc::ptr_eq(&node, ctx.get_session().snapshot().unwrap().get(1).unwrap()));

        let Err(err) = ctx.get_element_by_index(3).await else {
            panic!("out-of-range index resolved");
        };
        assert!(matches!(err, Error::IndexResolution { index: 3, .. }));
    }

    #[tokio::test]
    async fn test_detached_element_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let (browser, mut ctx) = fake_context(dir.path()).await;
        page0(&browser).set_elements(vec![fake::button(1, "A"), fake::button(2, "B")]);
        ctx.refresh_snapshot().await.unwrap();

        page0(&browser).detach(2);
        let Err(err) = ctx.get_element_by_index(1).await else {
            panic!("detached element resolved");
        };
        assert!(matches!(err, Error::StaleElement { index: 1 }));
        assert!(ctx.get_element_by_index(0).await.is_ok());
    }

    #[tokio::test]
    async fn test_index_from_prior_snapshot_fails_after_tab_change() {
        let dir = tempfile::tempdir().unwrap();
        let (browser, mut ctx) = fake_context(dir.path()).await;
        page0(&browser).set_elements(vec![fake::button(1, "A")]);
        ctx.refresh_snapshot().await.unwrap();
        assert!(ctx.get_element_by_index(0).await.is_ok());

        ctx.get_session_mut().open_tab().await.unwrap();
        assert!(matches!(
            ctx.get_element_by_index(0).await,
            Err(Error::IndexResolution { .. })
        ));

        ctx.get_session_mut().switch_to(0).await.unwrap();
        assert!(matches!(
            ctx.get_element_by_index(0).await,
            Err(Error::IndexResolution { .. })
        ));

        ctx.refresh_snapshot().await.unwrap();
        assert!(ctx.get_element_by_index(0).await.is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_of_loading_page_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (browser, mut ctx) = fake_context(dir.path()).await;
        page0(&browser).set_ready_state(crate::browser::ReadyState::Loading);
        let err = ctx.refresh_snapshot().await.unwrap_err();
        assert!(matches!(err, Error::Snapshot(_)));
    }
}
