//! Browser session: the open pages, the current-page pointer, and the
//! snapshot in effect.

use std::sync::Arc;
use tracing::info;
use webcell_core::{Error, Result};

use super::driver::{BrowserDriver, PageDriver};
use super::snapshot::{build_snapshot, PageSnapshot};

/// Live browser state owned by one decision loop.
///
/// Pages are kept in open order. Every change of the current page drops the
/// snapshot, so indices from before the change no longer resolve.
pub struct Session {
    browser: Arc<dyn BrowserDriver>,
    pages: Vec<Arc<dyn PageDriver>>,
    current: Option<usize>,
    snapshot: Option<PageSnapshot>,
}

impl Session {
    /// Start a session on the browser's initial page.
    pub async fn start(browser: Arc<dyn BrowserDriver>) -> Result<Self> {
        let page = browser.initial_page().await?;
        Ok(Self {
            browser,
            pages: vec![page],
            current: Some(0),
            snapshot: None,
        })
    }

    pub fn pages(&self) -> &[Arc<dyn PageDriver>] {
        &self.pages
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_page(&self) -> Result<Arc<dyn PageDriver>> {
        self.current
            .and_then(|i| self.pages.get(i))
            .cloned()
            .ok_or(Error::NoActivePage)
    }

    pub fn snapshot(&self) -> Option<&PageSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn invalidate_snapshot(&mut self) {
        self.snapshot = None;
    }

    /// Rebuild the snapshot of the current page.
    pub async fn refresh_snapshot(&mut self) -> Result<&PageSnapshot> {
        let page = self.current_page()?;
        self.snapshot = None;
        let snapshot = build_snapshot(page.as_ref()).await?;
        info!(page = page.id(), elements = snapshot.len(), "Page snapshot refreshed");
        Ok(self.snapshot.insert(snapshot))
    }

    /// Open a new page, append it and make it current.
    pub async fn open_tab(&mut self) -> Result<Arc<dyn PageDriver>> {
        let page = self.browser.new_page().await?;
        self.pages.push(page.clone());
        self.set_current(self.pages.len() - 1);
        page.wait_for_load().await?;
        info!(page = page.id(), tabs = self.pages.len(), "Opened tab");
        Ok(page)
    }

    /// Close the current page and elect the most recently opened remaining
    /// one. Both failure conditions are checked before anything is closed.
    pub async fn close_current(&mut self, tab_index: Option<usize>) -> Result<Arc<dyn PageDriver>> {
        let current = self.current.ok_or(Error::NoActivePage)?;
        if self.pages.len() <= 1 {
            return Err(Error::NoPagesRemain);
        }
        let remaining = self.pages.len() - 1;
        if let Some(index) = tab_index {
            if index >= remaining {
                return Err(Error::IndexOutOfRange { index, len: remaining });
            }
        }

        // The page stays listed and current until the browser confirms the close.
        let closing = self.pages.get(current).cloned().ok_or(Error::NoActivePage)?;
        closing.close().await?;
        self.pages.remove(current);

        let elected = self.pages.len() - 1;
        self.set_current(elected);
        let page = self.pages[elected].clone();
        page.bring_to_front().await?;
        page.wait_for_load().await?;
        info!(closed = closing.id(), current = page.id(), tabs = self.pages.len(), "Closed tab");
        Ok(page)
    }

    /// Make the page at `index` current and bring it to front.
    pub async fn switch_to(&mut self, index: usize) -> Result<Arc<dyn PageDriver>> {
        let page = self
            .pages
            .get(index)
            .cloned()
            .ok_or(Error::IndexOutOfRange { index, len: self.pages.len() })?;
        self.set_current(index);
        page.bring_to_front().await?;
        page.wait_for_load().await?;
        info!(page = page.id(), index, "Switched tab");
        Ok(page)
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.snapshot = None;
        self.current = None;
        self.pages.clear();
        self.browser.shutdown().await
    }

    fn set_current(&mut self, index: usize) {
        self.current = Some(index);
        self.snapshot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{self, FakeBrowser};

    async fn session_with_tabs(n: usize) -> (Arc<FakeBrowser>, Session) {
        let browser = Arc::new(FakeBrowser::new());
        let mut session = Session::start(browser.clone()).await.unwrap();
        for _ in 1..n {
            session.open_tab().await.unwrap();
        }
        (browser, session)
    }

    #[tokio::test]
    async fn test_start_has_one_current_page() {
        let (_, session) = session_with_tabs(1).await;
        assert_eq!(session.pages().len(), 1);
        assert_eq!(session.current_index(), Some(0));
        assert_eq!(session.current_page().unwrap().id(), "page-0");
    }

    #[tokio::test]
    async fn test_open_appends_and_switches() {
        let (_, session) = session_with_tabs(3).await;
        assert_eq!(session.pages().len(), 3);
        assert_eq!(session.current_index(), Some(2));
        assert_eq!(session.current_page().unwrap().id(), "page-2");
    }

    #[tokio::test]
    async fn test_close_elects_most_recently_opened() {
        let (browser, mut session) = session_with_tabs(3).await;
        session.switch_to(0).await.unwrap();
        let page = session.close_current(None).await.unwrap();
        assert_eq!(page.id(), "page-2");
        assert_eq!(session.pages().len(), 2);
        assert!(browser.page("page-0").unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_close_last_page_fails_and_keeps_it() {
        let (browser, mut session) = session_with_tabs(1).await;
        let Err(err) = session.close_current(None).await else {
            panic!("closing the last page succeeded");
        };
        assert!(matches!(err, Error::NoPagesRemain));
        assert_eq!(session.pages().len(), 1);
        assert!(!browser.page("page-0").unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_close_tab_index_bounds_use_remaining_count() {
        let (_, mut session) = session_with_tabs(3).await;
        // Two pages remain after the close, so 2 is out of range.
        let Err(err) = session.close_current(Some(2)).await else {
            panic!("out-of-range close succeeded");
        };
        assert!(matches!(err, Error::IndexOutOfRange { index: 2, len: 2 }));
        assert_eq!(session.pages().len(), 3);
        assert_eq!(session.current_index(), Some(2));

        session.close_current(Some(1)).await.unwrap();
        assert_eq!(session.pages().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_close_keeps_page_current() {
        let (browser, mut session) = session_with_tabs(2).await;
        browser
            .page("page-1")
            .unwrap()
            .fail_on("close", || Error::Browser("target crashed".into()));

        let Err(err) = session.close_current(None).await else {
            panic!("close of a crashed target succeeded");
        };
        assert!(matches!(err, Error::Browser(_)));
        assert_eq!(session.pages().len(), 2);
        assert_eq!(session.current_index(), Some(1));
        assert_eq!(session.current_page().unwrap().id(), "page-1");
        assert!(!browser.page("page-1").unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_switch_bounds() {
        let (browser, mut session) = session_with_tabs(2).await;
        let last = session.pages().len() - 1;
        let page = session.switch_to(last).await.unwrap();
        assert_eq!(page.id(), "page-1");

        let Err(err) = session.switch_to(2).await else {
            panic!("out-of-range switch succeeded");
        };
        assert!(matches!(err, Error::IndexOutOfRange { index: 2, len: 2 }));

        session.switch_to(0).await.unwrap();
        assert!(browser.page("page-0").unwrap().log().contains(&"bring_to_front".to_string()));
    }

    #[tokio::test]
    async fn test_tab_transitions_drop_snapshot() {
        let (browser, mut session) = session_with_tabs(1).await;
        browser
            .page("page-0")
            .unwrap()
            .set_elements(vec![fake::button(1, "Go")]);

        session.refresh_snapshot().await.unwrap();
        assert!(session.snapshot().is_some());
        session.open_tab().await.unwrap();
        assert!(session.snapshot().is_none());

        session.refresh_snapshot().await.unwrap();
        session.switch_to(0).await.unwrap();
        assert!(session.snapshot().is_none());

        session.refresh_snapshot().await.unwrap();
        session.close_current(None).await.unwrap();
        assert!(session.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_no_active_page_after_shutdown() {
        let (browser, mut session) = session_with_tabs(1).await;
        session.shutdown().await.unwrap();
        assert!(matches!(session.current_page(), Err(Error::NoActivePage)));
        assert!(browser.is_shut_down());
    }
}
