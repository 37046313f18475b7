//! Browser control: CDP transport, the driver seam, page snapshots and the
//! session/context actions run against.
//!
//! - `driver`: traits every backend implements
//! - `chrome` + `cdp` + `launch`: the Chrome DevTools backend
//! - `snapshot`: indexed element capture
//! - `session` + `context`: tab state and index resolution

pub mod cdp;
pub mod chrome;
pub mod context;
pub mod driver;
pub mod launch;
pub mod session;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod fake;

pub use chrome::{CdpBrowser, CdpPage};
pub use context::{Context, ElementHandle};
pub use driver::{BrowserDriver, DownloadEvent, FileChooser, NodeId, PageDriver, RawElement, ReadyState};
pub use launch::{list_available_browsers, BrowserEngine};
pub use session::Session;
pub use snapshot::{build_snapshot, BoundingBox, ElementNode, PageSnapshot};
