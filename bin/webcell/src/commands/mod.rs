pub mod browsers;
pub mod run_cmd;
pub mod tools_cmd;

use std::path::Path;
use std::sync::Arc;
use tracing::info;
use webcell_core::{BrowserConfig, Paths};
use webcell_tools::{CdpBrowser, Context, Session};

/// Resolve config, launch the browser and open a session on it.
pub async fn open_context(config_path: Option<&Path>) -> anyhow::Result<Context> {
    let paths = Paths::new();
    let mut config = match config_path {
        Some(path) => BrowserConfig::load(path)?,
        None => BrowserConfig::load_or_default(&paths)?,
    };
    config.apply_env_overrides()?;

    let browser = CdpBrowser::launch(&config, &paths).await?;
    info!(browser = browser.engine().name(), headless = config.headless, "Session starting");
    let session = Session::start(Arc::new(browser)).await?;
    Ok(Context::new(session, config, &paths))
}
