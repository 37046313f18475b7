use webcell_tools::browser::list_available_browsers;

pub async fn run() -> anyhow::Result<()> {
    let browsers = list_available_browsers();
    if browsers.is_empty() {
        println!("No supported browser found. Install Chrome, Edge or Firefox, or set BROWSER_INSTANCE_DIR.");
        return Ok(());
    }
    for (engine, path) in browsers {
        println!("  {:<10} {}", engine.name(), path);
    }
    Ok(())
}
