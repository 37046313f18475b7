use serde_json::json;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use webcell_core::ActionRequest;
use webcell_tools::{ActionKind, Context, ToolRegistry};

use super::open_context;

async fn print_snapshot(ctx: &mut Context) {
    match ctx.refresh_snapshot().await {
        Ok(snapshot) => {
            println!("[Interactive Elements]");
            println!("{}", snapshot.elements_to_string());
        }
        Err(e) => warn!(error = %e, "Snapshot failed"),
    }
}

/// Execute action requests from stdin until EOF or a Done action.
pub async fn run(config: Option<PathBuf>, url: Option<String>) -> anyhow::Result<()> {
    let mut ctx = open_context(config.as_deref()).await?;
    let registry = ToolRegistry::with_defaults();

    if let Some(url) = url {
        let outcome = registry.execute("GoTo Tool", &mut ctx, json!({ "url": url })).await?;
        println!("{}", outcome);
    }
    print_snapshot(&mut ctx).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("snapshot") {
            print_snapshot(&mut ctx).await;
            continue;
        }

        let request: ActionRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                println!("Error: invalid action request: {}", e);
                continue;
            }
        };
        if request.name.eq_ignore_ascii_case("snapshot") {
            print_snapshot(&mut ctx).await;
            continue;
        }

        let done = ActionKind::from_name(&request.name) == Some(ActionKind::Done);
        match registry.execute(&request.name, &mut ctx, request.params).await {
            Ok(outcome) => println!("{}", outcome),
            Err(e) => println!("Error: {}", e),
        }
        if done {
            break;
        }
        print_snapshot(&mut ctx).await;
    }

    info!("Shutting down browser");
    ctx.shutdown().await?;
    Ok(())
}

/// Open `url` and print the indexed elements of the loaded page.
pub async fn snapshot(config: Option<PathBuf>, url: &str) -> anyhow::Result<()> {
    let mut ctx = open_context(config.as_deref()).await?;
    let registry = ToolRegistry::with_defaults();

    let result = async {
        registry.execute("GoTo Tool", &mut ctx, json!({ "url": url })).await?;
        let snapshot = ctx.refresh_snapshot().await?;
        println!("{}", snapshot.elements_to_string());
        Ok::<_, webcell_core::Error>(())
    }
    .await;

    ctx.shutdown().await?;
    result?;
    Ok(())
}
