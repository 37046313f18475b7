use serde_json::Value;
use webcell_tools::ToolRegistry;

fn schema_function(schema: &Value) -> &Value {
    schema.get("function").unwrap_or(schema)
}

/// List all registered actions.
pub async fn list() -> anyhow::Result<()> {
    let registry = ToolRegistry::with_defaults();
    let schemas = registry.get_tool_schemas();

    println!();
    println!("Actions ({} total)", schemas.len());
    println!();
    for schema in &schemas {
        let func = schema_function(schema);
        let name = func["name"].as_str().unwrap_or("");
        let desc = func["description"].as_str().unwrap_or("");
        let short_desc: String = desc.chars().take(60).collect();
        let ellipsis = if desc.chars().count() > 60 { "..." } else { "" };
        println!("  {:<16} {}{}", name, short_desc, ellipsis);
    }
    println!();
    Ok(())
}

/// Show the parameters of one action.
pub async fn info(tool_name: &str) -> anyhow::Result<()> {
    let registry = ToolRegistry::with_defaults();
    let kind = registry.get(tool_name).ok_or_else(|| {
        anyhow::anyhow!("Action '{}' not found. Use `webcell tools list` to see all actions.", tool_name)
    })?;
    let schema = kind.schema();

    println!();
    println!("{}", schema.name);
    println!();
    println!("  Description: {}", schema.description);
    println!();

    let params = &schema.parameters;
    let required: Vec<&str> = params
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    match params.get("properties").and_then(|p| p.as_object()) {
        Some(props) if !props.is_empty() => {
            println!("  Parameters:");
            for (key, val) in props {
                let typ = val.get("type").and_then(|t| t.as_str()).unwrap_or("any");
                let desc = val.get("description").and_then(|d| d.as_str()).unwrap_or("");
                let req = if required.contains(&key.as_str()) { " (required)" } else { "" };
                let enum_str = val
                    .get("enum")
                    .and_then(|e| e.as_array())
                    .map(|arr| {
                        let vals: Vec<&str> = arr.iter().filter_map(|v| v.as_str()).collect();
                        format!(" [{}]", vals.join("|"))
                    })
                    .unwrap_or_default();

                println!("    {:<12} {:<8}{}{}", key, typ, req, enum_str);
                if !desc.is_empty() {
                    println!("      {}", desc);
                }
            }
        }
        _ => println!("  No parameters."),
    }
    println!();
    Ok(())
}
