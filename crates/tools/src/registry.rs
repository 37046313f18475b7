use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};
use webcell_core::{Error, Result};

use crate::action::{Action, ActionKind};
use crate::Context;

/// Name-keyed view over the action kinds offered to the decision process.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, ActionKind>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for kind in ActionKind::ALL {
            registry.register(kind);
        }
        registry
    }

    pub fn register(&mut self, kind: ActionKind) {
        debug!(name = kind.name(), "Registering tool");
        self.tools.insert(kind.name(), kind);
    }

    /// Look up by full name, or by short name / any case as a fallback.
    pub fn get(&self, name: &str) -> Option<ActionKind> {
        self.tools
            .get(name)
            .copied()
            .or_else(|| ActionKind::from_name(name).filter(|k| self.tools.contains_key(k.name())))
    }

    /// OpenAI function-calling schemas, in registration-independent order.
    pub fn get_tool_schemas(&self) -> Vec<Value> {
        self.sorted_kinds()
            .into_iter()
            .map(|kind| {
                let schema = kind.schema();
                json!({
                    "type": "function",
                    "function": {
                        "name": schema.name,
                        "description": schema.description,
                        "parameters": schema.parameters
                    }
                })
            })
            .collect()
    }

    /// Get all registered tool names.
    pub fn tool_names(&self) -> Vec<String> {
        self.sorted_kinds().into_iter().map(|k| k.name().to_string()).collect()
    }

    pub async fn execute(&self, name: &str, ctx: &mut Context, params: Value) -> Result<String> {
        let kind = self
            .get(name)
            .ok_or_else(|| Error::Validation(format!("Unknown tool: {}", name)))?;

        let action = match Action::parse(kind, &params, ctx.config().schema_policy) {
            Ok(action) => action,
            Err(e) => {
                warn!(tool = kind.name(), error = %e, "Tool validation failed");
                return Err(e);
            }
        };

        debug!(tool = kind.name(), "Executing tool");
        action.execute(ctx).await
    }

    fn sorted_kinds(&self) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|k| self.tools.contains_key(k.name()))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
