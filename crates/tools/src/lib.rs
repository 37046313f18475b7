pub mod action;
pub mod browser;
pub mod clipboard;
pub mod done;
pub mod download;
pub mod extract;
pub mod form;
pub mod interact;
pub mod navigate;
pub mod registry;
pub mod tab;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use webcell_core::{Error, Result, SchemaPolicy};

pub use action::{Action, ActionKind};
pub use browser::{CdpBrowser, Context, PageSnapshot, Session};
pub use registry::ToolRegistry;

/// Truncate a string to at most `max_chars` bytes, respecting UTF-8 char boundaries.
pub fn safe_truncate(s: &str, max_chars: usize) -> &str {
    if s.len() <= max_chars {
        return s;
    }
    let mut end = max_chars;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// One action kind: its parameter struct doubles as the tool.
///
/// Deserializing the struct is the type check; `validate` covers what serde
/// cannot express (cross-field rules, ranges, path safety).
#[async_trait]
pub trait Tool: DeserializeOwned + Send + Sync {
    fn schema() -> ToolSchema;

    fn validate(&self, _policy: SchemaPolicy) -> Result<()> {
        Ok(())
    }

    async fn execute(self, ctx: &mut Context) -> Result<String>;
}

/// Check `params` against `T`'s schema and build it.
///
/// Under [`SchemaPolicy::Strict`] parameters the schema does not declare are
/// rejected; under the permissive policy they are ignored.
pub fn parse_params<T: Tool>(params: &Value, policy: SchemaPolicy) -> Result<T> {
    let obj = params
        .as_object()
        .ok_or_else(|| Error::Validation(format!("parameters must be an object, got {}", params)))?;

    if policy == SchemaPolicy::Strict {
        let schema = T::schema();
        let declared = schema.parameters.get("properties").and_then(|p| p.as_object());
        if let Some(unknown) = obj
            .keys()
            .find(|k| !declared.map_or(false, |d| d.contains_key(k.as_str())))
        {
            return Err(Error::Validation(format!("unknown parameter '{}'", unknown)));
        }
    }

    let parsed: T =
        serde_json::from_value(params.clone()).map_err(|e| Error::Validation(e.to_string()))?;
    parsed.validate(policy)?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interact::ClickTool;
    use serde_json::json;

    #[test]
    fn test_safe_truncate() {
        assert_eq!(safe_truncate("hello", 10), "hello");
        assert_eq!(safe_truncate("hello", 3), "hel");
        // 'é' is two bytes; never split it
        assert_eq!(safe_truncate("café", 4), "caf");
    }

    #[test]
    fn test_parse_params_permissive_ignores_extra() {
        let tool: ClickTool =
            parse_params(&json!({"index": 4, "reason": "open menu"}), SchemaPolicy::Permissive).unwrap();
        assert_eq!(tool.index, 4);
    }

    #[test]
    fn test_parse_params_strict_rejects_extra() {
        let err = parse_params::<ClickTool>(&json!({"index": 4, "reason": "x"}), SchemaPolicy::Strict)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("reason")));
    }

    #[test]
    fn test_parse_params_type_errors() {
        let missing = parse_params::<ClickTool>(&json!({}), SchemaPolicy::Permissive).unwrap_err();
        assert!(matches!(missing, Error::Validation(ref m) if m.contains("index")));

        let wrong_type =
            parse_params::<ClickTool>(&json!({"index": "two"}), SchemaPolicy::Permissive).unwrap_err();
        assert!(matches!(wrong_type, Error::Validation(_)));

        let negative = parse_params::<ClickTool>(&json!({"index": -1}), SchemaPolicy::Permissive).unwrap_err();
        assert!(matches!(negative, Error::Validation(_)));

        let not_object = parse_params::<ClickTool>(&json!([1]), SchemaPolicy::Permissive).unwrap_err();
        assert!(matches!(not_object, Error::Validation(_)));
    }
}
