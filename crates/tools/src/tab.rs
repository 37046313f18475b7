//! The Tab action: open, close and switch pages of the session.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use webcell_core::{Error, Result, SchemaPolicy};

use crate::{Context, Tool, ToolSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabMode {
    Open,
    Close,
    Switch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TabTool {
    pub mode: TabMode,
    #[serde(default)]
    pub tab_index: Option<usize>,
}

#[async_trait]
impl Tool for TabTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Tab Tool",
            description: "To open a new tab, close the current tab and switch from current tab to the specified tab",
            parameters: json!({
                "type": "object",
                "properties": {
                    "mode": {"type": "string", "enum": ["open", "close", "switch"],
                             "description": "the mode of the tab operation"},
                    "tab_index": {"type": "integer", "minimum": 0,
                                  "description": "the index of the tab to switch to, required for switch"}
                },
                "required": ["mode"]
            }),
        }
    }

    fn validate(&self, _policy: SchemaPolicy) -> Result<()> {
        if self.mode == TabMode::Switch && self.tab_index.is_none() {
            return Err(Error::Validation("'tab_index' is required to switch tabs".to_string()));
        }
        Ok(())
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        let session = ctx.get_session_mut();
        match (self.mode, self.tab_index) {
            (TabMode::Open, _) => {
                session.open_tab().await?;
                Ok("Opened new tab and switched to it".to_string())
            }
            (TabMode::Close, tab_index) => {
                session.close_current(tab_index).await?;
                Ok("Closed current tab and switched to previous tab".to_string())
            }
            (TabMode::Switch, Some(index)) => {
                session.switch_to(index).await?;
                Ok(format!("Switched to tab {}", index))
            }
            (TabMode::Switch, None) => {
                Err(Error::Validation("'tab_index' is required to switch tabs".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::context::tests::{fake_context, page0};
    use crate::browser::fake;
    use crate::parse_params;

    fn tab(mode: TabMode, tab_index: Option<usize>) -> TabTool {
        TabTool { mode, tab_index }
    }

    #[tokio::test]
    async fn test_open_switch_close() {
        let dir = tempfile::tempdir().unwrap();
        let (browser, mut ctx) = fake_context(dir.path()).await;

        assert_eq!(
            tab(TabMode::Open, None).execute(&mut ctx).await.unwrap(),
            "Opened new tab and switched to it"
        );
        assert_eq!(ctx.get_current_page().unwrap().id(), "page-1");

        assert_eq!(
            tab(TabMode::Switch, Some(0)).execute(&mut ctx).await.unwrap(),
            "Switched to tab 0"
        );
        assert_eq!(ctx.get_current_page().unwrap().id(), "page-0");
        assert!(page0(&browser).log().contains(&"bring_to_front".to_string()));

        assert_eq!(
            tab(TabMode::Close, None).execute(&mut ctx).await.unwrap(),
            "Closed current tab and switched to previous tab"
        );
        assert!(page0(&browser).is_closed());
        assert_eq!(ctx.get_current_page().unwrap().id(), "page-1");
    }

    #[tokio::test]
    async fn test_switch_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut ctx) = fake_context(dir.path()).await;
        tab(TabMode::Open, None).execute(&mut ctx).await.unwrap();

        let err = tab(TabMode::Switch, Some(2)).execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 2, len: 2 }));
        assert_eq!(ctx.get_current_page().unwrap().id(), "page-1");
        assert!(tab(TabMode::Switch, Some(1)).execute(&mut ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_close_only_page_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (browser, mut ctx) = fake_context(dir.path()).await;
        let err = tab(TabMode::Close, None).execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::NoPagesRemain));
        assert!(!page0(&browser).is_closed());
    }

    #[tokio::test]
    async fn test_tab_change_invalidates_indices() {
        let dir = tempfile::tempdir().unwrap();
        let (browser, mut ctx) = fake_context(dir.path()).await;
        page0(&browser).set_elements(vec![fake::button(1, "Ok")]);
        ctx.refresh_snapshot().await.unwrap();

        tab(TabMode::Open, None).execute(&mut ctx).await.unwrap();
        tab(TabMode::Switch, Some(0)).execute(&mut ctx).await.unwrap();
        assert!(matches!(
            ctx.get_element_by_index(0).await,
            Err(Error::IndexResolution { .. })
        ));
    }

    #[test]
    fn test_switch_requires_index() {
        let err = parse_params::<TabTool>(&json!({"mode": "switch"}), SchemaPolicy::Permissive).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("tab_index")));
        assert!(parse_params::<TabTool>(&json!({"mode": "reload"}), SchemaPolicy::Permissive).is_err());
        assert!(parse_params::<TabTool>(&json!({"mode": "close"}), SchemaPolicy::Permissive).is_ok());
    }
}
