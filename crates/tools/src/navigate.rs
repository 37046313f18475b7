//! Page-level actions: Wait, Scroll, GoTo, Back, Key.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use webcell_core::{Error, Result, SchemaPolicy};

use crate::{Context, Tool, ToolSchema};

#[derive(Debug, Clone, Deserialize)]
pub struct WaitTool {
    /// Seconds.
    pub time: u64,
}

#[async_trait]
impl Tool for WaitTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Wait Tool",
            description: "To wait until the page has fully loaded before proceeding",
            parameters: json!({
                "type": "object",
                "properties": {
                    "time": {"type": "integer", "minimum": 0, "description": "the time to wait in seconds"}
                },
                "required": ["time"]
            }),
        }
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        ctx.get_current_page()?;
        tokio::time::sleep(Duration::from_secs(self.time)).await;
        Ok(format!("Waited for {}s", self.time))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrollTool {
    pub direction: ScrollDirection,
    /// Pixels; a page when absent.
    #[serde(default)]
    pub amount: Option<u32>,
}

#[async_trait]
impl Tool for ScrollTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Scroll Tool",
            description: "To scroll the page by a certain amount or by a page",
            parameters: json!({
                "type": "object",
                "properties": {
                    "direction": {"type": "string", "enum": ["up", "down"], "description": "the direction to scroll"},
                    "amount": {"type": "integer", "minimum": 0,
                               "description": "the amount to scroll in pixels, if omitted then page up or down"}
                },
                "required": ["direction"]
            }),
        }
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        let page = ctx.get_current_page()?;
        match (self.direction, self.amount) {
            (ScrollDirection::Up, None) => page.press_key("PageUp").await?,
            (ScrollDirection::Down, None) => page.press_key("PageDown").await?,
            (ScrollDirection::Up, Some(px)) => page.mouse_wheel(0, -i64::from(px)).await?,
            (ScrollDirection::Down, Some(px)) => page.mouse_wheel(0, i64::from(px)).await?,
        }
        let amount = self
            .amount
            .map(|px| px.to_string())
            .unwrap_or_else(|| "one page".to_string());
        Ok(format!("Scrolled {} by {}", self.direction.as_str(), amount))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoToTool {
    pub url: String,
}

#[async_trait]
impl Tool for GoToTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "GoTo Tool",
            description: "To navigate directly to a specified URL.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "the url to navigate to"}
                },
                "required": ["url"]
            }),
        }
    }

    fn validate(&self, _policy: SchemaPolicy) -> Result<()> {
        url::Url::parse(&self.url)
            .map_err(|e| Error::Validation(format!("'{}' is not a valid URL: {}", self.url, e)))?;
        Ok(())
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        let page = ctx.get_current_page()?;
        ctx.get_session_mut().invalidate_snapshot();
        page.goto(&self.url).await?;
        Ok(format!("Navigated to {}", self.url))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackTool {}

#[async_trait]
impl Tool for BackTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Back Tool",
            description: "To return to the previous page",
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        let page = ctx.get_current_page()?;
        ctx.get_session_mut().invalidate_snapshot();
        page.go_back().await?;
        Ok("Navigated to previous page".to_string())
    }
}

fn default_times() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyTool {
    pub keys: String,
    #[serde(default = "default_times")]
    pub times: u32,
}

#[async_trait]
impl Tool for KeyTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Key Tool",
            description: "To perform keyboard shortcuts",
            parameters: json!({
                "type": "object",
                "properties": {
                    "keys": {"type": "string", "description": "the key or combination of keys to press, e.g. Enter, Control+A"},
                    "times": {"type": "integer", "minimum": 1, "default": 1,
                              "description": "the number of times to press the key or combination of keys"}
                },
                "required": ["keys"]
            }),
        }
    }

    fn validate(&self, _policy: SchemaPolicy) -> Result<()> {
        if self.keys.trim().is_empty() {
            return Err(Error::Validation("'keys' must not be empty".to_string()));
        }
        if self.times == 0 {
            return Err(Error::Validation("'times' must be at least 1".to_string()));
        }
        Ok(())
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        let page = ctx.get_current_page()?;
        for _ in 0..self.times {
            page.press_key(&self.keys).await?;
        }
        if self.times == 1 {
            Ok(format!("Pressed {}", self.keys))
        } else {
            Ok(format!("Pressed {} {} times", self.keys, self.times))
        }
    }
}
