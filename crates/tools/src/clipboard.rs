//! The Clipboard action and the system clipboard behind it.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use webcell_core::{Error, Result, SchemaPolicy};

use crate::{Context, Tool, ToolSchema};

pub trait ClipboardProvider: Send + Sync {
    fn copy(&self, text: &str) -> Result<()>;
    fn paste(&self) -> Result<String>;
}

/// The OS clipboard via `arboard`. A handle is opened per call; some
/// platforms do not allow holding one across threads.
pub struct SystemClipboard;

impl ClipboardProvider for SystemClipboard {
    fn copy(&self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| Error::Clipboard(format!("Failed to access clipboard: {}", e)))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| Error::Clipboard(format!("Failed to copy to clipboard: {}", e)))
    }

    fn paste(&self) -> Result<String> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| Error::Clipboard(format!("Failed to access clipboard: {}", e)))?;
        clipboard
            .get_text()
            .map_err(|e| Error::Clipboard(format!("Failed to read clipboard: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardMode {
    Copy,
    Paste,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClipboardTool {
    pub mode: ClipboardMode,
    #[serde(default)]
    pub text: Option<String>,
}

#[async_trait]
impl Tool for ClipboardTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Clipboard Tool",
            description: "To copy content to clipboard and retrieve it when needed",
            parameters: json!({
                "type": "object",
                "properties": {
                    "mode": {"type": "string", "enum": ["copy", "paste"],
                             "description": "copy text to the clipboard or paste its content"},
                    "text": {"type": "string", "description": "the text to copy, required for copy"}
                },
                "required": ["mode"]
            }),
        }
    }

    fn validate(&self, _policy: SchemaPolicy) -> Result<()> {
        if self.mode == ClipboardMode::Copy && self.text.is_none() {
            return Err(Error::Validation("'text' is required to copy".to_string()));
        }
        Ok(())
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        match self.mode {
            ClipboardMode::Copy => {
                let text = self
                    .text
                    .ok_or_else(|| Error::Validation("'text' is required to copy".to_string()))?;
                ctx.clipboard().copy(&text)?;
                Ok(format!("Copied \"{}\" to clipboard", text))
            }
            ClipboardMode::Paste => {
                let content = ctx.clipboard().paste()?;
                Ok(format!("Clipboard Content: \"{}\"", content))
            }
        }
    }
}
