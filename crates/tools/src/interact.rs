//! Actions on a single indexed element: Click, Type, Upload, Menu.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use webcell_core::{Error, Result, SchemaPolicy};

use crate::{Context, Tool, ToolSchema};

#[derive(Debug, Clone, Deserialize)]
pub struct ClickTool {
    pub index: usize,
}

#[async_trait]
impl Tool for ClickTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Click Tool",
            description: "For clicking buttons, links, checkboxes, and radio buttons",
            parameters: json!({
                "type": "object",
                "properties": {
                    "index": {"type": "integer", "minimum": 0, "description": "the index of the element to click"}
                },
                "required": ["index"]
            }),
        }
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        let page = ctx.get_current_page()?;
        let (element, handle) = ctx.get_element_by_index(self.index).await?;
        page.wait_for_load().await?;
        if element.is_toggle() {
            handle.check().await?;
            Ok(format!("Checked element at index {}", self.index))
        } else {
            handle.scroll_into_view().await?;
            handle.click().await?;
            Ok(format!("Clicked element at index {}", self.index))
        }
    }
}

/// A boolean carried as the literal strings `"True"` / `"False"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Flag {
    True,
    #[default]
    False,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeTool {
    pub index: usize,
    pub text: String,
    #[serde(default)]
    pub clear: Flag,
}

#[async_trait]
impl Tool for TypeTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Type Tool",
            description: "To fill input fields or search boxes",
            parameters: json!({
                "type": "object",
                "properties": {
                    "index": {"type": "integer", "minimum": 0, "description": "the index of the element to type in the text"},
                    "text": {"type": "string", "description": "the text to type"},
                    "clear": {"type": "string", "enum": ["True", "False"], "default": "False",
                              "description": "whether to clear the text before typing"}
                },
                "required": ["index", "text"]
            }),
        }
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        let page = ctx.get_current_page()?;
        let (_, handle) = ctx.get_element_by_index(self.index).await?;
        page.wait_for_load().await?;
        handle.scroll_into_view().await?;
        if self.clear == Flag::True {
            handle.press("Control+A").await?;
            handle.press("Backspace").await?;
        }
        let delay = Duration::from_millis(ctx.config().type_delay_ms);
        handle.type_text(&self.text, delay).await?;
        Ok(format!("Typed {} in element {}", self.text, self.index))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadTool {
    pub index: usize,
    pub filenames: Vec<String>,
}

/// A bare relative path that stays inside the directory it is joined to.
pub(crate) fn is_contained_relative(name: &str) -> bool {
    let path = Path::new(name);
    !name.trim().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[async_trait]
impl Tool for UploadTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Upload Tool",
            description: "To upload a file to the webpage",
            parameters: json!({
                "type": "object",
                "properties": {
                    "index": {"type": "integer", "minimum": 0, "description": "the index of the element to upload file to"},
                    "filenames": {"type": "array", "items": {"type": "string"}, "minItems": 1,
                                  "description": "list of filenames of the files to upload, relative to the uploads directory"}
                },
                "required": ["index", "filenames"]
            }),
        }
    }

    fn validate(&self, _policy: SchemaPolicy) -> Result<()> {
        if self.filenames.is_empty() {
            return Err(Error::Validation("'filenames' must name at least one file".to_string()));
        }
        if let Some(bad) = self.filenames.iter().find(|f| !is_contained_relative(f)) {
            return Err(Error::Validation(format!(
                "'{}' must be a path inside the uploads directory",
                bad
            )));
        }
        Ok(())
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        let files: Vec<PathBuf> = self
            .filenames
            .iter()
            .map(|f| ctx.uploads_dir().join(f))
            .collect();
        if let Some(missing) = files.iter().find(|f| !f.is_file()) {
            return Err(Error::NotFound(format!("upload file {}", missing.display())));
        }

        let page = ctx.get_current_page()?;
        let (_, handle) = ctx.get_element_by_index(self.index).await?;
        handle.scroll_into_view().await?;
        let timeout = Duration::from_millis(ctx.config().file_chooser_timeout_ms);
        let chooser = handle.click_for_file_chooser(timeout).await?;

        let chosen = if chooser.multiple { &files[..] } else { &files[..1] };
        debug!(count = chosen.len(), multiple = chooser.multiple, "Setting chooser files");
        handle.set_input_files(&chooser, chosen).await?;
        page.wait_for_load().await?;
        Ok(format!("Uploaded {:?} to element {}", self.filenames, self.index))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuTool {
    pub index: usize,
    pub labels: Vec<String>,
}

#[async_trait]
impl Tool for MenuTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Menu Tool",
            description: "To interact with an element having dropdown menu and select an option from it",
            parameters: json!({
                "type": "object",
                "properties": {
                    "index": {"type": "integer", "minimum": 0, "description": "the index of the element to select from the dropdown menu"},
                    "labels": {"type": "array", "items": {"type": "string"}, "minItems": 1,
                               "description": "list of labels to select from the dropdown menu"}
                },
                "required": ["index", "labels"]
            }),
        }
    }

    fn validate(&self, _policy: SchemaPolicy) -> Result<()> {
        if self.labels.is_empty() || self.labels.iter().any(|l| l.trim().is_empty()) {
            return Err(Error::Validation("'labels' must be a non-empty list of option labels".to_string()));
        }
        Ok(())
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        let (_, handle) = ctx.get_element_by_index(self.index).await?;
        handle.scroll_into_view().await?;
        let selected = handle.select_options(&self.labels).await?;
        if selected.is_empty() {
            return Err(Error::NotFound(format!(
                "no option labelled {:?} in element {}",
                self.labels, self.index
            )));
        }
        let label = match self.labels.as_slice() {
            [single] => single.clone(),
            many => format!("{:?}", many),
        };
        Ok(format!(
            "Opened context menu of element {} and selected {}",
            self.index, label
        ))
    }
}
