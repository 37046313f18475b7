//! Main-content extraction for the Extract action.
//!
//! The page's HTML is narrowed to its main content area (`article`, `main`,
//! `[role=main]`, `#content`, `.content`, falling back to `body`), then
//! rendered as markdown via `htmd`, as the area's HTML, or as plain text.
//! Links survive in the markdown rendering.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use webcell_core::{Error, Result};

use crate::{safe_truncate, Context, Tool, ToolSchema};

const MAIN_CONTENT_SELECTORS: [&str; 5] = ["article", "main", "[role=\"main\"]", "#content", ".content"];

const SKIPPED_TAGS: [&str; 8] = ["script", "style", "nav", "footer", "header", "aside", "noscript", "iframe"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractFormat {
    #[default]
    Markdown,
    Html,
    Text,
}

impl ExtractFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Text => "text",
        }
    }
}

/// Raw page markup in, readable content out.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, html: &str, format: ExtractFormat) -> Result<String>;
}

pub struct MainContentExtractor;

impl ContentExtractor for MainContentExtractor {
    fn extract(&self, html: &str, format: ExtractFormat) -> Result<String> {
        let document = Html::parse_document(html);
        let main_html = match main_content(&document) {
            Some(el) => el.html(),
            None => document.root_element().html(),
        };

        match format {
            ExtractFormat::Html => Ok(main_html),
            ExtractFormat::Markdown => html_to_markdown(&main_html),
            ExtractFormat::Text => Ok(visible_text(&Html::parse_fragment(&main_html))),
        }
    }
}

/// First main-content candidate that carries text, else `body`.
fn main_content(document: &Html) -> Option<ElementRef<'_>> {
    for sel in MAIN_CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        if let Some(el) = document
            .select(&selector)
            .find(|el| el.text().any(|t| !t.trim().is_empty()))
        {
            debug!(selector = sel, "Main content area found");
            return Some(el);
        }
    }
    let body = Selector::parse("body").ok()?;
    document.select(&body).next()
}

fn html_to_markdown(html: &str) -> Result<String> {
    use htmd::HtmlToMarkdown;

    let converter = HtmlToMarkdown::builder().skip_tags(SKIPPED_TAGS.to_vec()).build();
    let md = converter
        .convert(html)
        .map_err(|e| Error::Other(format!("Markdown conversion failed: {}", e)))?;
    Ok(clean_markdown(&md))
}

/// Collapse runs of blank lines to one and trim the ends.
fn clean_markdown(md: &str) -> String {
    let mut result = String::with_capacity(md.len());
    let mut pending_blank = false;

    for line in md.lines() {
        if line.trim().is_empty() {
            pending_blank = true;
            continue;
        }
        if !result.is_empty() {
            result.push('\n');
            if pending_blank {
                result.push('\n');
            }
        }
        pending_blank = false;
        result.push_str(line);
    }

    result.trim().to_string()
}

fn visible_text(fragment: &Html) -> String {
    let mut words = Vec::new();
    collect_text(fragment.root_element(), &mut words);
    words.join(" ")
}

fn collect_text<'a>(el: ElementRef<'a>, words: &mut Vec<&'a str>) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if !SKIPPED_TAGS.contains(&child_el.value().name()) {
                collect_text(child_el, words);
            }
        } else if let Some(text) = child.value().as_text() {
            words.extend(text.split_whitespace());
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractTool {
    #[serde(default)]
    pub format: ExtractFormat,
}

#[async_trait]
impl Tool for ExtractTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Extract Tool",
            description: "Scrapes the content of the current page",
            parameters: json!({
                "type": "object",
                "properties": {
                    "format": {"type": "string", "enum": ["markdown", "html", "text"], "default": "markdown",
                               "description": "the format of the extracted content"}
                }
            }),
        }
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        let page = ctx.get_current_page()?;
        let html = page.content().await?;
        let content = ctx.extractor().extract(&html, self.format)?;
        let max = ctx.config().extract_max_chars;
        debug!(format = self.format.as_str(), len = content.len(), "Extracted page content");
        Ok(format!("Extracted Page Content:\n{}", safe_truncate(&content, max)))
    }
}
