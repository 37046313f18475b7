//! The Download action: click-driven download with a direct-fetch fallback.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use webcell_core::{Error, Result, SchemaPolicy};

use crate::{Context, Tool, ToolSchema};

/// Plain GET of a URL's body.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(60))
            .user_agent("webcell/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(format!("GET {} returned {}", url, status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("Failed to read body of {}: {}", url, e)))?;
        Ok(body.to_vec())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadTool {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// A bare file name: no separators, not `.` or `..`.
fn is_plain_filename(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

/// Last non-empty path segment of `url`, used when no filename is given.
fn filename_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(|s| s.to_string()))
        })
        .filter(|s| is_plain_filename(s))
        .unwrap_or_else(|| "download".to_string())
}

struct Saved {
    filename: String,
    source: String,
    path: PathBuf,
}

impl DownloadTool {
    async fn by_click(&self, index: usize, dir: &Path, ctx: &Context) -> Result<Saved> {
        let (_, handle) = ctx.get_element_by_index(index).await?;
        let timeout = Duration::from_millis(ctx.config().download_timeout_ms);

        handle.scroll_into_view().await?;
        let event = handle.click_for_download(timeout).await?;

        let filename = match &self.filename {
            Some(name) => name.clone(),
            None => Path::new(&event.suggested_filename)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .filter(|n| is_plain_filename(n))
                .unwrap_or_else(|| filename_from_url(&event.url)),
        };
        let path = dir.join(&filename);
        handle.page().save_download(&event, &path).await?;

        Ok(Saved {
            filename,
            source: self.url.clone().unwrap_or(event.url),
            path,
        })
    }

    async fn by_fetch(&self, url: &str, dir: &Path, ctx: &Context) -> Result<Saved> {
        let filename = self.filename.clone().unwrap_or_else(|| filename_from_url(url));
        let body = ctx
            .fetcher()
            .fetch(url)
            .await
            .map_err(|e| Error::Download(format!("fetching {} failed: {}", url, e)))?;

        let path = dir.join(&filename);
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| Error::Download(format!("writing {} failed: {}", path.display(), e)))?;
        debug!(url, bytes = body.len(), path = %path.display(), "Fetched download");

        Ok(Saved {
            filename,
            source: url.to_string(),
            path,
        })
    }
}

#[async_trait]
impl Tool for DownloadTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Download Tool",
            description: "To download a file (e.g., pdf, image, video, audio) to the system",
            parameters: json!({
                "type": "object",
                "properties": {
                    "index": {"type": "integer", "minimum": 0,
                              "description": "the index of the element that triggers the download"},
                    "url": {"type": "string", "description": "the url of the file, fetched directly if clicking does not download it"},
                    "filename": {"type": "string", "description": "the name to save the file under, defaults to the name the site suggests"}
                }
            }),
        }
    }

    fn validate(&self, _policy: SchemaPolicy) -> Result<()> {
        if self.index.is_none() && self.url.is_none() {
            return Err(Error::Validation("either 'index' or 'url' is required".to_string()));
        }
        if let Some(url) = &self.url {
            url::Url::parse(url)
                .map_err(|e| Error::Validation(format!("'{}' is not a valid URL: {}", url, e)))?;
        }
        if let Some(name) = &self.filename {
            if !is_plain_filename(name) {
                return Err(Error::Validation(format!(
                    "'{}' must be a file name without path separators",
                    name
                )));
            }
        }
        Ok(())
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        let dir = ctx.downloads_dir().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Download(format!("creating {} failed: {}", dir.display(), e)))?;

        let saved = match self.index {
            Some(index) => match (self.by_click(index, &dir, ctx).await, self.url.as_deref()) {
                (Ok(saved), _) => saved,
                (Err(e), Some(url)) if e.is_download_fallback_eligible() => {
                    warn!(index, url, error = %e, "Click did not download, fetching URL directly");
                    self.by_fetch(url, &dir, ctx).await?
                }
                (Err(e), Some(_)) => return Err(Error::Download(e.to_string())),
                (Err(e), None) => {
                    return Err(Error::Download(format!(
                        "clicking element {} did not download a file and no url was given: {}",
                        index, e
                    )))
                }
            },
            None => {
                let url = self
                    .url
                    .as_deref()
                    .ok_or_else(|| Error::Validation("either 'index' or 'url' is required".to_string()))?;
                self.by_fetch(url, &dir, ctx).await?
            }
        };

        info!(file = %saved.filename, path = %saved.path.display(), "Download saved");
        Ok(format!(
            "Downloaded {} from {} and saved it to {}",
            saved.filename,
            saved.source,
            saved.path.display()
        ))
    }
}
