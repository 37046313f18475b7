use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::paths::Paths;

/// How action schemas treat parameters they do not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPolicy {
    /// Unknown fields are ignored.
    #[default]
    Permissive,
    /// Unknown fields fail validation.
    Strict,
}

impl SchemaPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "permissive" => Some(Self::Permissive),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    /// Browser engine name: "chrome", "edge" or "firefox".
    #[serde(default = "default_browser")]
    pub browser: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Explicit path to the browser executable. Discovered on PATH when unset.
    #[serde(default)]
    pub browser_instance_dir: Option<PathBuf>,
    /// Persistent profile directory. A per-session directory is used when unset.
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
    #[serde(default)]
    pub downloads_dir: Option<PathBuf>,
    #[serde(default)]
    pub uploads_dir: Option<PathBuf>,
    #[serde(default = "default_download_timeout_ms")]
    pub download_timeout_ms: u64,
    #[serde(default = "default_file_chooser_timeout_ms")]
    pub file_chooser_timeout_ms: u64,
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    /// Delay between typed characters.
    #[serde(default = "default_type_delay_ms")]
    pub type_delay_ms: u64,
    #[serde(default)]
    pub schema_policy: SchemaPolicy,
    /// Upper bound for Extract output, in bytes.
    #[serde(default = "default_extract_max_chars")]
    pub extract_max_chars: usize,
}

fn default_browser() -> String {
    "chrome".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_download_timeout_ms() -> u64 {
    5_000
}

fn default_file_chooser_timeout_ms() -> u64 {
    5_000
}

fn default_load_timeout_ms() -> u64 {
    30_000
}

fn default_type_delay_ms() -> u64 {
    80
}

fn default_extract_max_chars() -> usize {
    50_000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser: default_browser(),
            headless: default_headless(),
            browser_instance_dir: None,
            user_data_dir: None,
            downloads_dir: None,
            uploads_dir: None,
            download_timeout_ms: default_download_timeout_ms(),
            file_chooser_timeout_ms: default_file_chooser_timeout_ms(),
            load_timeout_ms: default_load_timeout_ms(),
            type_delay_ms: default_type_delay_ms(),
            schema_policy: SchemaPolicy::default(),
            extract_max_chars: default_extract_max_chars(),
        }
    }
}

impl BrowserConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BrowserConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Recognized: `BROWSER_INSTANCE_DIR`, `USER_DATA_DIR`, `DOWNLOADS_DIR`,
    /// `UPLOADS_DIR`, `WEBCELL_BROWSER`, `WEBCELL_HEADLESS`,
    /// `WEBCELL_SCHEMA_POLICY`. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BROWSER_INSTANCE_DIR") {
            self.browser_instance_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("USER_DATA_DIR") {
            self.user_data_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("DOWNLOADS_DIR") {
            self.downloads_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("UPLOADS_DIR") {
            self.uploads_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("WEBCELL_BROWSER") {
            self.browser = v;
        }
        if let Some(v) = get("WEBCELL_HEADLESS") {
            self.headless = match v.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(Error::Config(format!(
                        "WEBCELL_HEADLESS must be true or false, got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(v) = get("WEBCELL_SCHEMA_POLICY") {
            self.schema_policy = SchemaPolicy::parse(&v).ok_or_else(|| {
                Error::Config(format!(
                    "WEBCELL_SCHEMA_POLICY must be 'permissive' or 'strict', got '{}'",
                    v
                ))
            })?;
        }
        debug!(browser = %self.browser, headless = self.headless, "Browser config resolved");
        Ok(())
    }

    pub fn downloads_dir(&self, paths: &Paths) -> PathBuf {
        self.downloads_dir
            .clone()
            .unwrap_or_else(|| paths.downloads_dir())
    }

    pub fn uploads_dir(&self, paths: &Paths) -> PathBuf {
        self.uploads_dir
            .clone()
            .unwrap_or_else(|| paths.uploads_dir())
    }
}
