use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Index {index} is not in the current snapshot: {reason}")]
    IndexResolution { index: usize, reason: String },

    #[error("Element at index {index} is no longer attached to the page")]
    StaleElement { index: usize },

    #[error("Tab index {index} out of range (have {len} tabs)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No active page in the session")]
    NoActivePage,

    #[error("Cannot close the last remaining page")]
    NoPagesRemain,

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Form step {step} ({tool}) failed: {source}")]
    FormStep {
        step: usize,
        tool: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{action}: {source}")]
    Action {
        action: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether a failure of the click-driven download path may be retried by
    /// fetching the URL directly. Only "nothing was downloaded" conditions
    /// qualify; anything else is a real fault and must surface.
    pub fn is_download_fallback_eligible(&self) -> bool {
        matches!(
            self.root(),
            Error::Timeout(_) | Error::IndexResolution { .. } | Error::StaleElement { .. }
        )
    }

    /// Attach the name of the action that raised the error.
    ///
    /// The original error stays reachable through [`Error::root`], so callers
    /// can still match on the taxonomy.
    pub fn in_action(self, action: &str) -> Self {
        match self {
            Error::Action { .. } => self,
            other => Error::Action {
                action: action.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Name of the action that failed, if one was attached.
    pub fn action(&self) -> Option<&str> {
        match self {
            Error::Action { action, .. } => Some(action),
            _ => None,
        }
    }

    /// The error underneath any action wrapper.
    pub fn root(&self) -> &Error {
        match self {
            Error::Action { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
