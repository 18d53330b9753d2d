use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a session backend
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("timed out after {0:?} waiting for {1}")]
    Timeout(Duration, &'static str),

    #[error("element not interactable: {0}")]
    Element(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Hard failures that end a download attempt
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("navigation landed on {actual}, expected a URL containing `{expected}`")]
    Navigation { expected: String, actual: String },

    #[error("no visible {what} found")]
    Discovery { what: &'static str },

    #[error("{what} did not appear within {timeout:?}")]
    SpawnTimeout { what: &'static str, timeout: Duration },

    #[error("saved file {} is missing or empty{}", .path.display(), cause_suffix(.cause))]
    Persistence {
        path: PathBuf,
        cause: Option<String>,
        directory_listing: Vec<String>,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

fn cause_suffix(cause: &Option<String>) -> String {
    cause.as_ref().map(|c| format!(" ({})", c)).unwrap_or_default()
}

impl DownloadError {
    /// Directory contents captured when the saved file could not be verified
    pub fn diagnostics(&self) -> &[String] {
        match self {
            DownloadError::Persistence { directory_listing, .. } => directory_listing,
            _ => &[],
        }
    }
}
