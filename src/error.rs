use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Central error type for the stem-batch-core crate.
#[derive(Debug, Error)]
pub enum BatchError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    // Domain-specific variants
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("{tool} failed: {reason}")]
    ToolInvocation { tool: String, reason: String },

    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification used when aggregating per-item failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    ToolInvocation,
    Filesystem,
    Other,
}

impl BatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BatchError::Fetch { .. } => FailureKind::Fetch,
            BatchError::ToolInvocation { .. } => FailureKind::ToolInvocation,
            BatchError::Filesystem { .. } => FailureKind::Filesystem,
            _ => FailureKind::Other,
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> BatchError {
        let path = path.into();
        move |source| BatchError::Filesystem { path, source }
    }

    pub(crate) fn tool(tool: impl Into<String>, reason: impl Into<String>) -> BatchError {
        BatchError::ToolInvocation {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for BatchError {
    fn from(e: std::io::Error) -> Self {
        BatchError::Anyhow(e.into())
    }
}

impl From<reqwest::Error> for BatchError {
    fn from(e: reqwest::Error) -> Self {
        BatchError::Fetch {
            url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            reason: e.to_string(),
        }
    }
}

impl From<csv::Error> for BatchError {
    fn from(e: csv::Error) -> Self {
        BatchError::Manifest(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
