//! Error types for cadence.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cadence operations.
pub type Result<T> = std::result::Result<T, CadenceError>;

/// Main error type for cadence.
#[derive(Error, Debug)]
pub enum CadenceError {
    // Metrics source errors
    #[error("Transport failure querying {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Metrics source returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed response from {url}: {reason}")]
    Decode { url: String, reason: String },

    // Record sink errors
    #[error("Failed to write record to {path:?}: {reason}")]
    Sink { path: PathBuf, reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Failed to read config {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CadenceError {
    /// Short, stable label for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::Decode { .. } => "decode",
            Self::Sink { .. } => "sink",
            Self::InvalidConfig { .. } | Self::ConfigRead { .. } => "config",
            Self::Io { .. } => "io",
            Self::Other(_) => "other",
        }
    }

    /// Whether this error came from querying the metrics source.
    ///
    /// Fetch failures are never fatal: the sample is dropped and the window
    /// continues with whatever else it collects.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. } | Self::Decode { .. })
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig { reason: reason.into() }
    }
}
