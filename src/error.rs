use std::fmt;

use thiserror::Error;

/// Errors raised while building the media catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The media directory is missing or not a directory.
    #[error("invalid media directory: {0}")]
    BadDir(String),

    /// The scan completed but found no supported media.
    #[error("no media files found in {0}")]
    EmptyCatalog(String),
}

/// Failure to bring up a pipeline for one item. Always recoverable: the
/// session skips to the next item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The pipeline could not be constructed (missing element, link failure).
    #[error("failed to build pipeline: {0}")]
    Build(String),

    /// The pipeline was built but refused to enter the running state.
    #[error("failed to start pipeline: {0}")]
    StartFailed(String),
}

/// Why a session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The user closed the window or the process was asked to stop.
    UserClosed,
    /// Every item in the catalog failed to load in one full pass.
    NoPlayableMedia,
}

impl ExitReason {
    pub fn is_failure(self) -> bool {
        matches!(self, Self::NoPlayableMedia)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserClosed => f.write_str("closed by user"),
            Self::NoPlayableMedia => f.write_str("could not load any media files"),
        }
    }
}
