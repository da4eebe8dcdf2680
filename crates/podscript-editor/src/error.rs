//! Error types for the editor session
//!
//! Covers:
//! - Backend call failures
//! - Edits blocked by generation status
//! - Draft store and cache failures
//! - Configuration loading

use podscript_draft::DraftError;
use podscript_optimistic::{CacheError, FetchError, MutationError};
use podscript_segment::EntityKey;
use podscript_status::{GenerationStatus, StatusError};
use std::path::PathBuf;

/// Errors reported by a [`crate::PodcastBackend`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// No podcast with this id
    #[error("podcast not found: {0}")]
    NotFound(EntityKey),

    /// The server refused the request
    #[error("rejected: {0}")]
    Rejected(String),

    /// The server could not be reached
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Create rejection error
    #[inline]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    /// Whether retrying the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Editor session errors
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Edits are blocked while a job owns the entity
    #[error("{key} is {status}; edits are disabled")]
    ActionDisabled {
        /// Podcast the edit targeted
        key: EntityKey,
        /// Status that blocks it
        status: GenerationStatus,
    },

    /// Operation needs a snapshot that has not been fetched
    #[error("podcast {0} is not loaded")]
    NotLoaded(EntityKey),

    /// Fetch was cancelled by a concurrent mutation
    #[error("fetch for {0} was cancelled")]
    FetchCancelled(String),

    /// Backend call failed
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Some deletions of a bulk delete failed
    #[error("{failed} of {total} deletions failed")]
    PartialDelete {
        /// Deletions that failed
        failed: usize,
        /// Deletions attempted
        total: usize,
    },

    /// Draft store rejected the operation
    #[error("draft error: {0}")]
    Draft(#[from] DraftError),

    /// Status transition not allowed
    #[error("status error: {0}")]
    Status(#[from] StatusError),

    /// Query cache failure
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration could not be loaded
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl EditorError {
    /// Create action disabled error
    #[inline]
    pub fn action_disabled(key: &EntityKey, status: GenerationStatus) -> Self {
        Self::ActionDisabled {
            key: key.clone(),
            status,
        }
    }

    /// Whether the edit itself was invalid (bad index, bad position)
    #[inline]
    #[must_use]
    pub fn is_rejected_edit(&self) -> bool {
        matches!(self, Self::Draft(err) if err.is_rejected_edit())
    }

    /// Failures this error stands for in a bulk operation
    #[inline]
    #[must_use]
    pub fn failure_count(&self) -> usize {
        match self {
            Self::PartialDelete { failed, .. } => *failed,
            _ => 1,
        }
    }
}

impl From<MutationError<BackendError>> for EditorError {
    fn from(err: MutationError<BackendError>) -> Self {
        match err {
            MutationError::Remote(e) => Self::Backend(e),
            MutationError::PartialFailure { failed, total } => Self::PartialDelete { failed, total },
            MutationError::Cache(e) => Self::Cache(e),
        }
    }
}

impl EditorError {
    /// Convert a tracked-fetch error for `what`
    pub(crate) fn from_fetch(what: impl std::fmt::Display, err: FetchError<BackendError>) -> Self {
        match err {
            FetchError::Failed(e) => Self::Backend(e),
            FetchError::Cancelled | FetchError::Panicked => Self::FetchCancelled(what.to_string()),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`crate::EditorConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type alias for editor operations
pub type EditorResult<T> = Result<T, EditorError>;
