//! Error types for optimistic mutations

/// Query cache errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Backing store could not be reached
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a tracked fetch that did not produce a value
#[derive(Debug, thiserror::Error)]
pub enum FetchError<E> {
    /// Cancelled before completion; nothing was written
    #[error("fetch cancelled")]
    Cancelled,

    /// The fetch future returned an error
    #[error("fetch failed: {0}")]
    Failed(E),

    /// The fetch task panicked
    #[error("fetch task panicked")]
    Panicked,
}

impl<E> FetchError<E> {
    /// Whether the fetch was cancelled rather than failed
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors from an optimistic mutation
///
/// Whenever one of these is returned the cache has already been rolled
/// back (fully, or for the failed items of a bulk call).
#[derive(Debug, thiserror::Error)]
pub enum MutationError<E> {
    /// Remote call failed; the optimistic value was rolled back
    #[error("remote call failed: {0}")]
    Remote(E),

    /// Some calls of a bulk operation failed; only those were rolled back
    #[error("{failed} of {total} operations failed")]
    PartialFailure {
        /// Calls that failed
        failed: usize,
        /// Calls issued
        total: usize,
    },

    /// Cache could not be read or written
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl<E> MutationError<E> {
    /// Create partial failure error
    #[inline]
    pub fn partial(failed: usize, total: usize) -> Self {
        Self::PartialFailure { failed, total }
    }

    /// Number of failed remote calls this error stands for
    #[inline]
    #[must_use]
    pub fn failure_count(&self) -> usize {
        match self {
            Self::Remote(_) => 1,
            Self::PartialFailure { failed, .. } => *failed,
            Self::Cache(_) => 0,
        }
    }

    /// Map the remote error type
    pub fn map_remote<F, E2>(self, f: F) -> MutationError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Self::Remote(e) => MutationError::Remote(f(e)),
            Self::PartialFailure { failed, total } => MutationError::PartialFailure { failed, total },
            Self::Cache(e) => MutationError::Cache(e),
        }
    }
}
