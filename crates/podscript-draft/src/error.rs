//! Error types for draft reconciliation

use podscript_segment::{EntityKey, KeyError, SegmentError};

/// Draft store errors
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    /// Segment transform rejected the edit
    #[error("segment error: {0}")]
    Segment(#[from] SegmentError),

    /// Comparison key could not be computed
    #[error("comparison key error: {0}")]
    Key(#[from] KeyError),

    /// Ticket was not issued by this store, or was already settled
    #[error("unknown save ticket #{seq} for {key}")]
    UnknownTicket {
        /// Entity the ticket names
        key: EntityKey,
        /// Ticket sequence number
        seq: u64,
    },
}

impl DraftError {
    /// Create unknown ticket error
    #[inline]
    pub fn unknown_ticket(key: &EntityKey, seq: u64) -> Self {
        Self::UnknownTicket {
            key: key.clone(),
            seq,
        }
    }

    /// Whether the error came from the edit itself rather than store state
    #[inline]
    #[must_use]
    pub fn is_rejected_edit(&self) -> bool {
        matches!(self, Self::Segment(_))
    }
}

/// Result type alias for draft operations
pub type DraftResult<T> = Result<T, DraftError>;
