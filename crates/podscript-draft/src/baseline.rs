//! Baseline resolution
//!
//! The baseline is the comparison point for change detection. It is the
//! optimistically saved array while the live server snapshot still matches
//! the snapshot that save was based on, and the server snapshot otherwise.

use podscript_segment::{ComparisonKey, KeyError, Segment};

/// A locally committed save result
///
/// Valid only while the server snapshot's comparison key equals
/// `base_server_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticSaved {
    /// Segments that were saved
    pub segments: Vec<Segment>,
    /// Server comparison key at the time the save was issued
    pub base_server_key: ComparisonKey,
}

impl OptimisticSaved {
    /// Create entry
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<Segment>, base_server_key: ComparisonKey) -> Self {
        Self {
            segments,
            base_server_key,
        }
    }

    /// Whether this entry still applies to a server snapshot with `server_key`
    #[inline]
    #[must_use]
    pub fn is_current(&self, server_key: &ComparisonKey) -> bool {
        self.base_server_key == *server_key
    }
}

/// Resolve the baseline for one entity
///
/// A missing server array is treated as empty. Pure: callers invoke it
/// whenever either input changes.
///
/// # Errors
/// Returns error if the server comparison key cannot be computed
pub fn resolve_baseline<'a>(
    server: Option<&'a [Segment]>,
    saved: Option<&'a OptimisticSaved>,
) -> Result<&'a [Segment], KeyError> {
    let server_segments = server.unwrap_or_default();
    let Some(saved) = saved else {
        return Ok(server_segments);
    };

    let server_key = ComparisonKey::of(server_segments)?;
    if saved.is_current(&server_key) {
        Ok(&saved.segments)
    } else {
        tracing::trace!(
            pinned = %saved.base_server_key,
            server = %server_key,
            "optimistic baseline superseded by server snapshot"
        );
        Ok(server_segments)
    }
}
