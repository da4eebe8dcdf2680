//! Comparison keys and entity keys
//!
//! Provides [`ComparisonKey`], the canonical serialization of a segment
//! array used to detect whether the server snapshot has moved, and
//! [`EntityKey`], the opaque identifier that partitions per-entity state.

use crate::segment::Segment;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Canonical, order- and field-sensitive serialization of a segment array
///
/// Two keys are equal if and only if the arrays they were computed from are
/// structurally identical. This is a change detector, not a digest: equality
/// compares the full encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComparisonKey(Arc<str>);

impl ComparisonKey {
    /// Compute key for a segment array
    ///
    /// # Errors
    /// Returns error if serialization fails
    #[inline]
    pub fn of(segments: &[Segment]) -> Result<Self, KeyError> {
        let json = serde_json::to_string(segments)?;
        Ok(Self(Arc::from(json)))
    }

    /// Compute key for a server snapshot, treating a missing array as empty
    ///
    /// # Errors
    /// Returns error if serialization fails
    #[inline]
    pub fn of_snapshot(segments: Option<&[Segment]>) -> Result<Self, KeyError> {
        Self::of(segments.unwrap_or_default())
    }

    /// Canonical encoding
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short hex fingerprint for log fields (first 12 hex chars of Blake3)
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(self.0.as_bytes());
        hex::encode(&hash.as_bytes()[..6])
    }
}

impl Display for ComparisonKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

/// Errors computing a comparison key
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Opaque per-entity identifier (a podcast id in practice)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Underlying identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityKey {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for EntityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Speaker;

    #[test]
    fn missing_snapshot_matches_empty_array() {
        let missing = ComparisonKey::of_snapshot(None).unwrap();
        let empty = ComparisonKey::of(&[]).unwrap();
        assert_eq!(missing, empty);
    }

    #[test]
    fn key_is_order_sensitive() {
        let a = Segment::new(0, Speaker::HOST, "a");
        let b = Segment::new(1, Speaker::COHOST, "b");
        let forward = ComparisonKey::of(&[a.clone(), b.clone()]).unwrap();
        let swapped = ComparisonKey::of(&[b, a]).unwrap();
        assert_ne!(forward, swapped);
    }

    #[test]
    fn key_is_field_sensitive() {
        let host = ComparisonKey::of(&[Segment::new(0, Speaker::HOST, "a")]).unwrap();
        let cohost = ComparisonKey::of(&[Segment::new(0, Speaker::COHOST, "a")]).unwrap();
        assert_ne!(host, cohost);
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        let key = ComparisonKey::of(&[Segment::new(0, Speaker::HOST, "a")]).unwrap();
        assert_eq!(key.fingerprint().len(), 12);
        assert_eq!(key.fingerprint(), key.clone().fingerprint());
        assert_eq!(key.to_string(), key.fingerprint());
    }

    #[test]
    fn entity_key_serde_transparent() {
        let key = EntityKey::from("pod-1");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"pod-1\"");
    }
}
