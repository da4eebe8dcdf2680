//! Segment value types

use serde::{Deserialize, Serialize};

/// Well-known speaker tags
///
/// Speakers are stored as free text; these are the two values the
/// generation pipeline emits.
#[derive(Debug, Clone, Copy)]
pub struct Speaker;

impl Speaker {
    /// Primary voice
    pub const HOST: &'static str = "host";
    /// Secondary voice
    pub const COHOST: &'static str = "cohost";
}

/// One ordered dialogue line
///
/// # Invariants
/// Within any array handed to callers, `index` equals the segment's array
/// position. Only the transforms in this crate change `index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    /// Position within the script
    pub index: usize,
    /// Speaker tag (`host` / `cohost` in practice)
    pub speaker: String,
    /// Spoken text
    pub line: String,
}

impl Segment {
    /// Create a segment
    #[inline]
    #[must_use]
    pub fn new(index: usize, speaker: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            index,
            speaker: speaker.into(),
            line: line.into(),
        }
    }

    /// Merge a partial update into this segment
    ///
    /// `index` is identity and is never touched.
    #[inline]
    pub fn apply(&mut self, patch: SegmentPatch) {
        if let Some(speaker) = patch.speaker {
            self.speaker = speaker;
        }
        if let Some(line) = patch.line {
            self.line = line;
        }
    }
}

/// Payload for inserting a segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSegment {
    /// Speaker tag
    pub speaker: String,
    /// Spoken text
    pub line: String,
}

impl NewSegment {
    /// Create insertion payload
    #[inline]
    #[must_use]
    pub fn new(speaker: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            line: line.into(),
        }
    }
}

/// Partial fields for an update
///
/// Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPatch {
    /// Replacement speaker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Replacement line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
}

impl SegmentPatch {
    /// Patch only the line
    #[inline]
    #[must_use]
    pub fn line(line: impl Into<String>) -> Self {
        Self {
            speaker: None,
            line: Some(line.into()),
        }
    }

    /// Patch only the speaker
    #[inline]
    #[must_use]
    pub fn speaker(speaker: impl Into<String>) -> Self {
        Self {
            speaker: Some(speaker.into()),
            line: None,
        }
    }

    /// Whether the patch changes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.speaker.is_none() && self.line.is_none()
    }
}
