//! Invariant-preserving segment transforms
//!
//! Every structural transform ends with a full [`reindex`] pass, so no
//! result can be non-contiguous. Transforms never mutate their input; they
//! return the new array.

use crate::segment::{NewSegment, Segment, SegmentPatch};

/// Where a new segment goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// Before every existing segment
    Start,
    /// Directly after the segment whose `index` matches
    After(usize),
}

impl InsertPosition {
    /// Map the wire-level `afterIndex` convention (`-1` = before everything)
    ///
    /// # Errors
    /// Returns [`SegmentError::InvalidAnchor`] for negative values other than `-1`
    pub fn from_after_index(after_index: i64) -> Result<Self, SegmentError> {
        match after_index {
            -1 => Ok(Self::Start),
            n if n >= 0 => usize::try_from(n)
                .map(Self::After)
                .map_err(|_| SegmentError::InvalidAnchor(after_index)),
            n => Err(SegmentError::InvalidAnchor(n)),
        }
    }
}

/// Errors raised by segment transforms
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    /// No segment carries the requested `index`
    #[error("segment not found: index {0}")]
    NotFound(usize),

    /// Array position outside the script
    #[error("position {position} out of range for {len} segments")]
    PositionOutOfRange {
        /// Requested position
        position: usize,
        /// Length of the array
        len: usize,
    },

    /// Insertion anchor is neither `-1` nor a valid index
    #[error("invalid insertion anchor: {0}")]
    InvalidAnchor(i64),
}

impl SegmentError {
    /// Create out-of-range error
    #[inline]
    #[must_use]
    pub fn out_of_range(position: usize, len: usize) -> Self {
        Self::PositionOutOfRange { position, len }
    }
}

/// Set every segment's `index` to its array position
#[inline]
pub fn reindex(segments: &mut [Segment]) {
    for (position, segment) in segments.iter_mut().enumerate() {
        segment.index = position;
    }
}

/// Check the contiguity invariant
#[inline]
#[must_use]
pub fn is_contiguous(segments: &[Segment]) -> bool {
    segments
        .iter()
        .enumerate()
        .all(|(position, segment)| segment.index == position)
}

fn position_of(segments: &[Segment], index: usize) -> Result<usize, SegmentError> {
    segments
        .iter()
        .position(|s| s.index == index)
        .ok_or(SegmentError::NotFound(index))
}

/// Merge fields into the segment with the given `index`
///
/// Identity is preserved, so no reindex is needed.
///
/// # Errors
/// Returns [`SegmentError::NotFound`] if no segment has `index`
pub fn update_segment(
    segments: &[Segment],
    index: usize,
    patch: SegmentPatch,
) -> Result<Vec<Segment>, SegmentError> {
    let position = position_of(segments, index)?;
    let mut next = segments.to_vec();
    next[position].apply(patch);
    Ok(next)
}

/// Insert a segment and reindex
///
/// The new segment first receives a provisional index one past the current
/// maximum so it stays distinguishable until the reindex pass.
///
/// # Errors
/// Returns [`SegmentError::NotFound`] if the `After` anchor does not exist
pub fn insert_segment(
    segments: &[Segment],
    at: InsertPosition,
    data: NewSegment,
) -> Result<Vec<Segment>, SegmentError> {
    let position = match at {
        InsertPosition::Start => 0,
        InsertPosition::After(index) => position_of(segments, index)? + 1,
    };
    let provisional = segments.iter().map(|s| s.index + 1).max().unwrap_or(0);

    let mut next = Vec::with_capacity(segments.len() + 1);
    next.extend_from_slice(&segments[..position]);
    next.push(Segment::new(provisional, data.speaker, data.line));
    next.extend_from_slice(&segments[position..]);
    reindex(&mut next);
    Ok(next)
}

/// Remove the segment with the given `index` and reindex
///
/// # Errors
/// Returns [`SegmentError::NotFound`] if no segment has `index`
pub fn remove_segment(segments: &[Segment], index: usize) -> Result<Vec<Segment>, SegmentError> {
    position_of(segments, index)?;
    let mut next: Vec<Segment> = segments.iter().filter(|s| s.index != index).cloned().collect();
    reindex(&mut next);
    Ok(next)
}

/// Move the segment at array position `from` to array position `to`
///
/// Positions are array positions, not `index` fields.
///
/// # Errors
/// Returns [`SegmentError::PositionOutOfRange`] if either position is
/// outside the array
pub fn move_segment(segments: &[Segment], from: usize, to: usize) -> Result<Vec<Segment>, SegmentError> {
    let len = segments.len();
    if from >= len {
        return Err(SegmentError::out_of_range(from, len));
    }
    if to >= len {
        return Err(SegmentError::out_of_range(to, len));
    }

    let mut next = segments.to_vec();
    let moved = next.remove(from);
    next.insert(to, moved);
    reindex(&mut next);
    Ok(next)
}
