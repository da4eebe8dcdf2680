//! Podscript Segment Model
//!
//! The atomic editable unit of a podcast script and the transforms that keep
//! a segment array well-formed.
//!
//! # Core Concepts
//!
//! - [`Segment`]: One ordered dialogue line with a speaker tag
//! - [`reindex`]: Rewrites every `index` to match its array position
//! - [`ComparisonKey`]: Canonical serialization used for change detection
//! - [`EntityKey`]: Opaque identifier partitioning per-entity state
//!
//! # Invariant
//!
//! Every array returned by the structural transforms in this crate has
//! `index` values exactly `0..N-1` in array order.
//!
//! # Example
//!
//! ```rust
//! use podscript_segment::{insert_segment, InsertPosition, NewSegment, Segment};
//!
//! let script = vec![Segment::new(0, "host", "a"), Segment::new(1, "cohost", "b")];
//! let next = insert_segment(&script, InsertPosition::Start, NewSegment::new("host", "x"))?;
//!
//! assert_eq!(next[0].line, "x");
//! assert_eq!(next[2].index, 2);
//! # Ok::<(), podscript_segment::SegmentError>(())
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod key;
mod ops;
mod segment;

pub use key::{ComparisonKey, EntityKey, KeyError};
pub use ops::{
    insert_segment, is_contiguous, move_segment, reindex, remove_segment, update_segment,
    InsertPosition, SegmentError,
};
pub use segment::{NewSegment, Segment, SegmentPatch, Speaker};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
