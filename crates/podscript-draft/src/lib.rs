//! Podscript Draft Reconciliation
//!
//! Keeps a user's in-progress script edits consistent with a server
//! snapshot that background jobs keep changing.
//!
//! # Architecture
//!
//! ```text
//! server snapshot ─┐
//!                  ├─ resolve_baseline ─→ baseline ─┐
//! optimistic save ─┘                                ├─→ visible = draft ?? baseline
//!                                        draft ─────┘
//! ```
//!
//! - [`resolve_baseline`]: picks the live server snapshot or a pinned
//!   optimistic save
//! - [`DraftStore`]: owns every per-key draft and optimistic-saved entry
//! - [`SaveTicket`]: explicit handle for one in-flight save, checked for
//!   supersession before its result is applied
//!
//! All operations are synchronous. The only asynchrony is the remote save,
//! which happens between [`DraftStore::begin_save`] and
//! [`DraftStore::complete_save`] / [`DraftStore::fail_save`] without holding
//! any borrow of the store.
//!
//! # Example
//!
//! ```rust
//! use podscript_draft::DraftStore;
//! use podscript_segment::{EntityKey, Segment, SegmentPatch};
//!
//! let server = vec![Segment::new(0, "host", "a")];
//! let key = EntityKey::from("pod-1");
//! let mut store = DraftStore::new();
//!
//! store.update_segment(&key, Some(&server), 0, SegmentPatch::line("b"))?;
//! assert!(store.has_changes(&key, Some(&server))?);
//!
//! let ticket = store.begin_save(&key, Some(&server))?;
//! // ... persist ticket.segments() remotely ...
//! store.complete_save(ticket, Some(&server))?;
//! assert!(!store.has_changes(&key, Some(&server))?);
//! assert_eq!(store.segments(&key, Some(&server))?[0].line, "b");
//! # Ok::<(), podscript_draft::DraftError>(())
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod baseline;
mod error;
mod lifecycle;
mod store;

pub use baseline::{resolve_baseline, OptimisticSaved};
pub use error::{DraftError, DraftResult};
pub use lifecycle::{SaveOutcome, SaveTicket};
pub use store::{DraftStore, EntityDraft};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
