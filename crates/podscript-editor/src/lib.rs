//! Podscript Editor Session
//!
//! Ties the draft store to a podcast backend:
//!
//! - [`EditorSession`]: script edits, saves, generation, settings, documents
//!   and listings for one user, gated on generation status
//! - [`PodcastBackend`]: the server seam, with [`InMemoryBackend`] for
//!   replays and tests
//! - [`replay`]: scripted sessions driven from YAML, used by the
//!   `podscript-replay` binary
//!
//! Server snapshots and listings live in query caches. Mutations apply to
//! the cache first and roll back if the backend rejects them; fetches in
//! flight are cancelled before a mutation touches their key.
//!
//! # Example
//!
//! ```rust
//! use podscript_editor::{EditorConfig, EditorSession, InMemoryBackend, PodcastSnapshot};
//! use podscript_segment::{EntityKey, Segment, SegmentPatch};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let mut podcast = PodcastSnapshot::new("p1", "Weekly");
//! podcast.segments = Some(vec![Segment::new(0, "host", "Hello")]);
//! let backend = Arc::new(InMemoryBackend::with_podcasts([podcast]));
//! let session = EditorSession::new(backend, &EditorConfig::default());
//!
//! let key = EntityKey::from("p1");
//! session.refresh(&key).await?;
//! session.update_segment(&key, 0, SegmentPatch::line("Hi")).await?;
//! assert!(session.view(&key).await?.has_changes);
//!
//! session.save_changes(&key).await?;
//! let view = session.view(&key).await?;
//! assert!(!view.has_changes);
//! assert_eq!(view.segments[0].line, "Hi");
//! # Ok::<(), podscript_editor::EditorError>(())
//! # }).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod backend;
mod config;
mod error;
mod model;
pub mod replay;
mod session;
mod telemetry;

pub use backend::{BackendOp, FailureRule, InMemoryBackend, PodcastBackend};
pub use config::{EditorConfig, LogConfig, LogFormat};
pub use error::{BackendError, ConfigError, EditorError, EditorResult};
pub use model::{DocumentRef, JobAccepted, ListScope, PodcastSettings, PodcastSnapshot, PodcastSummary};
pub use session::{EditorSession, ScriptView};
pub use telemetry::init_tracing;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
