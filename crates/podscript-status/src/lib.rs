//! Podscript Generation Status
//!
//! The server-tracked lifecycle of a podcast's background generation job,
//! and the predicates that decide whether edits are currently legal.
//!
//! ```text
//! drafting → generating_script → script_ready → generating_audio → ready
//!                  ↑    ↘             ↘               ↘             │
//!                  │     └──────────── failed ←─────────┘           │
//!                  └──────────────────────┴─────────────────────────┘
//! ```
//!
//! `ready` and `failed` both lead back into `generating_script`
//! (regenerate / retry), so the pipeline is cyclic.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod policy;
mod setup;
mod status;

pub use policy::{is_action_disabled, is_generating_status, is_ready_status, StatusPolicy};
pub use setup::{is_setup_mode, SetupModeLatch, SetupSignals};
pub use status::{allowed_transitions, validate_transition, GenerationStatus, StatusError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
