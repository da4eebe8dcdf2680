//! Generation status enum and transition table

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Lifecycle stage of an entity's background generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Created, nothing generated yet
    Drafting,
    /// Script generation job running
    GeneratingScript,
    /// Script produced, audio not yet started
    ScriptReady,
    /// Audio synthesis job running
    GeneratingAudio,
    /// Script and audio available
    Ready,
    /// Last job failed
    Failed,
}

impl GenerationStatus {
    /// Every status, in forward pipeline order with `Failed` last
    pub const ALL: [Self; 6] = [
        Self::Drafting,
        Self::GeneratingScript,
        Self::ScriptReady,
        Self::GeneratingAudio,
        Self::Ready,
        Self::Failed,
    ];

    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drafting => "drafting",
            Self::GeneratingScript => "generating_script",
            Self::ScriptReady => "script_ready",
            Self::GeneratingAudio => "generating_audio",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    /// Human-readable progress label
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Drafting => "Draft",
            Self::GeneratingScript => "Writing script",
            Self::ScriptReady => "Script ready",
            Self::GeneratingAudio => "Generating audio",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
        }
    }

    /// Step along the forward pipeline (0..=4); `None` for `Failed`
    #[inline]
    #[must_use]
    pub const fn progress_step(self) -> Option<u8> {
        match self {
            Self::Drafting => Some(0),
            Self::GeneratingScript => Some(1),
            Self::ScriptReady => Some(2),
            Self::GeneratingAudio => Some(3),
            Self::Ready => Some(4),
            Self::Failed => None,
        }
    }

    /// Number of forward steps after `Drafting`
    pub const PROGRESS_STEPS: u8 = 4;
}

impl Display for GenerationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StatusError::Unknown(s.to_string()))
    }
}

/// Status errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    /// Transition not in the table
    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition {
        /// Current status
        from: GenerationStatus,
        /// Requested status
        to: GenerationStatus,
    },

    /// Unrecognised wire name
    #[error("unknown generation status: '{0}'")]
    Unknown(String),
}

/// Statuses reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: GenerationStatus) -> Vec<GenerationStatus> {
    use GenerationStatus::*;
    match from {
        Drafting => vec![GeneratingScript],
        GeneratingScript => vec![ScriptReady, Failed],
        ScriptReady => vec![GeneratingAudio, Failed],
        GeneratingAudio => vec![Ready, Failed],
        Ready => vec![GeneratingScript],
        Failed => vec![GeneratingScript],
    }
}

/// Validate a single status transition
///
/// # Errors
/// Returns [`StatusError::IllegalTransition`] if `to` is not reachable from `from`
pub fn validate_transition(from: GenerationStatus, to: GenerationStatus) -> Result<(), StatusError> {
    if allowed_transitions(from).contains(&to) {
        tracing::trace!(%from, %to, "status transition");
        Ok(())
    } else {
        Err(StatusError::IllegalTransition { from, to })
    }
}
