//! Edit-gating predicates

use crate::status::GenerationStatus;
use serde::{Deserialize, Serialize};

/// Which statuses count as "generating"
///
/// `generating_script`, `script_ready` and `generating_audio` always do.
/// `drafting` does not by default, so a freshly created entity is editable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPolicy {
    /// Treat `drafting` as generating too
    #[serde(default)]
    pub drafting_is_generating: bool,
}

impl StatusPolicy {
    /// Default policy
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            drafting_is_generating: false,
        }
    }

    /// Whether a background job currently owns the entity
    #[inline]
    #[must_use]
    pub const fn is_generating(self, status: GenerationStatus) -> bool {
        match status {
            GenerationStatus::GeneratingScript
            | GenerationStatus::ScriptReady
            | GenerationStatus::GeneratingAudio => true,
            GenerationStatus::Drafting => self.drafting_is_generating,
            GenerationStatus::Ready | GenerationStatus::Failed => false,
        }
    }

    /// Whether script, settings and document edits are blocked
    #[inline]
    #[must_use]
    pub const fn is_action_disabled(self, status: GenerationStatus, pending: bool) -> bool {
        pending || self.is_generating(status)
    }
}

/// [`StatusPolicy::is_generating`] under the default policy
#[inline]
#[must_use]
pub const fn is_generating_status(status: GenerationStatus) -> bool {
    StatusPolicy::new().is_generating(status)
}

/// Whether generation has fully completed
#[inline]
#[must_use]
pub const fn is_ready_status(status: GenerationStatus) -> bool {
    matches!(status, GenerationStatus::Ready)
}

/// [`StatusPolicy::is_action_disabled`] under the default policy
///
/// `pending` is true while a mutation for the entity is in flight.
#[inline]
#[must_use]
pub const fn is_action_disabled(status: GenerationStatus, pending: bool) -> bool {
    StatusPolicy::new().is_action_disabled(status, pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use GenerationStatus::*;

    #[test]
    fn generating_set() {
        let generating: Vec<_> = GenerationStatus::ALL
            .into_iter()
            .filter(|s| is_generating_status(*s))
            .collect();
        assert_eq!(generating, [GeneratingScript, ScriptReady, GeneratingAudio]);
    }

    #[test]
    fn drafting_policy_switch() {
        let strict = StatusPolicy {
            drafting_is_generating: true,
        };
        assert!(strict.is_generating(Drafting));
        assert!(!StatusPolicy::default().is_generating(Drafting));
    }

    #[test]
    fn action_disabled_while_pending_or_generating() {
        assert!(is_action_disabled(Ready, true));
        assert!(is_action_disabled(GeneratingAudio, false));
        assert!(!is_action_disabled(Failed, false));
        assert!(!is_action_disabled(Drafting, false));
    }

    #[test]
    fn only_ready_is_ready() {
        assert!(is_ready_status(Ready));
        assert!(!is_ready_status(ScriptReady));
    }
}
