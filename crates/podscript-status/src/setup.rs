//! Setup mode
//!
//! Setup mode is shown only for entities that have never been configured or
//! generated. The predicate is pure; [`SetupModeLatch`] adds the rule that an
//! entity never re-enters setup mode once it has left it.

use crate::policy::is_generating_status;
use crate::status::GenerationStatus;
use podscript_segment::EntityKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Entity facts the setup predicate reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupSignals {
    /// At least one source document is attached
    pub has_documents: bool,
    /// A generation job has been started at least once
    pub generation_started: bool,
    /// The entity already has script segments
    pub has_script: bool,
    /// Current generation status
    pub status: GenerationStatus,
}

/// Whether the entity is still in setup mode
///
/// True only when no documents are attached, no generation was ever
/// started, there is no script yet, and no job is currently running.
///
/// "Running" is always the fixed set of job statuses, whatever the
/// [`crate::StatusPolicy`] says about `drafting`: a fresh entity sits in
/// `drafting` and must be able to enter setup.
#[inline]
#[must_use]
pub fn is_setup_mode(signals: &SetupSignals) -> bool {
    !signals.has_documents
        && !signals.generation_started
        && !signals.has_script
        && !is_generating_status(signals.status)
}

/// Per-key record of entities that have left setup mode
#[derive(Debug, Clone, Default)]
pub struct SetupModeLatch {
    exited: HashSet<EntityKey>,
}

impl SetupModeLatch {
    /// Create empty latch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate setup mode for `key`, latching the exit
    pub fn evaluate(&mut self, key: &EntityKey, signals: &SetupSignals) -> bool {
        if self.exited.contains(key) {
            return false;
        }
        if is_setup_mode(signals) {
            return true;
        }
        tracing::debug!(%key, "entity left setup mode");
        self.exited.insert(key.clone());
        false
    }

    /// Whether `key` has already left setup mode
    #[inline]
    #[must_use]
    pub fn has_exited(&self, key: &EntityKey) -> bool {
        self.exited.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> SetupSignals {
        SetupSignals {
            has_documents: false,
            generation_started: false,
            has_script: false,
            status: GenerationStatus::Drafting,
        }
    }

    #[test]
    fn fresh_entity_is_in_setup() {
        assert!(is_setup_mode(&fresh()));
    }

    #[test]
    fn any_signal_exits_setup() {
        let with_docs = SetupSignals {
            has_documents: true,
            ..fresh()
        };
        let started = SetupSignals {
            generation_started: true,
            ..fresh()
        };
        let scripted = SetupSignals {
            has_script: true,
            ..fresh()
        };
        let running = SetupSignals {
            status: GenerationStatus::GeneratingScript,
            ..fresh()
        };
        for signals in [with_docs, started, scripted, running] {
            assert!(!is_setup_mode(&signals));
        }
    }

    #[test]
    fn latch_never_reenters() {
        let key = EntityKey::from("pod-1");
        let mut latch = SetupModeLatch::default();

        assert!(latch.evaluate(&key, &fresh()));
        assert!(!latch.evaluate(
            &key,
            &SetupSignals {
                has_documents: true,
                ..fresh()
            }
        ));
        // documents detached again: still not setup
        assert!(!latch.evaluate(&key, &fresh()));
        assert!(latch.has_exited(&key));
    }

    #[test]
    fn drafting_never_blocks_setup() {
        // a fresh entity is always in drafting
        assert!(is_setup_mode(&fresh()));
        assert!(SetupModeLatch::new().evaluate(&EntityKey::from("new"), &fresh()));
    }

    #[test]
    fn latch_is_per_key() {
        let mut latch = SetupModeLatch::default();
        let scripted = SetupSignals {
            has_script: true,
            ..fresh()
        };
        assert!(!latch.evaluate(&EntityKey::from("a"), &scripted));
        assert!(latch.evaluate(&EntityKey::from("b"), &fresh()));
    }
}
