//! Save / reset lifecycle
//!
//! The only code that writes optimistic-saved entries. A save is split into
//! [`DraftStore::begin_save`], which issues a [`SaveTicket`], and one of
//! [`DraftStore::complete_save`] / [`DraftStore::fail_save`] once the remote
//! call settles. Local edits may happen in between; the ticket records
//! enough to tell whether they did.

use crate::error::{DraftError, DraftResult};
use crate::store::DraftStore;
use podscript_segment::{reindex, ComparisonKey, EntityKey, Segment};
use ulid::Ulid;

/// Handle for one in-flight save
///
/// Not `Clone`: each ticket is settled exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct SaveTicket {
    key: EntityKey,
    ledger: Ulid,
    seq: u64,
    epoch: u64,
    base_server_key: ComparisonKey,
    segments: Vec<Segment>,
}

impl SaveTicket {
    /// Entity being saved
    #[inline]
    #[must_use]
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Per-key issue order
    #[inline]
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Server comparison key when the save was issued
    #[inline]
    #[must_use]
    pub fn base_server_key(&self) -> &ComparisonKey {
        &self.base_server_key
    }

    /// Segments to persist (the visible segments at issue time)
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

/// How a successful save was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No edits since issue: draft cleared, saved segments are the new baseline
    ///
    /// Reported even when the server snapshot moved while the call was in
    /// flight. The saved entry is then already stale and the live server
    /// snapshot is what [`crate::resolve_baseline`] shows.
    Committed,
    /// Edited or discarded since issue: new baseline written, newer draft kept
    CommittedBehindDraft,
    /// A newer save or a reset already committed; nothing changed
    Superseded,
}

impl SaveOutcome {
    /// Stable name for reports
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::CommittedBehindDraft => "committed_behind_draft",
            Self::Superseded => "superseded",
        }
    }

    /// Whether the store state changed
    #[inline]
    #[must_use]
    pub fn was_applied(self) -> bool {
        !matches!(self, Self::Superseded)
    }
}

impl DraftStore {
    /// Issue a ticket for saving the visible segments of `key`
    ///
    /// The ticket pins the save to the server snapshot as it is now.
    ///
    /// # Errors
    /// Returns error if a comparison key cannot be computed
    pub fn begin_save(&mut self, key: &EntityKey, server: Option<&[Segment]>) -> DraftResult<SaveTicket> {
        let segments = self.segments(key, server)?.to_vec();
        let base_server_key = ComparisonKey::of_snapshot(server)?;

        let ledger = self.ledger_mut(key);
        ledger.issued += 1;
        let seq = ledger.issued;
        ledger.outstanding.insert(seq);
        let epoch = ledger.epoch;
        let ledger = ledger.id;

        tracing::info!(%key, seq, base = %base_server_key, len = segments.len(), "save started");
        Ok(SaveTicket {
            key: key.clone(),
            ledger,
            seq,
            epoch,
            base_server_key,
            segments,
        })
    }

    /// Apply a successful save
    ///
    /// `server` is the live snapshot now, used to re-settle a draft that
    /// survived the save.
    ///
    /// # Errors
    /// Returns [`DraftError::UnknownTicket`] if this store did not issue the
    /// ticket or has since forgotten the key
    pub fn complete_save(&mut self, ticket: SaveTicket, server: Option<&[Segment]>) -> DraftResult<SaveOutcome> {
        let ledger = self.settle_ticket(&ticket)?;
        let SaveTicket {
            key,
            seq,
            epoch,
            base_server_key,
            segments,
            ..
        } = ticket;

        if seq <= ledger.committed {
            tracing::warn!(%key, seq, committed = ledger.committed, "late save result ignored");
            return Ok(SaveOutcome::Superseded);
        }
        ledger.committed = seq;
        let edited_since = ledger.epoch != epoch;

        self.commit_baseline(&key, server, segments, base_server_key, !edited_since)?;
        if edited_since {
            tracing::info!(%key, seq, "save committed behind newer draft");
            Ok(SaveOutcome::CommittedBehindDraft)
        } else {
            tracing::info!(%key, seq, "save committed");
            Ok(SaveOutcome::Committed)
        }
    }

    /// Record a failed save; the draft is left exactly as it is
    ///
    /// # Errors
    /// Returns [`DraftError::UnknownTicket`] if this store did not issue the ticket
    pub fn fail_save(&mut self, ticket: SaveTicket) -> DraftResult<()> {
        self.settle_ticket(&ticket)?;
        tracing::warn!(key = %ticket.key, seq = ticket.seq, "save failed, draft kept");
        Ok(())
    }

    /// Remove `ticket` from its ledger's outstanding set
    fn settle_ticket(&mut self, ticket: &SaveTicket) -> DraftResult<&mut crate::store::SaveLedger> {
        let unknown = || DraftError::unknown_ticket(&ticket.key, ticket.seq);
        let ledger = self
            .ledgers
            .get_mut(&ticket.key)
            .filter(|ledger| ledger.id == ticket.ledger)
            .ok_or_else(unknown)?;
        if !ledger.outstanding.remove(&ticket.seq) {
            return Err(unknown());
        }
        Ok(ledger)
    }

    /// Replace the baseline with externally supplied segments
    ///
    /// No network round trip. Clears the draft, pins `segments` to the
    /// current server snapshot, and invalidates every outstanding ticket so
    /// none of them can overwrite the reset.
    ///
    /// # Errors
    /// Returns error if the server comparison key cannot be computed
    pub fn reset_to_segments(
        &mut self,
        key: &EntityKey,
        server: Option<&[Segment]>,
        mut segments: Vec<Segment>,
    ) -> DraftResult<()> {
        reindex(&mut segments);
        let base_server_key = ComparisonKey::of_snapshot(server)?;

        let ledger = self.ledger_mut(key);
        ledger.committed = ledger.issued;
        ledger.epoch += 1;

        tracing::info!(%key, len = segments.len(), "baseline reset");
        self.commit_baseline(key, server, segments, base_server_key, true)
    }
}
