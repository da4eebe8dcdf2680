//! Draft reconciliation store
//!
//! One owned store per editing context. Every operation is keyed by
//! [`EntityKey`] and touches only that key's entries.

use crate::baseline::{resolve_baseline, OptimisticSaved};
use crate::error::DraftResult;
use crate::lifecycle::{SaveOutcome, SaveTicket};
use podscript_segment::{
    insert_segment, move_segment, remove_segment, update_segment, ComparisonKey, EntityKey,
    InsertPosition, NewSegment, Segment, SegmentError, SegmentPatch,
};
use std::collections::{BTreeSet, HashMap};
use ulid::Ulid;

/// Per-key save bookkeeping
#[derive(Debug)]
pub(crate) struct SaveLedger {
    /// Fresh per ledger; tickets from another store or a forgotten key never match
    pub(crate) id: Ulid,
    /// Bumped by every local edit, discard and reset
    pub(crate) epoch: u64,
    /// Last issued ticket sequence number
    pub(crate) issued: u64,
    /// Highest sequence whose result was applied (or invalidated by a reset)
    pub(crate) committed: u64,
    /// Tickets issued and not yet settled
    pub(crate) outstanding: BTreeSet<u64>,
}

impl Default for SaveLedger {
    fn default() -> Self {
        Self {
            id: Ulid::new(),
            epoch: 0,
            issued: 0,
            committed: 0,
            outstanding: BTreeSet::new(),
        }
    }
}

/// Per-entity drafts and optimistic baselines
///
/// # Invariants
/// - A draft entry exists only while it differs from the baseline
/// - Optimistic-saved entries are written only by a successful save or a
///   reset, through [`DraftStore::commit_baseline`]
#[derive(Debug, Default)]
pub struct DraftStore {
    pub(crate) drafts: HashMap<EntityKey, Vec<Segment>>,
    pub(crate) saved: HashMap<EntityKey, OptimisticSaved>,
    pub(crate) ledgers: HashMap<EntityKey, SaveLedger>,
}

impl DraftStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a per-key view bound to the current server snapshot
    #[inline]
    pub fn entity<'a>(&'a mut self, key: &EntityKey, server: Option<&'a [Segment]>) -> EntityDraft<'a> {
        EntityDraft {
            store: self,
            key: key.clone(),
            server,
        }
    }

    /// Baseline for `key` given the live server snapshot
    ///
    /// # Errors
    /// Returns error if the server comparison key cannot be computed
    pub fn baseline<'a>(&'a self, key: &EntityKey, server: Option<&'a [Segment]>) -> DraftResult<&'a [Segment]> {
        Ok(resolve_baseline(server, self.saved.get(key))?)
    }

    /// Visible segments: the draft if present, else the baseline
    ///
    /// # Errors
    /// Returns error if the server comparison key cannot be computed
    pub fn segments<'a>(&'a self, key: &EntityKey, server: Option<&'a [Segment]>) -> DraftResult<&'a [Segment]> {
        match self.drafts.get(key) {
            Some(draft) => Ok(draft),
            None => self.baseline(key, server),
        }
    }

    /// Whether the visible segments differ from the baseline
    ///
    /// # Errors
    /// Returns error if the server comparison key cannot be computed
    pub fn has_changes(&self, key: &EntityKey, server: Option<&[Segment]>) -> DraftResult<bool> {
        match self.drafts.get(key) {
            Some(draft) => Ok(self.baseline(key, server)? != draft.as_slice()),
            None => Ok(false),
        }
    }

    /// Whether any save for `key` is still in flight
    #[inline]
    #[must_use]
    pub fn is_saving(&self, key: &EntityKey) -> bool {
        self.ledgers
            .get(key)
            .is_some_and(|ledger| !ledger.outstanding.is_empty())
    }

    /// Raw draft entry, if any
    #[inline]
    #[must_use]
    pub fn draft(&self, key: &EntityKey) -> Option<&[Segment]> {
        self.drafts.get(key).map(Vec::as_slice)
    }

    /// Raw optimistic-saved entry, if any
    #[inline]
    #[must_use]
    pub fn optimistic_saved(&self, key: &EntityKey) -> Option<&OptimisticSaved> {
        self.saved.get(key)
    }

    /// Merge fields into the segment with `index`
    ///
    /// # Errors
    /// Returns [`SegmentError::NotFound`] (wrapped) if no segment has `index`
    pub fn update_segment(
        &mut self,
        key: &EntityKey,
        server: Option<&[Segment]>,
        index: usize,
        patch: SegmentPatch,
    ) -> DraftResult<()> {
        self.mutate(key, server, |segments| update_segment(segments, index, patch))
    }

    /// Insert a segment after `at` and reindex
    ///
    /// # Errors
    /// Returns error if the anchor does not exist
    pub fn add_segment(
        &mut self,
        key: &EntityKey,
        server: Option<&[Segment]>,
        at: InsertPosition,
        data: NewSegment,
    ) -> DraftResult<()> {
        self.mutate(key, server, |segments| insert_segment(segments, at, data))
    }

    /// Remove the segment with `index` and reindex
    ///
    /// # Errors
    /// Returns error if no segment has `index`
    pub fn remove_segment(&mut self, key: &EntityKey, server: Option<&[Segment]>, index: usize) -> DraftResult<()> {
        self.mutate(key, server, |segments| remove_segment(segments, index))
    }

    /// Move the segment at array position `from` to `to` and reindex
    ///
    /// # Errors
    /// Returns error if either position is out of range
    pub fn reorder_segments(
        &mut self,
        key: &EntityKey,
        server: Option<&[Segment]>,
        from: usize,
        to: usize,
    ) -> DraftResult<()> {
        self.mutate(key, server, |segments| move_segment(segments, from, to))
    }

    /// Drop the draft for `key`; idempotent
    pub fn discard_changes(&mut self, key: &EntityKey) {
        if self.drafts.remove(key).is_some() {
            tracing::debug!(%key, "draft discarded");
        }
        self.bump_epoch(key);
    }

    /// Drop every entry held for `key` (the entity no longer exists)
    pub fn forget(&mut self, key: &EntityKey) {
        self.drafts.remove(key);
        self.saved.remove(key);
        self.ledgers.remove(key);
    }

    /// Apply a transform to the visible segments and settle the result
    fn mutate<F>(&mut self, key: &EntityKey, server: Option<&[Segment]>, f: F) -> DraftResult<()>
    where
        F: FnOnce(&[Segment]) -> Result<Vec<Segment>, SegmentError>,
    {
        let next = f(self.segments(key, server)?)?;
        self.settle(key, server, next)?;
        self.bump_epoch(key);
        Ok(())
    }

    /// Commit rule: a result equal to the baseline clears the draft
    pub(crate) fn settle(&mut self, key: &EntityKey, server: Option<&[Segment]>, next: Vec<Segment>) -> DraftResult<()> {
        let matches_baseline = self.baseline(key, server)? == next.as_slice();
        if matches_baseline {
            if self.drafts.remove(key).is_some() {
                tracing::debug!(%key, "draft returned to baseline");
            }
        } else if self.drafts.insert(key.clone(), next).is_none() {
            tracing::debug!(%key, "draft created");
        }
        Ok(())
    }

    /// Write a new optimistic baseline pinned to `base_server_key`
    ///
    /// With `clear_draft` the draft is dropped outright; otherwise it is kept
    /// and re-settled against the new baseline.
    pub(crate) fn commit_baseline(
        &mut self,
        key: &EntityKey,
        server: Option<&[Segment]>,
        segments: Vec<Segment>,
        base_server_key: ComparisonKey,
        clear_draft: bool,
    ) -> DraftResult<()> {
        tracing::debug!(%key, base = %base_server_key, len = segments.len(), "optimistic baseline committed");
        self.saved
            .insert(key.clone(), OptimisticSaved::new(segments, base_server_key));

        if clear_draft {
            self.drafts.remove(key);
        } else if let Some(draft) = self.drafts.remove(key) {
            self.settle(key, server, draft)?;
        }
        Ok(())
    }

    pub(crate) fn ledger_mut(&mut self, key: &EntityKey) -> &mut SaveLedger {
        self.ledgers.entry(key.clone()).or_default()
    }

    fn bump_epoch(&mut self, key: &EntityKey) {
        self.ledger_mut(key).epoch += 1;
    }
}

/// Mutable per-key view over a [`DraftStore`]
///
/// Binds one key and one server snapshot so call sites read like the UI
/// surface: `segments`, `has_changes`, `update_segment`, and so on.
#[derive(Debug)]
pub struct EntityDraft<'a> {
    store: &'a mut DraftStore,
    key: EntityKey,
    server: Option<&'a [Segment]>,
}

impl EntityDraft<'_> {
    /// Bound key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Visible segments
    ///
    /// # Errors
    /// See [`DraftStore::segments`]
    pub fn segments(&self) -> DraftResult<&[Segment]> {
        self.store.segments(&self.key, self.server)
    }

    /// Current baseline
    ///
    /// # Errors
    /// See [`DraftStore::baseline`]
    pub fn baseline(&self) -> DraftResult<&[Segment]> {
        self.store.baseline(&self.key, self.server)
    }

    /// See [`DraftStore::has_changes`]
    ///
    /// # Errors
    /// Returns error if the server comparison key cannot be computed
    pub fn has_changes(&self) -> DraftResult<bool> {
        self.store.has_changes(&self.key, self.server)
    }

    /// See [`DraftStore::is_saving`]
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.store.is_saving(&self.key)
    }

    /// See [`DraftStore::update_segment`]
    ///
    /// # Errors
    /// Returns error if no segment has `index`
    pub fn update_segment(&mut self, index: usize, patch: SegmentPatch) -> DraftResult<()> {
        self.store.update_segment(&self.key, self.server, index, patch)
    }

    /// See [`DraftStore::add_segment`]
    ///
    /// # Errors
    /// Returns error if the anchor does not exist
    pub fn add_segment(&mut self, at: InsertPosition, data: NewSegment) -> DraftResult<()> {
        self.store.add_segment(&self.key, self.server, at, data)
    }

    /// See [`DraftStore::remove_segment`]
    ///
    /// # Errors
    /// Returns error if no segment has `index`
    pub fn remove_segment(&mut self, index: usize) -> DraftResult<()> {
        self.store.remove_segment(&self.key, self.server, index)
    }

    /// See [`DraftStore::reorder_segments`]
    ///
    /// # Errors
    /// Returns error if either position is out of range
    pub fn reorder_segments(&mut self, from: usize, to: usize) -> DraftResult<()> {
        self.store.reorder_segments(&self.key, self.server, from, to)
    }

    /// See [`DraftStore::discard_changes`]
    pub fn discard_changes(&mut self) {
        self.store.discard_changes(&self.key);
    }

    /// See [`DraftStore::begin_save`]
    ///
    /// # Errors
    /// Returns error if the server comparison key cannot be computed
    pub fn begin_save(&mut self) -> DraftResult<SaveTicket> {
        self.store.begin_save(&self.key, self.server)
    }

    /// See [`DraftStore::complete_save`]
    ///
    /// # Errors
    /// Returns error if the ticket is unknown to this store
    pub fn complete_save(&mut self, ticket: SaveTicket) -> DraftResult<SaveOutcome> {
        self.store.complete_save(ticket, self.server)
    }

    /// See [`DraftStore::reset_to_segments`]
    ///
    /// # Errors
    /// Returns error if the server comparison key cannot be computed
    pub fn reset_to_segments(&mut self, segments: Vec<Segment>) -> DraftResult<()> {
        self.store.reset_to_segments(&self.key, self.server, segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podscript_segment::Speaker;
    use pretty_assertions::assert_eq;

    fn key(id: &str) -> EntityKey {
        EntityKey::from(id)
    }

    fn baseline() -> Vec<Segment> {
        vec![Segment::new(0, Speaker::HOST, "a")]
    }

    #[test]
    fn revert_to_baseline_clears_changes() {
        let server = baseline();
        let k = key("pod");
        let mut store = DraftStore::new();

        store.update_segment(&k, Some(&server), 0, SegmentPatch::line("b")).unwrap();
        assert!(store.has_changes(&k, Some(&server)).unwrap());

        store.update_segment(&k, Some(&server), 0, SegmentPatch::line("a")).unwrap();
        assert!(!store.has_changes(&k, Some(&server)).unwrap());
        assert!(store.draft(&k).is_none());
        assert_eq!(store.segments(&k, Some(&server)).unwrap(), server.as_slice());
    }

    #[test]
    fn insertion_at_head() {
        let server = vec![Segment::new(0, Speaker::HOST, "a"), Segment::new(1, Speaker::COHOST, "b")];
        let k = key("pod");
        let mut store = DraftStore::new();

        store
            .add_segment(&k, Some(&server), InsertPosition::Start, NewSegment::new(Speaker::HOST, "x"))
            .unwrap();

        assert_eq!(
            store.segments(&k, Some(&server)).unwrap(),
            &[
                Segment::new(0, Speaker::HOST, "x"),
                Segment::new(1, Speaker::HOST, "a"),
                Segment::new(2, Speaker::COHOST, "b"),
            ]
        );
    }

    #[test]
    fn rejected_edit_leaves_state_untouched() {
        let server = baseline();
        let k = key("pod");
        let mut store = DraftStore::new();

        assert!(store.remove_segment(&k, Some(&server), 9).unwrap_err().is_rejected_edit());
        assert!(store.draft(&k).is_none());
    }

    #[test]
    fn discard_is_idempotent() {
        let server = baseline();
        let k = key("pod");
        let mut store = DraftStore::new();
        store.update_segment(&k, Some(&server), 0, SegmentPatch::line("b")).unwrap();

        store.discard_changes(&k);
        let once = store.segments(&k, Some(&server)).unwrap().to_vec();
        store.discard_changes(&k);

        assert_eq!(store.segments(&k, Some(&server)).unwrap(), once.as_slice());
        assert!(!store.has_changes(&k, Some(&server)).unwrap());
    }

    #[test]
    fn entity_view_delegates() {
        let server = baseline();
        let mut store = DraftStore::new();
        let mut view = store.entity(&key("pod"), Some(&server));

        view.add_segment(InsertPosition::After(0), NewSegment::new(Speaker::COHOST, "b")).unwrap();
        assert!(view.has_changes().unwrap());
        assert_eq!(view.segments().unwrap().len(), 2);
        assert_eq!(view.baseline().unwrap(), server.as_slice());

        view.discard_changes();
        assert!(!view.has_changes().unwrap());
    }

    #[test]
    fn forget_drops_everything() {
        let server = baseline();
        let k = key("pod");
        let mut store = DraftStore::new();
        store.update_segment(&k, Some(&server), 0, SegmentPatch::line("b")).unwrap();
        let ticket = store.begin_save(&k, Some(&server)).unwrap();

        store.forget(&k);
        assert!(store.draft(&k).is_none());
        assert!(!store.is_saving(&k));
        assert!(store.complete_save(ticket, Some(&server)).is_err());
    }
}
