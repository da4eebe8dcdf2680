//! Editor session
//!
//! Wires the draft store, the status predicates and the optimistic
//! mutation adapter to a [`PodcastBackend`]. The draft store lock is only
//! ever held for synchronous sections, never across an `.await`.

use crate::backend::PodcastBackend;
use crate::config::EditorConfig;
use crate::error::{EditorError, EditorResult};
use crate::model::{DocumentRef, JobAccepted, ListScope, PodcastSettings, PodcastSnapshot, PodcastSummary};
use dashmap::DashMap;
use parking_lot::Mutex;
use podscript_draft::{DraftResult, DraftStore, SaveOutcome};
use podscript_optimistic::{bulk_remove, MemoryQueryCache, OptimisticMutation, QueryCache};
use podscript_segment::{EntityKey, InsertPosition, NewSegment, Segment, SegmentPatch};
use podscript_status::{validate_transition, GenerationStatus, SetupModeLatch, StatusPolicy};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Every listing scope the session may cache
const LIST_SCOPES: [ListScope; 3] = [ListScope::All, ListScope::InProgress, ListScope::Ready];

/// What the script editor renders for one podcast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptView {
    /// Podcast id
    pub id: EntityKey,
    /// Title
    pub title: String,
    /// Visible segments (draft or baseline)
    pub segments: Vec<Segment>,
    /// Visible segments differ from the baseline
    pub has_changes: bool,
    /// A script save is in flight
    pub is_saving: bool,
    /// Generation status
    pub status: GenerationStatus,
    /// Progress along the generation pipeline
    pub progress_step: Option<u8>,
    /// A background job owns the podcast
    pub is_generating: bool,
    /// Setup flow is shown instead of the editor
    pub setup_mode: bool,
    /// Script, settings and document actions are disabled
    pub action_disabled: bool,
}

/// Decrements the per-key pending count on drop
struct PendingGuard<'a> {
    pending: &'a DashMap<EntityKey, usize>,
    key: EntityKey,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove_if_mut(&self.key, |_, count| {
            *count -= 1;
            *count == 0
        });
    }
}

/// One user's editing context
pub struct EditorSession {
    backend: Arc<dyn PodcastBackend>,
    drafts: Mutex<DraftStore>,
    snapshots: MemoryQueryCache<EntityKey, PodcastSnapshot>,
    lists: MemoryQueryCache<ListScope, Vec<PodcastSummary>>,
    setup: Mutex<SetupModeLatch>,
    pending: DashMap<EntityKey, usize>,
    policy: StatusPolicy,
}

impl EditorSession {
    /// Create session over `backend`
    #[must_use]
    pub fn new(backend: Arc<dyn PodcastBackend>, config: &EditorConfig) -> Self {
        let policy = config.status_policy();
        Self {
            backend,
            drafts: Mutex::new(DraftStore::new()),
            snapshots: MemoryQueryCache::new(config.snapshot_capacity),
            lists: MemoryQueryCache::new(config.list_capacity),
            setup: Mutex::new(SetupModeLatch::new()),
            pending: DashMap::new(),
            policy,
        }
    }

    /// Status policy in effect
    #[inline]
    #[must_use]
    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    // --- Snapshots -------------------------------------------------------

    /// Fetch the podcast from the backend into the cache
    ///
    /// # Errors
    /// Returns error if the fetch fails or is cancelled by a mutation
    pub async fn refresh(&self, key: &EntityKey) -> EditorResult<PodcastSnapshot> {
        let backend = Arc::clone(&self.backend);
        let id = key.clone();
        self.snapshots
            .fetch_with(key.clone(), async move { backend.fetch_podcast(&id).await })
            .await
            .map_err(|err| EditorError::from_fetch(key, err))
    }

    /// Cached snapshot
    ///
    /// # Errors
    /// Returns [`EditorError::NotLoaded`] if [`Self::refresh`] has not run
    pub async fn snapshot(&self, key: &EntityKey) -> EditorResult<PodcastSnapshot> {
        self.snapshots
            .get(key)
            .await?
            .ok_or_else(|| EditorError::NotLoaded(key.clone()))
    }

    /// Render state for the script editor
    ///
    /// # Errors
    /// Returns error if the podcast is not loaded
    pub async fn view(&self, key: &EntityKey) -> EditorResult<ScriptView> {
        let snap = self.snapshot(key).await?;
        let server = snap.server_segments();
        let (segments, has_changes, is_saving) = {
            let drafts = self.drafts.lock();
            (
                drafts.segments(key, server)?.to_vec(),
                drafts.has_changes(key, server)?,
                drafts.is_saving(key),
            )
        };
        let setup_mode = self.setup.lock().evaluate(key, &snap.setup_signals());
        let pending = is_saving || self.pending.contains_key(key);

        Ok(ScriptView {
            id: snap.id.clone(),
            title: snap.title.clone(),
            segments,
            has_changes,
            is_saving,
            status: snap.status,
            progress_step: snap.status.progress_step(),
            is_generating: self.policy.is_generating(snap.status),
            setup_mode,
            action_disabled: pending || (!setup_mode && self.policy.is_generating(snap.status)),
        })
    }

    // --- Script edits ----------------------------------------------------

    /// Merge fields into the segment with `index`
    ///
    /// # Errors
    /// - [`EditorError::ActionDisabled`] while generating
    /// - [`EditorError::Draft`] if no segment has `index`
    pub async fn update_segment(&self, key: &EntityKey, index: usize, patch: SegmentPatch) -> EditorResult<()> {
        self.edit(key, |store, server| store.update_segment(key, server, index, patch))
            .await
    }

    /// Insert a segment
    ///
    /// # Errors
    /// - [`EditorError::ActionDisabled`] while generating
    /// - [`EditorError::Draft`] if the anchor does not exist
    pub async fn add_segment(&self, key: &EntityKey, at: InsertPosition, data: NewSegment) -> EditorResult<()> {
        self.edit(key, |store, server| store.add_segment(key, server, at, data))
            .await
    }

    /// Remove the segment with `index`
    ///
    /// # Errors
    /// - [`EditorError::ActionDisabled`] while generating
    /// - [`EditorError::Draft`] if no segment has `index`
    pub async fn remove_segment(&self, key: &EntityKey, index: usize) -> EditorResult<()> {
        self.edit(key, |store, server| store.remove_segment(key, server, index))
            .await
    }

    /// Move the segment at position `from` to `to`
    ///
    /// # Errors
    /// - [`EditorError::ActionDisabled`] while generating
    /// - [`EditorError::Draft`] if either position is out of range
    pub async fn reorder_segments(&self, key: &EntityKey, from: usize, to: usize) -> EditorResult<()> {
        self.edit(key, |store, server| store.reorder_segments(key, server, from, to))
            .await
    }

    /// Drop the draft; no network call
    pub fn discard_changes(&self, key: &EntityKey) {
        self.drafts.lock().discard_changes(key);
    }

    /// Replace the baseline with `segments` without a network call
    ///
    /// # Errors
    /// Returns error if the podcast is not loaded
    pub async fn reset_to_segments(&self, key: &EntityKey, segments: Vec<Segment>) -> EditorResult<()> {
        let snap = self.snapshot(key).await?;
        self.drafts
            .lock()
            .reset_to_segments(key, snap.server_segments(), segments)?;
        Ok(())
    }

    /// Persist the visible segments
    ///
    /// Edits made while the call is in flight are kept as a draft on top of
    /// the saved segments. On failure the draft is left untouched.
    ///
    /// # Errors
    /// - [`EditorError::ActionDisabled`] while generating
    /// - [`EditorError::Backend`] if the backend rejects the save
    pub async fn save_changes(&self, key: &EntityKey) -> EditorResult<SaveOutcome> {
        let snap = self.snapshot(key).await?;
        self.ensure_editable(key, &snap)?;
        let ticket = self.drafts.lock().begin_save(key, snap.server_segments())?;
        let segments = ticket.segments().to_vec();

        let backend = Arc::clone(&self.backend);
        let id = key.clone();
        let result = OptimisticMutation::new(key.clone(), PodcastSnapshot::clone)
            .with_label("save_script")
            .with_merge(|current: &PodcastSnapshot, job: &JobAccepted| PodcastSnapshot {
                status: job.status,
                ..current.clone()
            })
            .execute(&self.snapshots, || async move { backend.persist_script(&id, segments).await })
            .await;

        match result {
            Ok(_) => {
                // snapshot after the merge; fall back to the pre-save one
                let current = match self.snapshots.get(key).await {
                    Ok(current) => current.unwrap_or(snap),
                    Err(err) => {
                        self.drafts.lock().fail_save(ticket)?;
                        return Err(err.into());
                    }
                };
                Ok(self.drafts.lock().complete_save(ticket, current.server_segments())?)
            }
            Err(err) => {
                self.drafts.lock().fail_save(ticket)?;
                Err(err.into())
            }
        }
    }

    // --- Generation, settings, documents ---------------------------------

    /// Queue script generation, flipping the cached status immediately
    ///
    /// # Errors
    /// - [`EditorError::Status`] if generation cannot start from the current status
    /// - [`EditorError::Backend`] if the backend rejects it (status restored)
    pub async fn start_generation(&self, key: &EntityKey) -> EditorResult<JobAccepted> {
        let snap = self.snapshot(key).await?;
        validate_transition(snap.status, GenerationStatus::GeneratingScript)?;
        let _pending = self.begin_pending(key);

        let backend = Arc::clone(&self.backend);
        let id = key.clone();
        let job = OptimisticMutation::new(key.clone(), |current: &PodcastSnapshot| PodcastSnapshot {
            status: GenerationStatus::GeneratingScript,
            ..current.clone()
        })
        .with_label("start_generation")
        .with_merge(|current: &PodcastSnapshot, job: &JobAccepted| PodcastSnapshot {
            status: job.status,
            generation_context: Some(serde_json::json!({ "job_id": job.job_id.to_string() })),
            ..current.clone()
        })
        .execute(&self.snapshots, || async move { backend.start_generation(&id).await })
        .await?;

        tracing::info!(%key, job = %job.job_id, status = %job.status, "generation started");
        self.drop_lists().await?;
        Ok(job)
    }

    /// Replace generation settings
    ///
    /// # Errors
    /// - [`EditorError::ActionDisabled`] while generating, outside setup mode
    /// - [`EditorError::Backend`] if the backend rejects them (settings restored)
    pub async fn save_settings(&self, key: &EntityKey, settings: PodcastSettings) -> EditorResult<PodcastSettings> {
        let snap = self.snapshot(key).await?;
        self.ensure_configurable(key, &snap)?;
        let _pending = self.begin_pending(key);

        let backend = Arc::clone(&self.backend);
        let id = key.clone();
        let optimistic = settings.clone();
        let stored = OptimisticMutation::new(key.clone(), move |current: &PodcastSnapshot| PodcastSnapshot {
            settings: optimistic,
            ..current.clone()
        })
        .with_label("save_settings")
        .with_merge(|current: &PodcastSnapshot, stored: &PodcastSettings| PodcastSnapshot {
            settings: stored.clone(),
            ..current.clone()
        })
        .execute(&self.snapshots, || async move { backend.update_settings(&id, settings).await })
        .await?;
        Ok(stored)
    }

    /// Replace the attached documents
    ///
    /// # Errors
    /// - [`EditorError::ActionDisabled`] while generating, outside setup mode
    /// - [`EditorError::Backend`] if the backend rejects them (documents restored)
    pub async fn set_documents(&self, key: &EntityKey, documents: Vec<DocumentRef>) -> EditorResult<Vec<DocumentRef>> {
        let snap = self.snapshot(key).await?;
        self.ensure_configurable(key, &snap)?;
        let _pending = self.begin_pending(key);

        let backend = Arc::clone(&self.backend);
        let id = key.clone();
        let optimistic = documents.clone();
        let stored = OptimisticMutation::new(key.clone(), move |current: &PodcastSnapshot| PodcastSnapshot {
            documents: optimistic,
            ..current.clone()
        })
        .with_label("set_documents")
        .with_merge(|current: &PodcastSnapshot, stored: &Vec<DocumentRef>| PodcastSnapshot {
            documents: stored.clone(),
            ..current.clone()
        })
        .execute(&self.snapshots, || async move { backend.set_documents(&id, documents).await })
        .await?;
        Ok(stored)
    }

    // --- Listing ---------------------------------------------------------

    /// Fetch a listing into the cache
    ///
    /// # Errors
    /// Returns error if the fetch fails or is cancelled by a deletion
    pub async fn list_podcasts(&self, scope: ListScope) -> EditorResult<Vec<PodcastSummary>> {
        let backend = Arc::clone(&self.backend);
        self.lists
            .fetch_with(scope, async move { backend.list_podcasts(scope).await })
            .await
            .map_err(|err| EditorError::from_fetch(format!("{scope:?} listing"), err))
    }

    /// Cached listing, if fetched
    ///
    /// # Errors
    /// Returns error if the cache cannot be read
    pub async fn cached_list(&self, scope: ListScope) -> EditorResult<Option<Vec<PodcastSummary>>> {
        Ok(self.lists.get(&scope).await?)
    }

    /// Delete one podcast, removing it from the `scope` listing immediately
    ///
    /// # Errors
    /// Returns [`EditorError::Backend`] if the deletion fails (row restored)
    pub async fn delete_podcast(&self, scope: ListScope, key: &EntityKey) -> EditorResult<()> {
        let backend = Arc::clone(&self.backend);
        let id = key.clone();
        let removed = key.clone();
        OptimisticMutation::new(scope, move |rows: &Vec<PodcastSummary>| {
            rows.iter().filter(|row| row.id != removed).cloned().collect()
        })
        .with_label("delete_podcast")
        .execute(&self.lists, || async move { backend.delete_podcast(&id).await })
        .await?;

        self.forget(std::slice::from_ref(key), scope).await
    }

    /// Delete several podcasts in parallel
    ///
    /// Successful deletions stay removed from the `scope` listing; failed ones
    /// are restored in place.
    ///
    /// # Errors
    /// Returns [`EditorError::PartialDelete`] with the failure count if any
    /// deletion failed
    pub async fn delete_podcasts(&self, scope: ListScope, keys: &[EntityKey]) -> EditorResult<Vec<EntityKey>> {
        let backend = Arc::clone(&self.backend);
        let outcome = bulk_remove(
            &self.lists,
            &scope,
            keys,
            |row: &PodcastSummary| row.id.clone(),
            |id: EntityKey| {
                let backend = Arc::clone(&backend);
                async move { backend.delete_podcast(&id).await }
            },
        )
        .await?;

        self.forget(&outcome.removed, scope).await?;
        Ok(outcome.into_result()?)
    }

    // --- Internals -------------------------------------------------------

    async fn edit<F>(&self, key: &EntityKey, f: F) -> EditorResult<()>
    where
        F: FnOnce(&mut DraftStore, Option<&[Segment]>) -> DraftResult<()>,
    {
        let snap = self.snapshot(key).await?;
        self.ensure_editable(key, &snap)?;
        f(&mut *self.drafts.lock(), snap.server_segments())?;
        Ok(())
    }

    fn ensure_editable(&self, key: &EntityKey, snap: &PodcastSnapshot) -> EditorResult<()> {
        if self.policy.is_generating(snap.status) {
            tracing::debug!(%key, status = %snap.status, "edit rejected while generating");
            return Err(EditorError::action_disabled(key, snap.status));
        }
        Ok(())
    }

    /// Settings and documents stay editable during setup whatever the policy
    /// says about `drafting`
    fn ensure_configurable(&self, key: &EntityKey, snap: &PodcastSnapshot) -> EditorResult<()> {
        if self.setup.lock().evaluate(key, &snap.setup_signals()) {
            return Ok(());
        }
        self.ensure_editable(key, snap)
    }

    fn begin_pending(&self, key: &EntityKey) -> PendingGuard<'_> {
        *self.pending.entry(key.clone()).or_insert(0) += 1;
        PendingGuard {
            pending: &self.pending,
            key: key.clone(),
        }
    }

    /// Drop all state for deleted podcasts and prune them from other listings
    async fn forget(&self, removed: &[EntityKey], mutated: ListScope) -> EditorResult<()> {
        if removed.is_empty() {
            return Ok(());
        }
        {
            let mut drafts = self.drafts.lock();
            for key in removed {
                drafts.forget(key);
            }
        }
        for key in removed {
            self.snapshots.cancel_in_flight(key).await;
            self.snapshots.remove(key).await?;
        }

        let gone: HashSet<&EntityKey> = removed.iter().collect();
        for scope in LIST_SCOPES.into_iter().filter(|s| *s != mutated) {
            if let Some(rows) = self.lists.get(&scope).await? {
                let kept = rows.into_iter().filter(|row| !gone.contains(&row.id)).collect();
                self.lists.set(scope, kept).await?;
            }
        }
        Ok(())
    }

    /// Listing membership depends on status; refetch after a status change
    async fn drop_lists(&self) -> EditorResult<()> {
        for scope in LIST_SCOPES {
            self.lists.cancel_in_flight(&scope).await;
            self.lists.remove(&scope).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("snapshots", &self.snapshots)
            .field("lists", &self.lists)
            .field("pending", &self.pending.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
