//! Testing utilities for the podscript workspace
//!
//! Script and podcast fixtures, plus a backend that can hold calls in
//! flight so tests can act while a save or deletion is pending.

#![allow(missing_docs)]

use parking_lot::Mutex;
use podscript_editor::{
    BackendError, BackendOp, DocumentRef, EditorConfig, EditorSession, InMemoryBackend, JobAccepted, ListScope,
    PodcastBackend, PodcastSettings, PodcastSnapshot, PodcastSummary,
};
use podscript_segment::{EntityKey, Segment};
use podscript_status::GenerationStatus;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub fn key(id: &str) -> EntityKey {
    EntityKey::from(id)
}

/// Contiguous script from `(speaker, line)` pairs
pub fn script(lines: &[(&str, &str)]) -> Vec<Segment> {
    lines
        .iter()
        .enumerate()
        .map(|(index, (speaker, line))| Segment::new(index, *speaker, *line))
        .collect()
}

/// Lines of `segments`, in order
pub fn lines(segments: &[Segment]) -> Vec<&str> {
    segments.iter().map(|s| s.line.as_str()).collect()
}

pub fn podcast(id: &str, lines: &[(&str, &str)]) -> PodcastSnapshot {
    let mut podcast = PodcastSnapshot::new(id, format!("Podcast {id}"));
    podcast.segments = Some(script(lines));
    podcast
}

pub fn podcast_with_status(id: &str, status: GenerationStatus, lines: &[(&str, &str)]) -> PodcastSnapshot {
    let mut podcast = podcast(id, lines);
    podcast.status = status;
    podcast
}

/// Session with default config over `backend`
pub fn session_over(backend: Arc<dyn PodcastBackend>) -> EditorSession {
    EditorSession::new(backend, &EditorConfig::default())
}

/// Loaded session over an in-memory backend seeded with `podcasts`
pub async fn loaded_session(podcasts: Vec<PodcastSnapshot>) -> (Arc<InMemoryBackend>, EditorSession) {
    let ids: Vec<EntityKey> = podcasts.iter().map(|p| p.id.clone()).collect();
    let backend = Arc::new(InMemoryBackend::with_podcasts(podcasts));
    let session = session_over(backend.clone());
    for id in &ids {
        session.refresh(id).await.expect("seeded podcast loads");
    }
    (backend, session)
}

/// [`InMemoryBackend`] wrapper that parks calls to gated operations
///
/// A parked call signals [`GatedBackend::entered`] and waits until
/// [`GatedBackend::release`] lets it through.
#[derive(Debug)]
pub struct GatedBackend {
    inner: Arc<InMemoryBackend>,
    gated: Mutex<HashSet<BackendOp>>,
    entered: Semaphore,
    release: Semaphore,
}

impl GatedBackend {
    pub fn new(inner: Arc<InMemoryBackend>) -> Self {
        Self {
            inner,
            gated: Mutex::new(HashSet::new()),
            entered: Semaphore::new(0),
            release: Semaphore::new(0),
        }
    }

    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    /// Park future calls to `op`
    pub fn gate(&self, op: BackendOp) {
        self.gated.lock().insert(op);
    }

    /// Wait until `count` gated calls are parked
    pub async fn entered(&self, count: u32) {
        self.entered
            .acquire_many(count)
            .await
            .expect("gate semaphore open")
            .forget();
    }

    /// Let `count` parked calls proceed
    pub fn release(&self, count: usize) {
        self.release.add_permits(count);
    }

    async fn pass(&self, op: BackendOp) {
        if !self.gated.lock().contains(&op) {
            return;
        }
        self.entered.add_permits(1);
        self.release
            .acquire()
            .await
            .expect("gate semaphore open")
            .forget();
    }
}

#[async_trait::async_trait]
impl PodcastBackend for GatedBackend {
    async fn fetch_podcast(&self, id: &EntityKey) -> Result<PodcastSnapshot, BackendError> {
        self.pass(BackendOp::Fetch).await;
        self.inner.fetch_podcast(id).await
    }

    async fn list_podcasts(&self, scope: ListScope) -> Result<Vec<PodcastSummary>, BackendError> {
        self.pass(BackendOp::List).await;
        self.inner.list_podcasts(scope).await
    }

    async fn persist_script(&self, id: &EntityKey, segments: Vec<Segment>) -> Result<JobAccepted, BackendError> {
        self.pass(BackendOp::PersistScript).await;
        self.inner.persist_script(id, segments).await
    }

    async fn start_generation(&self, id: &EntityKey) -> Result<JobAccepted, BackendError> {
        self.pass(BackendOp::StartGeneration).await;
        self.inner.start_generation(id).await
    }

    async fn update_settings(
        &self,
        id: &EntityKey,
        settings: PodcastSettings,
    ) -> Result<PodcastSettings, BackendError> {
        self.pass(BackendOp::UpdateSettings).await;
        self.inner.update_settings(id, settings).await
    }

    async fn set_documents(
        &self,
        id: &EntityKey,
        documents: Vec<DocumentRef>,
    ) -> Result<Vec<DocumentRef>, BackendError> {
        self.pass(BackendOp::SetDocuments).await;
        self.inner.set_documents(id, documents).await
    }

    async fn delete_podcast(&self, id: &EntityKey) -> Result<(), BackendError> {
        self.pass(BackendOp::Delete).await;
        self.inner.delete_podcast(id).await
    }
}
