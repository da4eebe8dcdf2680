//! Backend seam
//!
//! [`PodcastBackend`] is everything the editor needs from the server.
//! [`InMemoryBackend`] is a process-local implementation with one-shot
//! failure injection, used by the replay tool and tests.

use crate::error::BackendError;
use crate::model::{DocumentRef, JobAccepted, ListScope, PodcastSettings, PodcastSnapshot, PodcastSummary};
use parking_lot::{Mutex, RwLock};
use podscript_segment::{EntityKey, Segment};
use podscript_status::{validate_transition, GenerationStatus, StatusPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ulid::Ulid;

/// Remote podcast service
#[async_trait::async_trait]
pub trait PodcastBackend: Send + Sync {
    /// Current snapshot of one podcast
    async fn fetch_podcast(&self, id: &EntityKey) -> Result<PodcastSnapshot, BackendError>;

    /// Listing rows for `scope`
    async fn list_podcasts(&self, scope: ListScope) -> Result<Vec<PodcastSummary>, BackendError>;

    /// Persist an edited script
    async fn persist_script(&self, id: &EntityKey, segments: Vec<Segment>) -> Result<JobAccepted, BackendError>;

    /// Queue script generation
    async fn start_generation(&self, id: &EntityKey) -> Result<JobAccepted, BackendError>;

    /// Replace generation settings; returns what the server stored
    async fn update_settings(&self, id: &EntityKey, settings: PodcastSettings)
        -> Result<PodcastSettings, BackendError>;

    /// Replace the attached documents; returns what the server stored
    async fn set_documents(&self, id: &EntityKey, documents: Vec<DocumentRef>)
        -> Result<Vec<DocumentRef>, BackendError>;

    /// Delete a podcast
    async fn delete_podcast(&self, id: &EntityKey) -> Result<(), BackendError>;
}

/// Backend operation, for failure injection and call logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendOp {
    /// [`PodcastBackend::fetch_podcast`]
    Fetch,
    /// [`PodcastBackend::list_podcasts`]
    List,
    /// [`PodcastBackend::persist_script`]
    PersistScript,
    /// [`PodcastBackend::start_generation`]
    StartGeneration,
    /// [`PodcastBackend::update_settings`]
    UpdateSettings,
    /// [`PodcastBackend::set_documents`]
    SetDocuments,
    /// [`PodcastBackend::delete_podcast`]
    Delete,
}

/// One injected failure; `id: None` matches any podcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRule {
    /// Operation to fail
    pub op: BackendOp,
    /// Podcast to fail it for
    #[serde(default)]
    pub id: Option<EntityKey>,
    /// Rejection message
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "injected failure".to_string()
}

impl FailureRule {
    fn matches(&self, op: BackendOp, id: Option<&EntityKey>) -> bool {
        self.op == op && (self.id.is_none() || self.id.as_ref() == id)
    }
}

/// Process-local [`PodcastBackend`]
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    podcasts: RwLock<BTreeMap<EntityKey, PodcastSnapshot>>,
    failures: Mutex<Vec<FailureRule>>,
    calls: Mutex<Vec<(BackendOp, Option<EntityKey>)>>,
    policy: StatusPolicy,
}

impl InMemoryBackend {
    /// Create empty backend
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend seeded with `podcasts`
    #[must_use]
    pub fn with_podcasts(podcasts: impl IntoIterator<Item = PodcastSnapshot>) -> Self {
        let backend = Self::new();
        for podcast in podcasts {
            backend.upsert(podcast);
        }
        backend
    }

    /// With the status policy used for `InProgress` listings
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Insert or replace a podcast, as a background job would
    pub fn upsert(&self, podcast: PodcastSnapshot) {
        self.podcasts.write().insert(podcast.id.clone(), podcast);
    }

    /// Apply a server-side change to one podcast
    ///
    /// Returns `false` if the podcast does not exist.
    pub fn update<F>(&self, id: &EntityKey, f: F) -> bool
    where
        F: FnOnce(&mut PodcastSnapshot),
    {
        self.podcasts.write().get_mut(id).map(f).is_some()
    }

    /// Stored snapshot, bypassing failure injection and the call log
    #[must_use]
    pub fn stored(&self, id: &EntityKey) -> Option<PodcastSnapshot> {
        self.podcasts.read().get(id).cloned()
    }

    /// Make the next matching call fail once
    pub fn fail_next(&self, rule: FailureRule) {
        self.failures.lock().push(rule);
    }

    /// Shorthand for [`Self::fail_next`] with a fixed reason
    pub fn fail_once(&self, op: BackendOp, id: Option<&EntityKey>) {
        self.fail_next(FailureRule {
            op,
            id: id.cloned(),
            reason: default_reason(),
        });
    }

    /// Every call received so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<(BackendOp, Option<EntityKey>)> {
        self.calls.lock().clone()
    }

    /// Number of calls received for `op`
    #[must_use]
    pub fn call_count(&self, op: BackendOp) -> usize {
        self.calls.lock().iter().filter(|(o, _)| *o == op).count()
    }

    fn enter(&self, op: BackendOp, id: Option<&EntityKey>) -> Result<(), BackendError> {
        self.calls.lock().push((op, id.cloned()));
        let mut failures = self.failures.lock();
        if let Some(pos) = failures.iter().position(|rule| rule.matches(op, id)) {
            let rule = failures.remove(pos);
            tracing::debug!(?op, ?id, reason = %rule.reason, "injected backend failure");
            return Err(BackendError::Rejected(rule.reason));
        }
        Ok(())
    }

    fn with_podcast<T>(
        &self,
        id: &EntityKey,
        f: impl FnOnce(&mut PodcastSnapshot) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut podcasts = self.podcasts.write();
        let podcast = podcasts
            .get_mut(id)
            .ok_or_else(|| BackendError::NotFound(id.clone()))?;
        f(podcast)
    }
}

#[async_trait::async_trait]
impl PodcastBackend for InMemoryBackend {
    async fn fetch_podcast(&self, id: &EntityKey) -> Result<PodcastSnapshot, BackendError> {
        self.enter(BackendOp::Fetch, Some(id))?;
        self.stored(id).ok_or_else(|| BackendError::NotFound(id.clone()))
    }

    async fn list_podcasts(&self, scope: ListScope) -> Result<Vec<PodcastSummary>, BackendError> {
        self.enter(BackendOp::List, None)?;
        Ok(self
            .podcasts
            .read()
            .values()
            .filter(|p| scope.includes(p.status, self.policy))
            .map(PodcastSnapshot::summary)
            .collect())
    }

    async fn persist_script(&self, id: &EntityKey, segments: Vec<Segment>) -> Result<JobAccepted, BackendError> {
        self.enter(BackendOp::PersistScript, Some(id))?;
        self.with_podcast(id, |podcast| {
            podcast.segments = Some(segments);
            Ok(JobAccepted {
                job_id: Ulid::new(),
                status: podcast.status,
            })
        })
    }

    async fn start_generation(&self, id: &EntityKey) -> Result<JobAccepted, BackendError> {
        self.enter(BackendOp::StartGeneration, Some(id))?;
        self.with_podcast(id, |podcast| {
            validate_transition(podcast.status, GenerationStatus::GeneratingScript)
                .map_err(|e| BackendError::rejected(e.to_string()))?;
            let job_id = Ulid::new();
            podcast.status = GenerationStatus::GeneratingScript;
            podcast.generation_context = Some(serde_json::json!({ "job_id": job_id.to_string() }));
            Ok(JobAccepted {
                job_id,
                status: podcast.status,
            })
        })
    }

    async fn update_settings(
        &self,
        id: &EntityKey,
        settings: PodcastSettings,
    ) -> Result<PodcastSettings, BackendError> {
        self.enter(BackendOp::UpdateSettings, Some(id))?;
        self.with_podcast(id, |podcast| {
            podcast.settings = settings;
            Ok(podcast.settings.clone())
        })
    }

    async fn set_documents(
        &self,
        id: &EntityKey,
        documents: Vec<DocumentRef>,
    ) -> Result<Vec<DocumentRef>, BackendError> {
        self.enter(BackendOp::SetDocuments, Some(id))?;
        self.with_podcast(id, |podcast| {
            podcast.documents = documents;
            Ok(podcast.documents.clone())
        })
    }

    async fn delete_podcast(&self, id: &EntityKey) -> Result<(), BackendError> {
        self.enter(BackendOp::Delete, Some(id))?;
        self.podcasts
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> EntityKey {
        EntityKey::from(id)
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let backend = InMemoryBackend::with_podcasts([PodcastSnapshot::new("p1", "one")]);
        backend.fail_once(BackendOp::Fetch, Some(&key("p1")));

        assert!(backend.fetch_podcast(&key("p1")).await.is_err());
        assert!(backend.fetch_podcast(&key("p1")).await.is_ok());
        assert_eq!(backend.call_count(BackendOp::Fetch), 2);
    }

    #[tokio::test]
    async fn failure_rule_without_id_matches_any() {
        let backend = InMemoryBackend::with_podcasts([PodcastSnapshot::new("p1", "one")]);
        backend.fail_once(BackendOp::Delete, None);

        assert!(backend.delete_podcast(&key("p1")).await.is_err());
        assert!(backend.stored(&key("p1")).is_some());
    }

    #[tokio::test]
    async fn start_generation_follows_transition_table() {
        let backend = InMemoryBackend::with_podcasts([PodcastSnapshot::new("p1", "one")]);

        let job = backend.start_generation(&key("p1")).await.unwrap();
        assert_eq!(job.status, GenerationStatus::GeneratingScript);
        // already running
        assert!(matches!(
            backend.start_generation(&key("p1")).await,
            Err(BackendError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn listing_respects_scope() {
        let mut ready = PodcastSnapshot::new("p2", "two");
        ready.status = GenerationStatus::Ready;
        let backend = InMemoryBackend::with_podcasts([PodcastSnapshot::new("p1", "one"), ready]);

        let rows = backend.list_podcasts(ListScope::Ready).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, key("p2"));
        assert_eq!(backend.list_podcasts(ListScope::All).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn in_progress_listing_uses_configured_policy() {
        let seeded = || [PodcastSnapshot::new("p1", "one")];
        let strict = StatusPolicy {
            drafting_is_generating: true,
        };

        let lenient = InMemoryBackend::with_podcasts(seeded());
        assert!(lenient.list_podcasts(ListScope::InProgress).await.unwrap().is_empty());

        let backend = InMemoryBackend::with_podcasts(seeded()).with_policy(strict);
        assert_eq!(backend.list_podcasts(ListScope::InProgress).await.unwrap().len(), 1);
    }
}
