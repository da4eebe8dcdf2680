//! Scripted session replay
//!
//! A replay file seeds an [`InMemoryBackend`] with podcasts and runs a list
//! of editor commands against a fresh [`EditorSession`]. Server-side events
//! (`server_update`) and backend failures (`fail_next`) are commands too, so
//! reconciliation bugs can be reproduced step by step.
//!
//! ```yaml
//! podcasts:
//!   - id: p1
//!     title: Demo
//!     segments:
//!       - { index: 0, speaker: host, line: Hello }
//! commands:
//!   - { cmd: load, id: p1 }
//!   - { cmd: update, id: p1, index: 0, line: Hi }
//!   - { cmd: fail_next, op: persist_script, id: p1 }
//!   - { cmd: save, id: p1 }
//!   - { cmd: view, id: p1 }
//! ```

use crate::backend::{BackendOp, FailureRule, InMemoryBackend, PodcastBackend};
use crate::config::EditorConfig;
use crate::error::EditorResult;
use crate::model::{DocumentRef, JobAccepted, ListScope, PodcastSettings, PodcastSnapshot, PodcastSummary};
use crate::session::{EditorSession, ScriptView};
use podscript_segment::{EntityKey, InsertPosition, NewSegment, Segment, SegmentPatch};
use podscript_status::GenerationStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Parsed replay file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayScript {
    /// Podcasts the backend starts with
    #[serde(default)]
    pub podcasts: Vec<PodcastSnapshot>,
    /// Commands, run in order
    #[serde(default)]
    pub commands: Vec<ReplayCommand>,
}

impl ReplayScript {
    /// Parse YAML
    ///
    /// # Errors
    /// Returns error if the text is not a valid replay file
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

fn head() -> i64 {
    -1
}

/// One replay step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ReplayCommand {
    /// Fetch a podcast into the session
    Load {
        /// Podcast id
        id: EntityKey,
    },
    /// Patch a segment
    Update {
        /// Podcast id
        id: EntityKey,
        /// Segment index
        index: usize,
        /// Replacement speaker
        #[serde(default)]
        speaker: Option<String>,
        /// Replacement line
        #[serde(default)]
        line: Option<String>,
    },
    /// Insert a segment after `after` (`-1` for the head)
    Add {
        /// Podcast id
        id: EntityKey,
        /// Anchor segment index
        #[serde(default = "head")]
        after: i64,
        /// Speaker tag
        speaker: String,
        /// Spoken text
        line: String,
    },
    /// Remove a segment
    Remove {
        /// Podcast id
        id: EntityKey,
        /// Segment index
        index: usize,
    },
    /// Move a segment
    Reorder {
        /// Podcast id
        id: EntityKey,
        /// Current position
        from: usize,
        /// Target position
        to: usize,
    },
    /// Save the visible segments
    Save {
        /// Podcast id
        id: EntityKey,
    },
    /// Drop the draft
    Discard {
        /// Podcast id
        id: EntityKey,
    },
    /// Replace the baseline locally
    Reset {
        /// Podcast id
        id: EntityKey,
        /// New baseline
        segments: Vec<Segment>,
    },
    /// Queue script generation
    StartGeneration {
        /// Podcast id
        id: EntityKey,
    },
    /// Replace settings
    Settings {
        /// Podcast id
        id: EntityKey,
        /// Replacement settings
        settings: PodcastSettings,
    },
    /// Replace attached documents
    Documents {
        /// Podcast id
        id: EntityKey,
        /// Replacement documents
        documents: Vec<DocumentRef>,
    },
    /// Fetch a listing
    List {
        /// Listing to fetch
        #[serde(default)]
        scope: ListScope,
    },
    /// Delete podcasts from a listing
    Delete {
        /// Listing the rows are removed from
        #[serde(default)]
        scope: ListScope,
        /// Podcasts to delete
        ids: Vec<EntityKey>,
    },
    /// Change a podcast on the server side, as a background job would
    ServerUpdate {
        /// Podcast id
        id: EntityKey,
        /// New status
        #[serde(default)]
        status: Option<GenerationStatus>,
        /// New script
        #[serde(default)]
        segments: Option<Vec<Segment>>,
    },
    /// Make the next matching backend call fail
    FailNext {
        /// Operation to fail
        op: BackendOp,
        /// Podcast to fail it for; any if absent
        #[serde(default)]
        id: Option<EntityKey>,
        /// Rejection message
        #[serde(default)]
        reason: Option<String>,
    },
    /// Record the current view
    View {
        /// Podcast id
        id: EntityKey,
    },
}

impl ReplayCommand {
    /// Command name as written in the file
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::Update { .. } => "update",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Reorder { .. } => "reorder",
            Self::Save { .. } => "save",
            Self::Discard { .. } => "discard",
            Self::Reset { .. } => "reset",
            Self::StartGeneration { .. } => "start_generation",
            Self::Settings { .. } => "settings",
            Self::Documents { .. } => "documents",
            Self::List { .. } => "list",
            Self::Delete { .. } => "delete",
            Self::ServerUpdate { .. } => "server_update",
            Self::FailNext { .. } => "fail_next",
            Self::View { .. } => "view",
        }
    }
}

/// Data a successful step produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDetail {
    /// Save result
    Saved(&'static str),
    /// Queued job
    Job(JobAccepted),
    /// Recorded view
    View(ScriptView),
    /// Fetched listing
    Listing(Vec<PodcastSummary>),
    /// Deleted ids
    Removed(Vec<EntityKey>),
}

/// Result of one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    /// Position in the command list
    pub step: usize,
    /// Command name
    pub command: &'static str,
    /// Whether the step succeeded
    pub ok: bool,
    /// Output of a successful step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<StepDetail>,
    /// Error message of a failed step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full replay output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    /// Per-step results
    pub steps: Vec<StepReport>,
    /// Final view of every podcast still loaded
    pub views: Vec<ScriptView>,
    /// Number of failed steps
    pub failures: usize,
}

impl ReplayReport {
    /// Whether every step succeeded
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

/// Runs replay commands against an in-memory backend
#[derive(Debug)]
pub struct Replayer {
    backend: Arc<InMemoryBackend>,
    session: EditorSession,
    loaded: BTreeSet<EntityKey>,
}

impl Replayer {
    /// Replayer with `podcasts` seeded on the server
    #[must_use]
    pub fn new(podcasts: impl IntoIterator<Item = PodcastSnapshot>, config: &EditorConfig) -> Self {
        let backend = Arc::new(InMemoryBackend::with_podcasts(podcasts).with_policy(config.status_policy()));
        let shared: Arc<dyn PodcastBackend> = backend.clone();
        let session = EditorSession::new(shared, config);
        Self {
            backend,
            session,
            loaded: BTreeSet::new(),
        }
    }

    /// Run `commands` in order; with `fail_fast`, stop at the first failure
    pub async fn run(&mut self, commands: &[ReplayCommand], fail_fast: bool) -> ReplayReport {
        let mut steps = Vec::with_capacity(commands.len());
        let mut failures = 0;

        for (step, command) in commands.iter().enumerate() {
            let result = self.step(command).await;
            let report = match result {
                Ok(detail) => StepReport {
                    step,
                    command: command.name(),
                    ok: true,
                    detail,
                    error: None,
                },
                Err(err) => {
                    failures += 1;
                    tracing::warn!(step, command = command.name(), error = %err, "replay step failed");
                    StepReport {
                        step,
                        command: command.name(),
                        ok: false,
                        detail: None,
                        error: Some(err.to_string()),
                    }
                }
            };
            let failed = !report.ok;
            steps.push(report);
            if failed && fail_fast {
                break;
            }
        }

        let mut views = Vec::with_capacity(self.loaded.len());
        for id in &self.loaded {
            if let Ok(view) = self.session.view(id).await {
                views.push(view);
            }
        }
        ReplayReport {
            steps,
            views,
            failures,
        }
    }

    async fn step(&mut self, command: &ReplayCommand) -> EditorResult<Option<StepDetail>> {
        let session = &self.session;
        match command {
            ReplayCommand::Load { id } => {
                session.refresh(id).await?;
                self.loaded.insert(id.clone());
                Ok(None)
            }
            ReplayCommand::Update { id, index, speaker, line } => {
                let patch = SegmentPatch {
                    speaker: speaker.clone(),
                    line: line.clone(),
                };
                session.update_segment(id, *index, patch).await?;
                Ok(None)
            }
            ReplayCommand::Add { id, after, speaker, line } => {
                let at = InsertPosition::from_after_index(*after)
                    .map_err(podscript_draft::DraftError::from)?;
                session.add_segment(id, at, NewSegment::new(speaker.clone(), line.clone())).await?;
                Ok(None)
            }
            ReplayCommand::Remove { id, index } => {
                session.remove_segment(id, *index).await?;
                Ok(None)
            }
            ReplayCommand::Reorder { id, from, to } => {
                session.reorder_segments(id, *from, *to).await?;
                Ok(None)
            }
            ReplayCommand::Save { id } => {
                let outcome = session.save_changes(id).await?;
                Ok(Some(StepDetail::Saved(outcome.as_str())))
            }
            ReplayCommand::Discard { id } => {
                session.discard_changes(id);
                Ok(None)
            }
            ReplayCommand::Reset { id, segments } => {
                session.reset_to_segments(id, segments.clone()).await?;
                Ok(None)
            }
            ReplayCommand::StartGeneration { id } => {
                let job = session.start_generation(id).await?;
                Ok(Some(StepDetail::Job(job)))
            }
            ReplayCommand::Settings { id, settings } => {
                session.save_settings(id, settings.clone()).await?;
                Ok(None)
            }
            ReplayCommand::Documents { id, documents } => {
                session.set_documents(id, documents.clone()).await?;
                Ok(None)
            }
            ReplayCommand::List { scope } => {
                let rows = session.list_podcasts(*scope).await?;
                Ok(Some(StepDetail::Listing(rows)))
            }
            ReplayCommand::Delete { scope, ids } => {
                let result = if let [single] = ids.as_slice() {
                    session.delete_podcast(*scope, single).await.map(|()| ids.clone())
                } else {
                    session.delete_podcasts(*scope, ids).await
                };
                // keep final views in step with what the server still has
                self.loaded.retain(|id| self.backend.stored(id).is_some());
                Ok(Some(StepDetail::Removed(result?)))
            }
            ReplayCommand::ServerUpdate { id, status, segments } => {
                let found = self.backend.update(id, |podcast| {
                    if let Some(status) = status {
                        podcast.status = *status;
                    }
                    if let Some(segments) = segments {
                        podcast.segments = Some(segments.clone());
                    }
                });
                if !found {
                    return Err(crate::error::BackendError::NotFound(id.clone()).into());
                }
                if self.loaded.contains(id) {
                    session.refresh(id).await?;
                }
                Ok(None)
            }
            ReplayCommand::FailNext { op, id, reason } => {
                self.backend.fail_next(FailureRule {
                    op: *op,
                    id: id.clone(),
                    reason: reason.clone().unwrap_or_else(|| "injected failure".to_string()),
                });
                Ok(None)
            }
            ReplayCommand::View { id } => Ok(Some(StepDetail::View(session.view(id).await?))),
        }
    }
}

/// Run a parsed replay file end to end
pub async fn replay(script: &ReplayScript, config: &EditorConfig, fail_fast: bool) -> ReplayReport {
    let mut replayer = Replayer::new(script.podcasts.iter().cloned(), config);
    replayer.run(&script.commands, fail_fast).await
}
