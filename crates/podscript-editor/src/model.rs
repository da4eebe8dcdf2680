//! Podcast entity types exchanged with the backend

use podscript_segment::{EntityKey, Segment};
use podscript_status::{GenerationStatus, SetupSignals, StatusPolicy};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Source document attached to a podcast
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Document identifier
    pub id: String,
    /// Display name
    pub name: String,
}

impl DocumentRef {
    /// Create document reference
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Generation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodcastSettings {
    /// Voice for the host speaker
    pub host_voice: String,
    /// Voice for the cohost speaker
    pub cohost_voice: String,
    /// Requested episode length
    pub target_minutes: u32,
    /// Free-form instructions for the script writer
    pub instructions: Option<String>,
}

impl Default for PodcastSettings {
    fn default() -> Self {
        Self {
            host_voice: "alloy".to_string(),
            cohost_voice: "nova".to_string(),
            target_minutes: 10,
            instructions: None,
        }
    }
}

/// Server snapshot of one podcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodcastSnapshot {
    /// Podcast id
    pub id: EntityKey,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Script, absent until one has been generated or saved
    #[serde(default)]
    pub segments: Option<Vec<Segment>>,
    /// Generation status
    #[serde(default = "drafting")]
    pub status: GenerationStatus,
    /// Attached documents
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
    /// Generation settings
    #[serde(default)]
    pub settings: PodcastSettings,
    /// Opaque context from the last generation run
    #[serde(default)]
    pub generation_context: Option<serde_json::Value>,
}

fn drafting() -> GenerationStatus {
    GenerationStatus::Drafting
}

impl PodcastSnapshot {
    /// Fresh podcast in `drafting` with nothing attached
    #[must_use]
    pub fn new(id: impl Into<EntityKey>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            segments: None,
            status: GenerationStatus::Drafting,
            documents: Vec::new(),
            settings: PodcastSettings::default(),
            generation_context: None,
        }
    }

    /// Server segments as the draft store expects them
    #[inline]
    #[must_use]
    pub fn server_segments(&self) -> Option<&[Segment]> {
        self.segments.as_deref()
    }

    /// Facts the setup-mode predicate reads
    #[must_use]
    pub fn setup_signals(&self) -> SetupSignals {
        SetupSignals {
            has_documents: !self.documents.is_empty(),
            generation_started: self.generation_context.is_some()
                || self.status != GenerationStatus::Drafting,
            has_script: self.segments.as_ref().is_some_and(|s| !s.is_empty()),
            status: self.status,
        }
    }

    /// Listing row for this podcast
    #[must_use]
    pub fn summary(&self) -> PodcastSummary {
        PodcastSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            status: self.status,
        }
    }
}

/// Row in a podcast listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodcastSummary {
    /// Podcast id
    pub id: EntityKey,
    /// Title
    pub title: String,
    /// Generation status
    pub status: GenerationStatus,
}

/// Which podcasts a listing contains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListScope {
    /// Every podcast
    #[default]
    All,
    /// Podcasts with a background job running
    InProgress,
    /// Podcasts whose generation completed
    Ready,
}

impl ListScope {
    /// Whether a podcast with `status` belongs in this listing
    ///
    /// `InProgress` follows the same `policy` that gates edits.
    #[inline]
    #[must_use]
    pub fn includes(self, status: GenerationStatus, policy: StatusPolicy) -> bool {
        match self {
            Self::All => true,
            Self::InProgress => policy.is_generating(status),
            Self::Ready => podscript_status::is_ready_status(status),
        }
    }
}

/// Backend acknowledgement of a queued job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAccepted {
    /// Job id
    pub job_id: Ulid,
    /// Entity status after queuing
    pub status: GenerationStatus,
}
