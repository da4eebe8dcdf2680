//! Editor session behaviour against in-memory and gated backends

use podscript_draft::SaveOutcome;
use podscript_editor::{
    BackendError, BackendOp, DocumentRef, EditorConfig, EditorError, EditorSession, InMemoryBackend, ListScope,
    PodcastSettings,
};
use podscript_segment::{InsertPosition, NewSegment, SegmentPatch};
use podscript_status::GenerationStatus;
use podscript_test_utils::{key, lines, loaded_session, podcast, podcast_with_status, session_over, GatedBackend};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const TWO_LINES: &[(&str, &str)] = &[("host", "Hello"), ("cohost", "Hi there")];

#[tokio::test]
async fn edits_require_a_loaded_snapshot() {
    let backend = Arc::new(InMemoryBackend::with_podcasts([podcast("p1", TWO_LINES)]));
    let session = session_over(backend);

    let err = session
        .update_segment(&key("p1"), 0, SegmentPatch::line("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::NotLoaded(_)));
}

#[tokio::test]
async fn edits_are_rejected_while_generating() {
    let (_, session) =
        loaded_session(vec![podcast_with_status("p1", GenerationStatus::GeneratingAudio, TWO_LINES)]).await;

    let err = session
        .update_segment(&key("p1"), 0, SegmentPatch::line("x"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EditorError::ActionDisabled {
            status: GenerationStatus::GeneratingAudio,
            ..
        }
    ));
    assert!(session.save_changes(&key("p1")).await.is_err());

    let view = session.view(&key("p1")).await.unwrap();
    assert!(view.is_generating);
    assert!(view.action_disabled);
    assert!(!view.has_changes);
    assert_eq!(view.progress_step, Some(3));
}

#[tokio::test]
async fn drafting_counts_as_generating_when_configured() {
    let backend = Arc::new(InMemoryBackend::with_podcasts([podcast("p1", TWO_LINES)]));
    let session = EditorSession::new(backend, &EditorConfig::new().with_drafting_is_generating(true));
    session.refresh(&key("p1")).await.unwrap();

    let err = session.remove_segment(&key("p1"), 0).await.unwrap_err();
    assert!(matches!(err, EditorError::ActionDisabled { .. }));
}

#[tokio::test]
async fn setup_is_reachable_when_drafting_counts_as_generating() {
    let backend = Arc::new(InMemoryBackend::with_podcasts([podscript_editor::PodcastSnapshot::new("p1", "New")]));
    let session = EditorSession::new(backend, &EditorConfig::new().with_drafting_is_generating(true));
    let p1 = key("p1");
    session.refresh(&p1).await.unwrap();

    let view = session.view(&p1).await.unwrap();
    assert!(view.setup_mode);
    assert!(!view.action_disabled);

    // settings alone do not end setup; attaching a document does
    session.save_settings(&p1, PodcastSettings::default()).await.unwrap();
    assert!(session.view(&p1).await.unwrap().setup_mode);
    session
        .set_documents(&p1, vec![DocumentRef::new("d1", "brief.pdf")])
        .await
        .unwrap();

    // left setup: drafting now gates like any generating status
    let view = session.view(&p1).await.unwrap();
    assert!(!view.setup_mode);
    assert!(view.action_disabled);
    assert!(matches!(
        session.save_settings(&p1, PodcastSettings::default()).await,
        Err(EditorError::ActionDisabled {
            status: GenerationStatus::Drafting,
            ..
        })
    ));
}

#[tokio::test]
async fn invalid_edit_is_reported_and_leaves_no_draft() {
    let (_, session) = loaded_session(vec![podcast("p1", TWO_LINES)]).await;

    let err = session.remove_segment(&key("p1"), 7).await.unwrap_err();
    assert!(err.is_rejected_edit());
    assert!(!session.view(&key("p1")).await.unwrap().has_changes);
}

#[tokio::test]
async fn save_persists_visible_segments() {
    let (backend, session) = loaded_session(vec![podcast("p1", TWO_LINES)]).await;
    let p1 = key("p1");

    session
        .add_segment(&p1, InsertPosition::Start, NewSegment::new("host", "Welcome"))
        .await
        .unwrap();
    assert_eq!(session.save_changes(&p1).await.unwrap(), SaveOutcome::Committed);

    let stored = backend.stored(&p1).unwrap().segments.unwrap();
    assert_eq!(lines(&stored), vec!["Welcome", "Hello", "Hi there"]);

    // the cached snapshot is still the pre-save one; the saved copy shows
    let view = session.view(&p1).await.unwrap();
    assert!(!view.has_changes);
    assert_eq!(lines(&view.segments), vec!["Welcome", "Hello", "Hi there"]);

    // refetch returns what was saved: nothing changes
    session.refresh(&p1).await.unwrap();
    let view = session.view(&p1).await.unwrap();
    assert!(!view.has_changes);
    assert_eq!(view.segments[0].line, "Welcome");
}

#[tokio::test]
async fn server_change_after_save_wins() {
    let (backend, session) = loaded_session(vec![podcast("p1", TWO_LINES)]).await;
    let p1 = key("p1");

    session.update_segment(&p1, 0, SegmentPatch::line("Mine")).await.unwrap();
    session.save_changes(&p1).await.unwrap();

    backend.update(&p1, |p| p.segments = Some(podscript_test_utils::script(&[("host", "Regenerated")])));
    session.refresh(&p1).await.unwrap();

    let view = session.view(&p1).await.unwrap();
    assert_eq!(lines(&view.segments), vec!["Regenerated"]);
    assert!(!view.has_changes);
}

#[tokio::test]
async fn failed_save_keeps_the_draft() {
    let (backend, session) = loaded_session(vec![podcast("p1", TWO_LINES)]).await;
    let p1 = key("p1");
    backend.fail_once(BackendOp::PersistScript, Some(&p1));

    session.update_segment(&p1, 1, SegmentPatch::line("Edited")).await.unwrap();
    let err = session.save_changes(&p1).await.unwrap_err();
    assert!(matches!(err, EditorError::Backend(BackendError::Rejected(_))));

    let view = session.view(&p1).await.unwrap();
    assert!(view.has_changes);
    assert!(!view.is_saving);
    assert_eq!(view.segments[1].line, "Edited");
    assert_eq!(backend.stored(&p1).unwrap().segments.unwrap()[1].line, "Hi there");

    // retry succeeds
    assert!(session.save_changes(&p1).await.unwrap().was_applied());
    assert!(!session.view(&p1).await.unwrap().has_changes);
}

#[tokio::test]
async fn edit_during_save_is_kept_as_draft() {
    let inner = Arc::new(InMemoryBackend::with_podcasts([podcast("p1", TWO_LINES)]));
    let gated = Arc::new(GatedBackend::new(inner));
    let session = session_over(gated.clone());
    let p1 = key("p1");
    session.refresh(&p1).await.unwrap();
    session.update_segment(&p1, 0, SegmentPatch::line("First")).await.unwrap();

    gated.gate(BackendOp::PersistScript);
    let (outcome, ()) = tokio::join!(session.save_changes(&p1), async {
        gated.entered(1).await;
        let view = session.view(&p1).await.unwrap();
        assert!(view.is_saving);
        assert!(view.action_disabled);

        session.update_segment(&p1, 1, SegmentPatch::line("Second")).await.unwrap();
        gated.release(1);
    });

    assert_eq!(outcome.unwrap(), SaveOutcome::CommittedBehindDraft);
    let stored = gated.inner().stored(&p1).unwrap().segments.unwrap();
    assert_eq!(lines(&stored), vec!["First", "Hi there"]);

    let view = session.view(&p1).await.unwrap();
    assert!(view.has_changes);
    assert_eq!(lines(&view.segments), vec!["First", "Second"]);
}

#[tokio::test]
async fn discard_returns_to_baseline() {
    let (_, session) = loaded_session(vec![podcast("p1", TWO_LINES)]).await;
    let p1 = key("p1");

    session.reorder_segments(&p1, 0, 1).await.unwrap();
    assert_eq!(lines(&session.view(&p1).await.unwrap().segments), vec!["Hi there", "Hello"]);

    session.discard_changes(&p1);
    let view = session.view(&p1).await.unwrap();
    assert!(!view.has_changes);
    assert_eq!(lines(&view.segments), vec!["Hello", "Hi there"]);
}

#[tokio::test]
async fn reset_replaces_the_baseline_locally() {
    let (backend, session) = loaded_session(vec![podcast("p1", TWO_LINES)]).await;
    let p1 = key("p1");

    session.update_segment(&p1, 0, SegmentPatch::line("Draft")).await.unwrap();
    session
        .reset_to_segments(&p1, podscript_test_utils::script(&[("host", "Restored")]))
        .await
        .unwrap();

    let view = session.view(&p1).await.unwrap();
    assert!(!view.has_changes);
    assert_eq!(lines(&view.segments), vec!["Restored"]);
    assert_eq!(backend.call_count(BackendOp::PersistScript), 0);
}

#[tokio::test]
async fn start_generation_flips_status_before_the_call_returns() {
    let inner = Arc::new(InMemoryBackend::with_podcasts([podcast("p1", TWO_LINES)]));
    let gated = Arc::new(GatedBackend::new(inner));
    let session = session_over(gated.clone());
    let p1 = key("p1");
    session.refresh(&p1).await.unwrap();

    gated.gate(BackendOp::StartGeneration);
    let (job, ()) = tokio::join!(session.start_generation(&p1), async {
        gated.entered(1).await;
        let view = session.view(&p1).await.unwrap();
        assert_eq!(view.status, GenerationStatus::GeneratingScript);
        assert!(view.is_generating);
        assert!(view.action_disabled);
        gated.release(1);
    });

    let job = job.unwrap();
    let snap = session.snapshot(&p1).await.unwrap();
    assert_eq!(snap.status, GenerationStatus::GeneratingScript);
    assert_eq!(
        snap.generation_context.unwrap()["job_id"],
        serde_json::json!(job.job_id.to_string())
    );
}

#[tokio::test]
async fn rejected_generation_restores_status() {
    let (backend, session) = loaded_session(vec![podcast("p1", TWO_LINES)]).await;
    let p1 = key("p1");
    backend.fail_once(BackendOp::StartGeneration, Some(&p1));

    assert!(matches!(
        session.start_generation(&p1).await,
        Err(EditorError::Backend(_))
    ));
    let view = session.view(&p1).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Drafting);
    assert!(!view.action_disabled);
}

#[tokio::test]
async fn generation_cannot_restart_while_running() {
    let (backend, session) =
        loaded_session(vec![podcast_with_status("p1", GenerationStatus::GeneratingScript, TWO_LINES)]).await;

    assert!(matches!(
        session.start_generation(&key("p1")).await,
        Err(EditorError::Status(_))
    ));
    assert_eq!(backend.call_count(BackendOp::StartGeneration), 0);
}

#[tokio::test]
async fn rejected_settings_are_rolled_back() {
    let (backend, session) = loaded_session(vec![podcast("p1", TWO_LINES)]).await;
    let p1 = key("p1");
    let longer = PodcastSettings {
        target_minutes: 30,
        ..PodcastSettings::default()
    };

    backend.fail_once(BackendOp::UpdateSettings, Some(&p1));
    assert!(session.save_settings(&p1, longer.clone()).await.is_err());
    assert_eq!(session.snapshot(&p1).await.unwrap().settings, PodcastSettings::default());

    assert_eq!(session.save_settings(&p1, longer.clone()).await.unwrap(), longer);
    assert_eq!(session.snapshot(&p1).await.unwrap().settings.target_minutes, 30);
}

#[tokio::test]
async fn setup_mode_is_left_once_and_stays_left() {
    let (backend, session) = loaded_session(vec![podcast("p1", &[])]).await;
    let p1 = key("p1");
    assert!(session.view(&p1).await.unwrap().setup_mode);

    session
        .set_documents(&p1, vec![DocumentRef::new("d1", "notes.pdf")])
        .await
        .unwrap();
    assert!(!session.view(&p1).await.unwrap().setup_mode);

    // detaching everything does not bring setup back
    session.set_documents(&p1, Vec::new()).await.unwrap();
    session.refresh(&p1).await.unwrap();
    assert!(backend.stored(&p1).unwrap().documents.is_empty());
    assert!(!session.view(&p1).await.unwrap().setup_mode);
}

#[tokio::test]
async fn bulk_delete_keeps_failed_rows() {
    let podcasts = ["p1", "p2", "p3", "p4"].map(|id| podcast(id, TWO_LINES)).to_vec();
    let (backend, session) = loaded_session(podcasts).await;
    session.list_podcasts(ListScope::All).await.unwrap();
    backend.fail_once(BackendOp::Delete, Some(&key("p2")));

    let err = session
        .delete_podcasts(ListScope::All, &[key("p1"), key("p2"), key("p3")])
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::PartialDelete { failed: 1, total: 3 }));

    let rows = session.cached_list(ListScope::All).await.unwrap().unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.id.to_string()).collect();
    assert_eq!(ids, vec!["p2", "p4"]);

    assert!(matches!(session.view(&key("p1")).await, Err(EditorError::NotLoaded(_))));
    assert!(session.view(&key("p2")).await.is_ok());
}

#[tokio::test]
async fn delete_prunes_other_listings() {
    let (_, session) = loaded_session(vec![
        podcast_with_status("p1", GenerationStatus::Ready, TWO_LINES),
        podcast("p2", TWO_LINES),
    ])
    .await;
    session.list_podcasts(ListScope::All).await.unwrap();
    session.list_podcasts(ListScope::Ready).await.unwrap();

    session.delete_podcast(ListScope::All, &key("p1")).await.unwrap();

    assert_eq!(session.cached_list(ListScope::All).await.unwrap().unwrap().len(), 1);
    assert!(session.cached_list(ListScope::Ready).await.unwrap().unwrap().is_empty());
}

#[tokio::test]
async fn failed_single_delete_restores_the_row() {
    let (backend, session) = loaded_session(vec![podcast("p1", TWO_LINES), podcast("p2", TWO_LINES)]).await;
    session.list_podcasts(ListScope::All).await.unwrap();
    backend.fail_once(BackendOp::Delete, Some(&key("p1")));

    assert!(session.delete_podcast(ListScope::All, &key("p1")).await.is_err());
    let rows = session.cached_list(ListScope::All).await.unwrap().unwrap();
    assert_eq!(rows[0].id, key("p1"));
    assert_eq!(rows.len(), 2);
}
