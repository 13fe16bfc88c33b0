//! Image workflow integration tests
//!
//! Runs the workflows against an in-process mock orchestrator with fast
//! polling settings (real clock).

mod helpers;

use helpers::{app_state, fast_settings, next_event, sample_data, wait_for_job, MockOrchestrator};
use mvs_common::events::{JobStatus, NotificationLevel, UiEvent};
use mvs_ui::services::{run_progress_stream, ClientError, WorkflowError};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn is_notification(level: NotificationLevel) -> impl Fn(&UiEvent) -> bool {
    move |event| matches!(event, UiEvent::Notification { level: l, .. } if *l == level)
}

fn message_of(event: &UiEvent) -> &str {
    match event {
        UiEvent::Notification { message, .. } => message,
        other => panic!("not a notification: {:?}", other),
    }
}

#[tokio::test]
async fn test_generate_from_lyrics_creates_one_image_per_section() {
    let mock = MockOrchestrator::start(sample_data()).await;
    let state = app_state(fast_settings(&mock.base_url));
    let mut rx = state.event_bus.subscribe();

    let lyrics = "[Verse]\nCity lights\n[Chorus]\nNeon rain\n[Verse]\nEmpty streets";
    let job_id = state
        .workflow
        .start_generate_from_lyrics(1, lyrics)
        .await
        .unwrap();
    assert!(state.jobs.is_in_progress(&job_id).await);

    let record = wait_for_job(&state.jobs, &job_id).await;
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.subject_ids, vec!["13", "14", "15"]);

    let created: Vec<_> = mock
        .images()
        .into_iter()
        .filter(|i| i["id"].as_i64().unwrap() > 12)
        .collect();
    let shape: Vec<(String, u64)> = created
        .iter()
        .map(|i| {
            (
                i["image_type"].as_str().unwrap().to_string(),
                i["sequence_number"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        shape,
        vec![
            ("verse".to_string(), 1),
            ("chorus".to_string(), 1),
            ("verse".to_string(), 2)
        ]
    );
    assert!(created[1]["prompt"].as_str().unwrap().contains("synthwave"));
    assert!(created[1]["prompt"].as_str().unwrap().contains("Neon rain"));
    assert_eq!(created[0]["width"], json!(1920));
    assert!(created.iter().all(|i| !i["image_path"].as_str().unwrap().is_empty()));

    // One image listing per poll tick covers the whole batch
    let listings = mock
        .calls()
        .iter()
        .filter(|c| c.as_str() == "GET /songs/1/images")
        .count();
    assert_eq!(listings, 2);

    let toast = next_event(&mut rx, is_notification(NotificationLevel::Success)).await;
    assert_eq!(message_of(&toast), "Generated 3 images");
}

#[tokio::test]
async fn test_lyrics_without_sections_make_no_orchestrator_calls() {
    let mock = MockOrchestrator::start(sample_data()).await;
    let state = app_state(fast_settings(&mock.base_url));
    let mut rx = state.event_bus.subscribe();

    let result = state
        .workflow
        .start_generate_from_lyrics(1, "  \n[]\n()\n")
        .await;

    assert!(matches!(
        result,
        Err(WorkflowError::Common(mvs_common::Error::NoSections))
    ));
    assert!(mock.calls().is_empty());
    assert!(state.jobs.snapshot().await.is_empty());

    let toast = next_event(&mut rx, is_notification(NotificationLevel::Error)).await;
    assert_eq!(message_of(&toast), "No valid sections found in lyrics");
}

#[tokio::test]
async fn test_regenerate_completes_and_clears_busy_state() {
    let mock = MockOrchestrator::start(sample_data()).await;
    let state = app_state(fast_settings(&mock.base_url));
    let mut rx = state.event_bus.subscribe();

    let job_id = state.workflow.start_regenerate(1, 12).await.unwrap();
    assert_eq!(job_id, "12");
    assert_eq!(state.jobs.in_progress().await, vec!["12"]);

    let record = wait_for_job(&state.jobs, &job_id).await;
    assert_eq!(record.status, JobStatus::Completed);
    assert!(state.jobs.in_progress().await.is_empty());

    let image = mock
        .images()
        .into_iter()
        .find(|i| i["id"] == 12)
        .unwrap();
    assert_eq!(image["image_path"], "/renders/12.png");

    let toast = next_event(&mut rx, is_notification(NotificationLevel::Success)).await;
    assert_eq!(message_of(&toast), "Image 12 regenerated");
}

#[tokio::test]
async fn test_regenerate_same_image_twice_conflicts_then_cancels_quietly() {
    let mut data = sample_data();
    data.stuck.insert(12);
    let mock = MockOrchestrator::start(data).await;
    let state = app_state(fast_settings(&mock.base_url));
    let mut rx = state.event_bus.subscribe();

    state.workflow.start_regenerate(1, 12).await.unwrap();
    let second = state.workflow.start_regenerate(1, 12).await;
    assert!(matches!(
        second,
        Err(WorkflowError::Common(mvs_common::Error::Conflict(_)))
    ));

    assert!(state.jobs.cancel("12").await);
    let record = wait_for_job(&state.jobs, "12").await;
    assert_eq!(record.status, JobStatus::Cancelled);

    let finished = next_event(&mut rx, |e| matches!(e, UiEvent::JobFinished { .. })).await;
    assert!(matches!(
        finished,
        UiEvent::JobFinished {
            status: JobStatus::Cancelled,
            ..
        }
    ));

    // Cancelled jobs finish without a toast
    while let Ok(event) = rx.try_recv() {
        assert!(
            !matches!(event, UiEvent::Notification { .. }),
            "unexpected toast: {:?}",
            event
        );
    }
}

#[tokio::test]
async fn test_regenerate_timeout_warns() {
    let mut data = sample_data();
    data.stuck.insert(12);
    let mock = MockOrchestrator::start(data).await;

    let mut settings = fast_settings(&mock.base_url);
    settings.polling.single_timeout_ms = 200;
    let state = app_state(settings);
    let mut rx = state.event_bus.subscribe();

    let job_id = state.workflow.start_regenerate(1, 12).await.unwrap();
    let record = wait_for_job(&state.jobs, &job_id).await;
    assert_eq!(record.status, JobStatus::TimedOut);

    let toast = next_event(&mut rx, is_notification(NotificationLevel::Warning)).await;
    assert!(message_of(&toast).contains("still generating"));
}

#[tokio::test]
async fn test_regenerate_unknown_image_fails() {
    let mock = MockOrchestrator::start(sample_data()).await;
    let state = app_state(fast_settings(&mock.base_url));

    let result = state.workflow.start_regenerate(1, 99).await;
    assert!(matches!(
        result,
        Err(WorkflowError::Client(ClientError::NotFound(_)))
    ));

    let record = state.jobs.get("99").await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(!state.jobs.is_in_progress("99").await);
}

#[tokio::test]
async fn test_generate_missing_only_touches_unrendered_images() {
    let mock = MockOrchestrator::start(sample_data()).await;
    let state = app_state(fast_settings(&mock.base_url));

    let job_id = state
        .workflow
        .start_generate_missing(1)
        .await
        .unwrap()
        .expect("image 12 is missing");

    let record = wait_for_job(&state.jobs, &job_id).await;
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.subject_ids, vec!["12"]);

    let calls = mock.calls();
    assert!(calls.contains(&"POST /images/12/regenerate".to_string()));
    assert!(!calls.contains(&"POST /images/11/regenerate".to_string()));
}

#[tokio::test]
async fn test_generate_missing_with_nothing_missing_is_informational() {
    let mut data = sample_data();
    data.images[1]["image_path"] = json!("/renders/12.png");
    let mock = MockOrchestrator::start(data).await;
    let state = app_state(fast_settings(&mock.base_url));
    let mut rx = state.event_bus.subscribe();

    let result = state.workflow.start_generate_missing(1).await.unwrap();
    assert!(result.is_none());
    assert!(state.jobs.snapshot().await.is_empty());

    let toast = next_event(&mut rx, is_notification(NotificationLevel::Info)).await;
    assert_eq!(message_of(&toast), "All images already generated");
}

#[tokio::test]
async fn test_progress_stream_relays_updates() {
    let mock = MockOrchestrator::start(sample_data()).await;
    let state = app_state(fast_settings(&mock.base_url));
    let mut rx = state.event_bus.subscribe();
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_progress_stream(
        state.clients.clone(),
        state.progress.clone(),
        state.event_bus.clone(),
        cancel.clone(),
    ));

    let connected = next_event(&mut rx, |e| {
        matches!(e, UiEvent::ProgressStreamStatus { .. })
    })
    .await;
    assert!(matches!(
        connected,
        UiEvent::ProgressStreamStatus {
            connected: true,
            ..
        }
    ));

    let progress = next_event(&mut rx, |e| matches!(e, UiEvent::QueueProgress { .. })).await;
    match progress {
        UiEvent::QueueProgress { update, .. } => {
            assert_eq!(update.queue_id, 1);
            assert_eq!(update.current_step.as_deref(), Some("compositing"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(state.progress.get(1).await.unwrap().progress, 42.5);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("progress stream did not stop")
        .unwrap();
}
