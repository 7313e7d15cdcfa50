//! Command End-to-End Tests
//!
//! User commands sent through a SessionHandle and the REST calls they make.

use super::*;
use vigil_core::{CommandDispatcher, NoticeLevel, PromptChoice, PromptSelector, UserCommand};

fn prompt_list() -> Value {
    json!([
        { "id": 1, "prompt": "Is this person a threat?" },
        { "id": 2, "prompt": "Count vehicles" }
    ])
}

#[tokio::test]
async fn test_set_prompt_by_id() {
    let backend = MockBackend::start(BackendConfig {
        prompts: prompt_list(),
        ..BackendConfig::default()
    })
    .await;

    let mut session = RunningSession::start(test_config(&backend.base_url));
    session.wait_for_view(|v| v.prompt_choices.len() == 2).await;

    session
        .handle
        .send(UserCommand::SetPrompt(PromptSelector::Id(2)))
        .await
        .unwrap();

    let notice = session.wait_for_notice("Prompt changed to Count vehicles").await;
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(backend.prompt_posts(), vec![json!({ "id": 2 })]);

    session.stop().await;
}

#[tokio::test]
async fn test_set_prompt_failure_shows_server_message() {
    let backend = MockBackend::start(BackendConfig {
        prompt_status: 412,
        prompt_reply: "prompt with id 9 not found\n".to_string(),
        ..BackendConfig::default()
    })
    .await;

    let mut session = RunningSession::start(test_config(&backend.base_url));
    session
        .handle
        .send(UserCommand::SetPrompt(PromptSelector::Id(9)))
        .await
        .unwrap();

    let notice = session.wait_for_notice("Error occurred!").await;
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.detail.as_deref(), Some("prompt with id 9 not found"));

    // Selection only changes when the backend broadcasts a prompt event
    let sync = session.stop().await;
    assert_eq!(sync.state().prompt_id, None);
}

#[tokio::test]
async fn test_resume_events_calls_backend() {
    let backend = MockBackend::start(BackendConfig {
        sse_events: vec![MockEvent::new("pause_events", "{}")],
        ..BackendConfig::default()
    })
    .await;

    let mut session = RunningSession::start(test_config(&backend.base_url));
    session.wait_for_view(|v| v.events_paused).await;

    session.handle.send(UserCommand::ResumeEvents).await.unwrap();
    eventually(|| backend.resume_calls() == 1).await;

    // No optimistic update; the view waits for resume_events
    let sync = session.stop().await;
    assert!(sync.state().events_paused);
}

#[tokio::test]
async fn test_resume_rejected_when_disabled() {
    let backend = MockBackend::start(BackendConfig::default()).await;

    let mut config = test_config(&backend.base_url);
    config.features.pause_resume = false;
    let mut session = RunningSession::start(config);

    session.handle.send(UserCommand::ResumeEvents).await.unwrap();
    let notice = session.wait_for_notice("Cannot resume events").await;
    assert_eq!(notice.level, NoticeLevel::Error);

    session.stop().await;
    assert_eq!(backend.resume_calls(), 0);
}

#[tokio::test]
async fn test_local_toggles_render_immediately() {
    let backend = MockBackend::start(BackendConfig::default()).await;
    let mut session = RunningSession::start(test_config(&backend.base_url));

    session.handle.send(UserCommand::ShowAnnotated(false)).await.unwrap();
    session.wait_for_view(|v| !v.show_annotated).await;

    session.handle.send(UserCommand::ArmAlarm(true)).await.unwrap();
    let view = session.wait_for_view(|v| v.alarm_armed).await;
    assert!(!view.show_annotated);

    session.stop().await;
}

#[tokio::test]
async fn test_refresh_prompts_failure_notice() {
    let backend = MockBackend::start(BackendConfig {
        prompts: json!({ "unexpected": true }),
        ..BackendConfig::default()
    })
    .await;

    let mut session = RunningSession::start(test_config(&backend.base_url));
    session.wait_for_notice("Could not load prompts").await;

    session.handle.send(UserCommand::RefreshPrompts).await.unwrap();
    session.wait_for_notice("Could not load prompts").await;

    session.stop().await;
}

// =============================================================================
// CommandDispatcher directly
// =============================================================================

#[tokio::test]
async fn test_dispatcher_legacy_prompt_shapes() {
    let backend = MockBackend::start(BackendConfig {
        prompts: json!(["Describe the scene", "Count people"]),
        prompt_reply: "Prompt changed".to_string(),
        ..BackendConfig::default()
    })
    .await;

    let config = test_config(&backend.base_url);
    let dispatcher = CommandDispatcher::new(config.http_client().unwrap(), &config);

    let choices = dispatcher.load_prompt_choices().await.unwrap();
    assert_eq!(
        choices,
        vec![
            PromptChoice { id: None, text: "Describe the scene".into() },
            PromptChoice { id: None, text: "Count people".into() },
        ]
    );

    let reply = dispatcher
        .set_prompt(&PromptSelector::Text("Count people".into()))
        .await
        .unwrap();
    assert_eq!(reply, "Prompt changed");
    assert_eq!(backend.prompt_posts(), vec![json!({ "prompt": "Count people" })]);
}

#[tokio::test]
async fn test_dispatcher_null_prompt_list_is_empty() {
    let backend = MockBackend::start(BackendConfig {
        prompts: Value::Null,
        ..BackendConfig::default()
    })
    .await;

    let config = test_config(&backend.base_url);
    let dispatcher = CommandDispatcher::new(config.http_client().unwrap(), &config);
    assert!(dispatcher.load_prompt_choices().await.unwrap().is_empty());
}
