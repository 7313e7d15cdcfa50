//! Session End-to-End Tests
//!
//! Snapshot load, live events and reconnect behaviour against the mock backend.

use super::*;
use vigil_core::ThreatLevel;

#[tokio::test]
async fn test_snapshot_then_live_events() {
    let backend = MockBackend::start(BackendConfig {
        snapshot: json!({
            "raw_image": "UkFX",
            "annotated_image": "QU5O",
            "prompt": "{\"id\":1,\"prompt\":\"Is this person a threat?\"}",
            "image_analysis": "A person by the fence.",
            "events_paused": false
        }),
        sse_events: vec![
            MockEvent::new("timestamp", "1700000100"),
            MockEvent::new("openai_response_start", "{}"),
            MockEvent::response("openai", "Threat: "),
            MockEvent::response("openai", "High. Climbing the fence."),
        ],
        ..BackendConfig::default()
    })
    .await;

    let mut session = RunningSession::start(test_config(&backend.base_url));

    // Snapshot and stream race; wait until both have landed
    let view = session
        .wait_for_view(|v| {
            v.stream_text("openai") == "Threat: High. Climbing the fence." && v.prompt_id == Some(1)
        })
        .await;
    assert_eq!(view.timestamp, Some(1700000100));
    assert_eq!(view.threat_level("openai"), ThreatLevel::High);
    assert!(!view.is_busy("openai"));
    assert_eq!(view.display_image(), Some("QU5O"));
    assert_eq!(view.prompt_text.as_deref(), Some("Is this person a threat?"));
    assert_eq!(view.stream_text("ollama"), "A person by the fence.");

    let sync = session.stop().await;
    assert_eq!(sync.stats().connections_opened, 1);
    assert_eq!(sync.stats().stream_errors, 0);
}

#[tokio::test]
async fn test_null_snapshot_keeps_defaults() {
    let backend = MockBackend::start(BackendConfig {
        sse_events: vec![MockEvent::new("annotated_image", "QU5O")],
        ..BackendConfig::default()
    })
    .await;

    let mut session = RunningSession::start(test_config(&backend.base_url));
    let view = session.wait_for_view(|v| v.loaded).await;
    assert_eq!(view.display_image(), Some("QU5O"));

    let sync = session.stop().await;
    assert_eq!(sync.state().timestamp, None);
    assert_eq!(sync.state().prompt_id, None);
}

#[tokio::test]
async fn test_snapshot_failure_does_not_block_stream() {
    let backend = MockBackend::start(BackendConfig {
        snapshot_status: 500,
        sse_events: vec![MockEvent::response("ollama", "Still streaming")],
        ..BackendConfig::default()
    })
    .await;

    let mut session = RunningSession::start(test_config(&backend.base_url));

    // The notice and the streamed text arrive in either order
    let mut notice = None;
    let mut streamed = false;
    while notice.is_none() || !streamed {
        match session.next_matching(Some).await {
            Observed::Notice(n) => notice = Some(n),
            Observed::Render(v) => streamed |= v.stream_text("ollama") == "Still streaming",
            Observed::Alert(message) => panic!("unexpected alert: {message}"),
        }
    }
    let notice = notice.unwrap();
    assert_eq!(notice.title, "Could not load current state");
    assert_eq!(notice.detail.as_deref(), Some("state unavailable"));

    session.stop().await;
}

#[tokio::test]
async fn test_pings_and_unknown_events_are_harmless() {
    let backend = MockBackend::start(BackendConfig {
        sse_events: vec![
            MockEvent::new("weather", "sunny"),
            MockEvent::new("ollama_response", "{broken"),
            MockEvent::new("pause_events", "{}"),
        ],
        ..BackendConfig::default()
    })
    .await;

    let mut session = RunningSession::start(test_config(&backend.base_url));
    session.wait_for_view(|v| v.events_paused).await;

    let sync = session.stop().await;
    assert_eq!(sync.stats().unknown_ignored, 1);
    assert_eq!(sync.stats().malformed_dropped, 1);
    assert_eq!(sync.governor().consecutive_errors(), 0);
}

#[tokio::test]
async fn test_reconnect_sends_last_event_id() {
    let backend = MockBackend::start(BackendConfig {
        sse_events: vec![
            MockEvent::new("raw_image", "UkFX").with_id("1"),
            MockEvent::new("timestamp", "1700000000").with_id("2"),
        ],
        close_after_events: true,
        ..BackendConfig::default()
    })
    .await;

    let session = RunningSession::start(test_config(&backend.base_url));
    eventually(|| backend.sse_connections() >= 3).await;

    let ids = backend.state.last_event_ids.lock().unwrap().clone();
    assert!(ids.iter().all(|id| id == "2"), "unexpected ids {ids:?}");
    assert!(!ids.is_empty());

    let sync = session.stop().await;
    // Every reconnect delivered events, so the governor never accumulates
    assert!(!sync.governor().is_tripped());
    assert!(sync.stats().connections_opened >= 2);
}
