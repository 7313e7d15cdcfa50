//! Integration Test Module
//!
//! End-to-end tests that run a full `Session` against an in-process axum
//! backend speaking the alerts API:
//!
//! - `e2e_session`: snapshot load, event stream, reconnects
//! - `e2e_commands`: prompt selection, resume, prompt list
//! - `e2e_governor`: error threshold and terminal alert

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_stream::StreamExt;
use vigil_core::{
    AlarmSink, Features, Notice, RenderPort, Session, SessionHandle, SyncConfig, Synchronizer,
    ViewState,
};

mod e2e_commands;
mod e2e_session;

pub const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Mock alerts backend
// =============================================================================

#[derive(Clone, Debug)]
pub struct MockEvent {
    pub name: String,
    pub data: String,
    pub id: Option<String>,
}

impl MockEvent {
    pub fn new(name: &str, data: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            data: data.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn response(stream: &str, text: &str) -> Self {
        Self::new(
            &format!("{stream}_response"),
            json!({ "response": text }).to_string(),
        )
    }
}

/// What the mock backend answers with
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub snapshot_status: u16,
    pub snapshot: Value,
    pub prompts: Value,
    pub prompt_status: u16,
    pub prompt_reply: String,
    pub sse_status: u16,
    pub sse_events: Vec<MockEvent>,
    /// End the response after the events instead of holding it open
    pub close_after_events: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            snapshot_status: 200,
            snapshot: Value::Null,
            prompts: json!([]),
            prompt_status: 200,
            prompt_reply: "OK".to_string(),
            sse_status: 200,
            sse_events: Vec::new(),
            close_after_events: false,
        }
    }
}

pub struct BackendState {
    config: BackendConfig,
    pub prompt_posts: Mutex<Vec<Value>>,
    pub resume_calls: AtomicUsize,
    pub sse_connections: AtomicUsize,
    pub last_event_ids: Mutex<Vec<String>>,
}

pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start(config: BackendConfig) -> Self {
        let state = Arc::new(BackendState {
            config,
            prompt_posts: Mutex::new(Vec::new()),
            resume_calls: AtomicUsize::new(0),
            sse_connections: AtomicUsize::new(0),
            last_event_ids: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api/currentstate", get(current_state))
            .route("/api/prompt", get(list_prompts).post(set_prompt))
            .route("/api/resumeevents", get(resume_events))
            .route("/api/sse", get(event_stream))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            server,
        }
    }

    pub fn sse_connections(&self) -> usize {
        self.state.sse_connections.load(Ordering::SeqCst)
    }

    pub fn resume_calls(&self) -> usize {
        self.state.resume_calls.load(Ordering::SeqCst)
    }

    pub fn prompt_posts(&self) -> Vec<Value> {
        self.state.prompt_posts.lock().unwrap().clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn current_state(State(state): State<Arc<BackendState>>) -> Response {
    let config = &state.config;
    if config.snapshot_status != 200 {
        return (status(config.snapshot_status), "state unavailable").into_response();
    }
    Json(config.snapshot.clone()).into_response()
}

async fn list_prompts(State(state): State<Arc<BackendState>>) -> Response {
    Json(state.config.prompts.clone()).into_response()
}

async fn set_prompt(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.prompt_posts.lock().unwrap().push(body);
    let config = &state.config;
    (status(config.prompt_status), config.prompt_reply.clone()).into_response()
}

async fn resume_events(State(state): State<Arc<BackendState>>) -> Response {
    state.resume_calls.fetch_add(1, Ordering::SeqCst);
    "OK".into_response()
}

async fn event_stream(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.sse_connections.fetch_add(1, Ordering::SeqCst);
    if let Some(id) = headers.get("last-event-id").and_then(|v| v.to_str().ok()) {
        state.last_event_ids.lock().unwrap().push(id.to_string());
    }

    let config = &state.config;
    if config.sse_status != 200 {
        return (status(config.sse_status), "stream unavailable").into_response();
    }

    let events: Vec<Result<Event, Infallible>> = config
        .sse_events
        .iter()
        .map(|e| {
            let mut event = Event::default().event(&e.name).data(&e.data);
            if let Some(id) = &e.id {
                event = event.id(id);
            }
            Ok(event)
        })
        .collect();

    if config.close_after_events {
        Sse::new(tokio_stream::iter(events)).into_response()
    } else {
        let stream = tokio_stream::iter(events).chain(tokio_stream::pending());
        Sse::new(stream).into_response()
    }
}

// =============================================================================
// Observing renderer and alarm
// =============================================================================

#[derive(Debug)]
pub enum Observed {
    Render(ViewState),
    Notice(Notice),
    Alert(String),
}

pub struct ChannelRenderer {
    tx: mpsc::UnboundedSender<Observed>,
}

impl RenderPort for ChannelRenderer {
    fn render(&mut self, state: &ViewState) {
        let _ = self.tx.send(Observed::Render(state.clone()));
    }

    fn notice(&mut self, notice: Notice) {
        let _ = self.tx.send(Observed::Notice(notice));
    }

    fn terminal_alert(&mut self, message: &str) {
        let _ = self.tx.send(Observed::Alert(message.to_string()));
    }
}

#[derive(Clone, Default)]
pub struct CountingAlarm {
    pub plays: Arc<AtomicUsize>,
}

impl AlarmSink for CountingAlarm {
    fn play(&mut self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Session helpers
// =============================================================================

pub fn test_features() -> Features {
    Features {
        sound_alarm: true,
        pause_resume: true,
        response_streams: vec!["llm".into(), "ollama".into(), "openai".into()],
        dependent_streams: vec!["openai".into()],
        threat_stream: "openai".into(),
    }
}

pub fn test_config(base_url: &str) -> SyncConfig {
    SyncConfig {
        base_url: base_url.to_string(),
        sse_path: "/api/sse".into(),
        request_timeout_ms: 2_000,
        retry_ms: 20,
        error_threshold: 50,
        features: test_features(),
        ..SyncConfig::default()
    }
}

pub struct RunningSession {
    pub handle: SessionHandle,
    pub observed: mpsc::UnboundedReceiver<Observed>,
    pub alarm: CountingAlarm,
    task: JoinHandle<Synchronizer<ChannelRenderer, CountingAlarm>>,
}

impl RunningSession {
    pub fn start(config: SyncConfig) -> Self {
        let (tx, observed) = mpsc::unbounded_channel();
        let alarm = CountingAlarm::default();
        let (session, handle) =
            Session::new(config, ChannelRenderer { tx }, alarm.clone()).unwrap();
        let task = tokio::spawn(session.run());
        Self {
            handle,
            observed,
            alarm,
            task,
        }
    }

    /// Wait for the first observation `pick` accepts
    pub async fn next_matching<T>(&mut self, mut pick: impl FnMut(Observed) -> Option<T>) -> T {
        timeout(WAIT, async {
            loop {
                let observed = self.observed.recv().await.expect("renderer dropped");
                if let Some(found) = pick(observed) {
                    return found;
                }
            }
        })
        .await
        .expect("timed out waiting for observation")
    }

    pub async fn wait_for_view(&mut self, mut pred: impl FnMut(&ViewState) -> bool) -> ViewState {
        self.next_matching(|o| match o {
            Observed::Render(state) if pred(&state) => Some(state),
            _ => None,
        })
        .await
    }

    pub async fn wait_for_notice(&mut self, title: &str) -> Notice {
        self.next_matching(|o| match o {
            Observed::Notice(notice) if notice.title == title => Some(notice),
            _ => None,
        })
        .await
    }

    pub async fn wait_for_alert(&mut self) -> String {
        self.next_matching(|o| match o {
            Observed::Alert(message) => Some(message),
            _ => None,
        })
        .await
    }

    pub async fn stop(self) -> Synchronizer<ChannelRenderer, CountingAlarm> {
        self.handle.shutdown().await.unwrap();
        timeout(WAIT, self.task)
            .await
            .expect("session did not stop")
            .unwrap()
    }
}

/// Poll until `check` holds
pub async fn eventually(mut check: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time")
}
