// Synchronizer
//
// Owns the ViewState and applies snapshots, stream events and command results to it.
// Everything here is synchronous; the session task calls in one message at a time.

use crate::config::{Features, SyncConfig};
use crate::event::DashboardEvent;
use crate::governor::{ErrorGovernor, GovernorVerdict};
use crate::ports::{AlarmSink, Notice, RenderPort};
use crate::snapshot::Snapshot;
use crate::sse::SseEvent;
use crate::state::{PromptChoice, ThreatLevel, ViewState};
use crate::telemetry::StreamStats;
use crate::VigilError;
use tracing::{debug, error, info, warn};

/// Text of the alert raised when the governor closes the stream
pub const TERMINAL_ALERT: &str =
    "connection error threshold exceeded, terminating SSE event source";

pub struct Synchronizer<R, A> {
    state: ViewState,
    features: Features,
    governor: ErrorGovernor,
    stats: StreamStats,
    renderer: R,
    alarm: A,
}

impl<R: RenderPort, A: AlarmSink> Synchronizer<R, A> {
    pub fn new(config: &SyncConfig, renderer: R, alarm: A) -> Self {
        Self {
            state: ViewState::default(),
            features: config.features.clone(),
            governor: ErrorGovernor::new(config.error_threshold),
            stats: StreamStats::default(),
            renderer,
            alarm,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn governor(&self) -> &ErrorGovernor {
        &self.governor
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn alarm(&self) -> &A {
        &self.alarm
    }

    pub fn threat_level(&self) -> ThreatLevel {
        self.state.threat_level(&self.features.threat_stream)
    }

    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        snapshot.merge_into(&mut self.state);
        info!(
            target: "snapshot",
            timestamp = ?self.state.timestamp,
            loaded = self.state.loaded,
            events_paused = self.state.events_paused,
            "Merged current state"
        );
        self.renderer.render(&self.state);
    }

    pub fn snapshot_failed(&mut self, err: &VigilError) {
        warn!(target: "snapshot", %err, "Could not load current state; keeping defaults");
        self.renderer
            .notice(Notice::error("Could not load current state", err.detail()));
    }

    pub fn stream_opened(&mut self) {
        self.stats.connections_opened += 1;
        debug!(target: "sync", connections = self.stats.connections_opened, "Event stream connected");
    }

    /// Handle one event from the stream. Any received event counts as a success for
    /// the governor, including ones that are dropped afterwards.
    pub fn handle_event(&mut self, event: &SseEvent) {
        self.governor.record_success();
        self.stats.events_received += 1;

        let decoded = match DashboardEvent::decode(event, &self.features) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.stats.malformed_dropped += 1;
                warn!(target: "sync", event = %event.event, %err, "Dropping malformed event");
                return;
            }
        };

        if self.apply(decoded) {
            self.stats.events_applied += 1;
            self.renderer.render(&self.state);
        }
    }

    /// Apply a decoded event; returns whether the view changed
    pub fn apply(&mut self, event: DashboardEvent) -> bool {
        match event {
            DashboardEvent::RawImage(data) => {
                self.state.raw_image = Some(data);
                self.state.loaded = true;
            }
            DashboardEvent::AnnotatedImage(data) => {
                self.state.annotated_image = Some(data);
                self.state.loaded = true;
            }
            DashboardEvent::Timestamp(ts) => {
                self.state.timestamp = Some(ts);
                if self.features.sound_alarm && self.state.should_sound_alarm(ts) {
                    info!(target: "alarm", timestamp = ts, "New threat timestamp; sounding alarm");
                    self.alarm.play();
                }
                for stream in &self.features.dependent_streams {
                    self.state.clear_stream(stream);
                }
            }
            DashboardEvent::Prompt { id, text } => {
                if id.is_some() {
                    self.state.prompt_id = id;
                }
                if text.is_some() {
                    self.state.prompt_text = text;
                } else if let Some(id) = id {
                    // Only the id arrived; show the matching choice if we know it
                    self.state.prompt_text = self
                        .state
                        .prompt_choices
                        .iter()
                        .find(|c| c.id == Some(id))
                        .map(|c| c.text.clone());
                }
            }
            DashboardEvent::ResponseStart { stream } => {
                self.state.clear_stream(&stream);
                self.state.busy_streams.insert(stream);
            }
            DashboardEvent::ResponseChunk { stream, text } => {
                self.state.append_stream(&stream, &text);
                self.state.busy_streams.remove(&stream);
            }
            DashboardEvent::ResponseStop { stream }
            | DashboardEvent::ResponseReady { stream } => {
                if !self.state.busy_streams.remove(&stream) {
                    return false;
                }
            }
            DashboardEvent::PauseEvents | DashboardEvent::ResumeEvents
                if !self.features.pause_resume =>
            {
                debug!(target: "sync", "Pause/resume disabled; ignoring event");
                return false;
            }
            DashboardEvent::PauseEvents => self.state.events_paused = true,
            DashboardEvent::ResumeEvents => self.state.events_paused = false,
            DashboardEvent::Frame { image, frame } => {
                if let Some(image) = image {
                    self.state.raw_image = Some(image);
                    self.state.loaded = true;
                }
                self.state.frame = Some(frame);
            }
            DashboardEvent::Unknown(name) => {
                self.stats.unknown_ignored += 1;
                debug!(target: "sync", event = %name, "Ignoring unknown event");
                return false;
            }
        }
        true
    }

    /// Count a stream error; on the first trip the terminal alert is raised.
    pub fn handle_stream_error(&mut self, err: &VigilError) -> GovernorVerdict {
        self.stats.stream_errors += 1;
        let verdict = self.governor.record_error();
        match verdict {
            GovernorVerdict::Continue => {
                debug!(
                    target: "sync",
                    %err,
                    consecutive = self.governor.consecutive_errors(),
                    threshold = self.governor.threshold(),
                    "Event stream error"
                );
            }
            GovernorVerdict::Trip => {
                error!(
                    target: "sync",
                    %err,
                    threshold = self.governor.threshold(),
                    "Error threshold exceeded; closing event stream"
                );
                self.renderer.terminal_alert(TERMINAL_ALERT);
            }
            GovernorVerdict::Closed => {}
        }
        verdict
    }

    pub fn set_show_annotated(&mut self, show: bool) {
        if self.state.show_annotated != show {
            self.state.show_annotated = show;
            self.renderer.render(&self.state);
        }
    }

    pub fn set_alarm_armed(&mut self, armed: bool) {
        if self.state.alarm_armed != armed {
            self.state.alarm_armed = armed;
            self.renderer.render(&self.state);
        }
    }

    pub fn set_prompt_choices(&mut self, choices: Vec<PromptChoice>) {
        self.state.prompt_choices = choices;
        self.renderer.render(&self.state);
    }

    pub fn notify(&mut self, notice: Notice) {
        self.renderer.notice(notice);
    }
}
