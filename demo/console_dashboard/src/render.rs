// Terminal rendering of the view state
//
// Status changes print one line; response streams print incrementally as chunks arrive.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use vigil_core::{AcquisitionFrame, Notice, NoticeLevel, RenderPort, ThreatLevel, ViewState};

/// Latest view, shared with the input loop for `status`
pub type SharedView = Arc<Mutex<Option<ViewState>>>;

pub struct ConsoleRenderer {
    threat_stream: String,
    frame_out: Option<PathBuf>,
    latest: SharedView,
    last_status: String,
    last_frame: Option<String>,
    printed: BTreeMap<String, String>,
}

impl ConsoleRenderer {
    pub fn new(threat_stream: impl Into<String>, frame_out: Option<PathBuf>) -> Self {
        Self {
            threat_stream: threat_stream.into(),
            frame_out,
            latest: Arc::new(Mutex::new(None)),
            last_status: String::new(),
            last_frame: None,
            printed: BTreeMap::new(),
        }
    }

    pub fn shared_view(&self) -> SharedView {
        Arc::clone(&self.latest)
    }

    fn print_streams(&mut self, state: &ViewState, out: &mut impl Write) {
        for (stream, text) in &state.streamed_text {
            let printed = self.printed.entry(stream.clone()).or_default();
            if printed == text {
                continue;
            }
            match text.strip_prefix(printed.as_str()) {
                Some(delta) if !printed.is_empty() => {
                    let _ = write!(out, "{delta}");
                }
                _ => {
                    if !text.is_empty() {
                        let _ = write!(out, "\n[{stream}] {text}");
                    }
                }
            }
            *printed = text.clone();
        }
        let _ = out.flush();
    }

    fn write_frame(&mut self, state: &ViewState) {
        let Some(path) = self.frame_out.clone() else {
            return;
        };
        let image = state.display_image();
        if image == self.last_frame.as_deref() {
            return;
        }
        self.last_frame = image.map(str::to_string);
        let Some(image) = image else {
            return;
        };
        match STANDARD.decode(image.trim()) {
            Ok(bytes) => match std::fs::write(&path, bytes) {
                Ok(()) => debug!(target: "console", path = ?path, "Wrote frame"),
                Err(e) => warn!(target: "console", path = ?path, error = %e, "Could not write frame"),
            },
            Err(e) => warn!(target: "console", error = %e, "Frame is not valid base64"),
        }
    }
}

impl RenderPort for ConsoleRenderer {
    fn render(&mut self, state: &ViewState) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(state.clone());
        }

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let status = status_line(state, &self.threat_stream);
        if status != self.last_status {
            let _ = writeln!(out, "\n{status}");
            self.last_status = status;
        }
        self.print_streams(state, &mut out);
        self.write_frame(state);
    }

    fn notice(&mut self, notice: Notice) {
        let tag = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        };
        match notice.detail {
            Some(detail) => println!("\n[{tag}] {}: {detail}", notice.title),
            None => println!("\n[{tag}] {}", notice.title),
        }
    }

    fn terminal_alert(&mut self, message: &str) {
        println!("\n!! {message}");
        println!("!! live updates stopped; restart the dashboard to reconnect");
    }
}

/// One-line summary of everything except the streamed text
pub fn status_line(state: &ViewState, threat_stream: &str) -> String {
    let mut parts = Vec::new();
    parts.push(match state.display_time() {
        Some(time) => format!("[{time}]"),
        None => "[--:--:--]".to_string(),
    });
    if let Some(prompt) = state.prompt_label() {
        parts.push(format!("prompt: {prompt}"));
    }
    let level = state.threat_level(threat_stream);
    if level != ThreatLevel::Unknown {
        parts.push(format!("threat: {level}"));
    }
    parts.push(if !state.loaded {
        "frame: waiting".to_string()
    } else if state.display_image().is_none() {
        "frame: none".to_string()
    } else if state.show_annotated {
        "frame: annotated".to_string()
    } else {
        "frame: raw".to_string()
    });
    if let Some(frame) = &state.frame {
        parts.push(frame_stats(frame));
    }
    if state.events_paused {
        parts.push("PAUSED (type resume)".to_string());
    }
    if state.alarm_armed {
        parts.push("alarm armed".to_string());
    }
    parts.join(" | ")
}

fn frame_stats(frame: &AcquisitionFrame) -> String {
    let mut out = String::new();
    if let Some(count) = frame.threat_count {
        out.push_str(&format!("threats {count}, "));
    }
    if let Some(dropped) = frame.dropped {
        out.push_str(&format!("dropped {dropped}, "));
    }
    match frame.inference_ms {
        Some(ms) => out.push_str(&format!("inference {ms:.1} ms")),
        None => out.push_str("inference unknown"),
    }
    out
}

/// Full multi-line view for the `status` command
pub fn describe(state: &ViewState, threat_stream: &str) -> String {
    let mut out = status_line(state, threat_stream);
    for (stream, text) in &state.streamed_text {
        let busy = if state.is_busy(stream) { " (generating)" } else { "" };
        out.push_str(&format!("\n[{stream}]{busy} {text}"));
    }
    if !state.prompt_choices.is_empty() {
        out.push_str("\nprompts:");
        for choice in &state.prompt_choices {
            match choice.id {
                Some(id) => out.push_str(&format!("\n  {id}: {}", choice.text)),
                None => out.push_str(&format!("\n  - {}", choice.text)),
            }
        }
    }
    out
}
