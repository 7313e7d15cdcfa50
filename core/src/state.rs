// View-model store
//
// One ViewState per session. Only the synchronizer mutates it; presentation reads it.

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// How many of the most recent alarm timestamps are remembered for dedup
pub const PLAYED_TIMESTAMP_WINDOW: usize = 1024;

/// Entry of the prompt drop-down
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptChoice {
    /// Absent for backends that list bare prompt strings
    pub id: Option<i64>,
    pub text: String,
}

/// Threat level shown next to the threat analysis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatLevel {
    Unknown,
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    /// Parse a single word, ignoring case and surrounding punctuation
    pub fn parse_word(word: &str) -> Option<Self> {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        match word.to_ascii_lowercase().as_str() {
            "low" => Some(ThreatLevel::Low),
            "medium" => Some(ThreatLevel::Medium),
            "high" => Some(ThreatLevel::High),
            _ => None,
        }
    }

    /// Derive the level from an analysis such as "Threat: High. The person ...".
    ///
    /// The model is prompted to answer with the level as the second word; when it
    /// doesn't, the first level keyword in the text wins.
    pub fn from_analysis(text: &str) -> Self {
        let words: Vec<&str> = text.split_whitespace().collect();
        if let Some(level) = words.get(1).and_then(|w| Self::parse_word(w)) {
            return level;
        }
        words
            .iter()
            .find_map(|w| Self::parse_word(w))
            .unwrap_or(ThreatLevel::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Unknown => "",
            ThreatLevel::Low => "Low",
            ThreatLevel::Medium => "Medium",
            ThreatLevel::High => "High",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics carried by the acquisition-side `image` event
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionFrame {
    /// None hides the counter (the payload had no numeric count)
    pub threat_count: Option<i64>,
    pub dropped: Option<i64>,
    /// None is rendered as "unknown"
    pub inference_ms: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ViewState {
    pub raw_image: Option<String>,
    pub annotated_image: Option<String>,
    pub show_annotated: bool,
    pub loaded: bool,
    /// Unix seconds of the latest alert
    pub timestamp: Option<i64>,
    pub last_played_timestamp: i64,
    /// Newest timestamps the alarm has sounded for, at most `PLAYED_TIMESTAMP_WINDOW`
    pub played_timestamps: BTreeSet<i64>,
    pub alarm_armed: bool,
    pub prompt_id: Option<i64>,
    pub prompt_text: Option<String>,
    pub streamed_text: BTreeMap<String, String>,
    pub busy_streams: BTreeSet<String>,
    pub events_paused: bool,
    pub prompt_choices: Vec<PromptChoice>,
    pub frame: Option<AcquisitionFrame>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            raw_image: None,
            annotated_image: None,
            show_annotated: true,
            loaded: false,
            timestamp: None,
            last_played_timestamp: 0,
            played_timestamps: BTreeSet::new(),
            alarm_armed: false,
            prompt_id: None,
            prompt_text: None,
            streamed_text: BTreeMap::new(),
            busy_streams: BTreeSet::new(),
            events_paused: false,
            prompt_choices: Vec::new(),
            frame: None,
        }
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text received so far on a response stream
    pub fn stream_text(&self, stream: &str) -> &str {
        self.streamed_text
            .get(stream)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn clear_stream(&mut self, stream: &str) {
        self.streamed_text.insert(stream.to_string(), String::new());
    }

    pub fn append_stream(&mut self, stream: &str, text: &str) {
        self.streamed_text
            .entry(stream.to_string())
            .or_default()
            .push_str(text);
    }

    pub fn is_busy(&self, stream: &str) -> bool {
        self.busy_streams.contains(stream)
    }

    /// Image variant selected by `show_annotated`; None means draw the placeholder
    pub fn display_image(&self) -> Option<&str> {
        let image = if self.show_annotated {
            self.annotated_image.as_deref()
        } else {
            self.raw_image.as_deref()
        };
        image.filter(|data| !data.is_empty())
    }

    /// Alert time as local wall-clock time
    pub fn display_time(&self) -> Option<String> {
        self.timestamp.and_then(|ts| format_clock(ts, &Local))
    }

    pub fn threat_level(&self, stream: &str) -> ThreatLevel {
        ThreatLevel::from_analysis(self.stream_text(stream))
    }

    /// Label of the selected prompt, looked up in the choices when only the id is known
    pub fn prompt_label(&self) -> Option<String> {
        if let Some(text) = &self.prompt_text {
            return Some(text.clone());
        }
        let id = self.prompt_id?;
        self.prompt_choices
            .iter()
            .find(|c| c.id == Some(id))
            .map(|c| c.text.clone())
    }

    /// Decide whether a timestamp should sound the alarm, recording it if so.
    ///
    /// Invariant: at most one play per distinct timestamp value, even when an
    /// older alert is re-broadcast after a newer one. Alerts older than every
    /// remembered timestamp are assumed to be stale re-broadcasts and stay silent.
    pub fn should_sound_alarm(&mut self, timestamp: i64) -> bool {
        if !self.alarm_armed || timestamp == self.last_played_timestamp {
            return false;
        }
        let full = self.played_timestamps.len() >= PLAYED_TIMESTAMP_WINDOW;
        if full && self.played_timestamps.first().is_some_and(|oldest| timestamp < *oldest) {
            return false;
        }
        if !self.played_timestamps.insert(timestamp) {
            return false;
        }
        if self.played_timestamps.len() > PLAYED_TIMESTAMP_WINDOW {
            self.played_timestamps.pop_first();
        }
        self.last_played_timestamp = timestamp;
        true
    }
}

/// Format unix seconds as `HH:MM:SS` in the given zone
pub fn format_clock<Tz: TimeZone>(timestamp: i64, tz: &Tz) -> Option<String>
where
    Tz::Offset: fmt::Display,
{
    tz.timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%H:%M:%S").to_string())
}
