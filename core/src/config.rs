// Synchronizer configuration
//
// Defaults come from environment variables; the console front-end overlays a TOML file on top.

use crate::{Result, VigilError};
use reqwest::Client;
use std::time::Duration;

/// Consecutive stream errors tolerated before the stream is force-closed
pub const DEFAULT_ERROR_THRESHOLD: u32 = 50;
/// Reconnect delay used until the server sends a `retry:` field (EventSource default)
pub const DEFAULT_RETRY_MS: u64 = 3_000;

/// Single response stream of the oldest backend revision
pub const LEGACY_STREAM: &str = "llm";
/// Stream carrying the image description; also `image_analysis` in the snapshot
pub const IMAGE_ANALYSIS_STREAM: &str = "ollama";
/// Stream carrying the threat assessment; also `threat_analysis` in the snapshot
pub const THREAT_ANALYSIS_STREAM: &str = "openai";

/// Optional sub-features that differed between dashboard revisions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Features {
    /// Play the alarm on new threat timestamps (still needs to be armed by the user)
    pub sound_alarm: bool,
    /// Honour pause_events/resume_events and allow the resume command
    pub pause_resume: bool,
    /// Response stream names recognised in `<stream>_response*` events
    pub response_streams: Vec<String>,
    /// Buffers cleared whenever a new timestamp arrives
    pub dependent_streams: Vec<String>,
    /// Buffer the threat level is read from
    pub threat_stream: String,
}

impl Default for Features {
    fn default() -> Self {
        let response_streams = std::env::var("VIGIL_STREAMS")
            .ok()
            .map(|v| parse_list(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| {
                vec![
                    LEGACY_STREAM.to_string(),
                    IMAGE_ANALYSIS_STREAM.to_string(),
                    THREAT_ANALYSIS_STREAM.to_string(),
                ]
            });
        Self {
            sound_alarm: env_flag("VIGIL_ALARM").unwrap_or(true),
            pause_resume: env_flag("VIGIL_PAUSE_RESUME").unwrap_or(true),
            response_streams,
            dependent_streams: vec![THREAT_ANALYSIS_STREAM.to_string()],
            threat_stream: THREAT_ANALYSIS_STREAM.to_string(),
        }
    }
}

impl Features {
    pub fn recognizes_stream(&self, stream: &str) -> bool {
        self.response_streams.iter().any(|s| s == stream)
    }
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub base_url: String, // e.g., http://localhost:8080
    pub sse_path: String, // /api/sse, or /listen on the acquisition side
    pub snapshot_path: String,
    pub prompt_path: String,
    pub resume_path: String,
    pub request_timeout_ms: u64,
    pub retry_ms: u64,
    pub error_threshold: u32,
    pub features: Features,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("VIGIL_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            sse_path: std::env::var("VIGIL_SSE_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "/api/sse".to_string()),
            snapshot_path: "/api/currentstate".to_string(),
            prompt_path: "/api/prompt".to_string(),
            resume_path: "/api/resumeevents".to_string(),
            request_timeout_ms: std::env::var("VIGIL_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10_000),
            retry_ms: std::env::var("VIGIL_RETRY_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_MS),
            error_threshold: std::env::var("VIGIL_ERROR_THRESHOLD")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(DEFAULT_ERROR_THRESHOLD),
            features: Features::default(),
        }
    }
}

impl SyncConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn sse_url(&self) -> String {
        self.endpoint(&self.sse_path)
    }

    pub fn snapshot_url(&self) -> String {
        self.endpoint(&self.snapshot_path)
    }

    pub fn prompt_url(&self) -> String {
        self.endpoint(&self.prompt_path)
    }

    pub fn resume_url(&self) -> String {
        self.endpoint(&self.resume_path)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    /// Client for one-shot REST calls
    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_millis(self.request_timeout_ms))
            .build()
            .map_err(|e| VigilError::Config(format!("Failed to build HTTP client: {e}")))
    }

    /// Client for the event stream; no overall timeout since the body never ends
    pub fn stream_client(&self) -> Result<Client> {
        Client::builder()
            .connect_timeout(Duration::from_millis(self.request_timeout_ms))
            .build()
            .map_err(|e| VigilError::Config(format!("Failed to build stream client: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(VigilError::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.features.threat_stream.is_empty() {
            return Err(VigilError::Config("threat_stream must not be empty".into()));
        }
        Ok(())
    }
}

/// Split a comma separated list, dropping blanks
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn env_flag(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
