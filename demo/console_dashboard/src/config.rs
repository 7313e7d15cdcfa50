use std::fs;
use std::path::{Path, PathBuf};

use vigil_audio::AlarmConfig;
use vigil_core::config::parse_list;
use vigil_core::SyncConfig;

/// High-level configuration for the console dashboard
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    pub sync: SyncConfig,
    pub alarm: AlarmConfig,
    pub display: DisplayConfig,
}

/// Local presentation preferences
#[derive(Clone, Debug)]
pub struct DisplayConfig {
    /// Where the currently displayed frame is written as a JPEG
    pub frame_out: Option<PathBuf>,
    pub show_annotated: bool,
    /// Arm the alarm at startup instead of waiting for `alarm on`
    pub arm_alarm: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            frame_out: std::env::var("VIGIL_FRAME_OUT")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            show_annotated: true,
            arm_alarm: std::env::var("VIGIL_ARM_ALARM")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        // Module defaults already consider env vars
        Self {
            sync: SyncConfig::default(),
            alarm: AlarmConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from a TOML file (path via VIGIL_CONFIG or ./vigil.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("VIGIL_CONFIG").unwrap_or_else(|_| "vigil.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "console", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match Self::from_toml_str(&s, default.clone()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "console", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "console", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn from_toml_str(raw: &str, base: Self) -> Result<Self, toml::de::Error> {
        let t = toml::from_str::<ConsoleToml>(raw)?;
        Ok(t.overlay(base))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ConsoleToml {
    pub sync: Option<SyncToml>,
    pub features: Option<FeaturesToml>,
    pub alarm: Option<AlarmToml>,
    pub display: Option<DisplayToml>,
}

impl ConsoleToml {
    fn overlay(self, mut base: ConsoleConfig) -> ConsoleConfig {
        if let Some(s) = self.sync {
            s.apply(&mut base.sync);
        }
        if let Some(f) = self.features {
            f.apply(&mut base.sync);
        }
        if let Some(a) = self.alarm {
            a.apply(&mut base.alarm);
        }
        if let Some(d) = self.display {
            d.apply(&mut base.display);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SyncToml {
    pub base_url: Option<String>,
    pub sse_path: Option<String>,
    pub snapshot_path: Option<String>,
    pub prompt_path: Option<String>,
    pub resume_path: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub retry_ms: Option<u64>,
    pub error_threshold: Option<u32>,
}
impl SyncToml {
    fn apply(self, s: &mut SyncConfig) {
        if let Some(x) = self.base_url {
            s.base_url = x;
        }
        if let Some(x) = self.sse_path {
            s.sse_path = x;
        }
        if let Some(x) = self.snapshot_path {
            s.snapshot_path = x;
        }
        if let Some(x) = self.prompt_path {
            s.prompt_path = x;
        }
        if let Some(x) = self.resume_path {
            s.resume_path = x;
        }
        if let Some(x) = self.request_timeout_ms {
            s.request_timeout_ms = x;
        }
        if let Some(x) = self.retry_ms {
            s.retry_ms = x;
        }
        if let Some(x) = self.error_threshold {
            s.error_threshold = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct FeaturesToml {
    pub sound_alarm: Option<bool>,
    pub pause_resume: Option<bool>,
    pub response_streams: Option<Vec<String>>, // e.g., ["ollama", "openai"]
    pub dependent_streams: Option<Vec<String>>,
    pub threat_stream: Option<String>,
}
impl FeaturesToml {
    fn apply(self, s: &mut SyncConfig) {
        let f = &mut s.features;
        if let Some(x) = self.sound_alarm {
            f.sound_alarm = x;
        }
        if let Some(x) = self.pause_resume {
            f.pause_resume = x;
        }
        if let Some(x) = self.response_streams {
            f.response_streams = parse_list(&x.join(","));
        }
        if let Some(x) = self.dependent_streams {
            f.dependent_streams = parse_list(&x.join(","));
        }
        if let Some(x) = self.threat_stream {
            f.threat_stream = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct AlarmToml {
    pub sound: Option<PathBuf>,
    pub player: Option<String>,
    pub bell: Option<bool>,
}
impl AlarmToml {
    fn apply(self, a: &mut AlarmConfig) {
        if let Some(x) = self.sound {
            a.sound = Some(x);
        }
        if let Some(x) = self.player {
            a.player = Some(x);
        }
        if let Some(x) = self.bell {
            a.bell_fallback = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct DisplayToml {
    pub frame_out: Option<PathBuf>,
    pub show_annotated: Option<bool>,
    pub arm_alarm: Option<bool>,
}
impl DisplayToml {
    fn apply(self, d: &mut DisplayConfig) {
        if let Some(x) = self.frame_out {
            d.frame_out = Some(x);
        }
        if let Some(x) = self.show_annotated {
            d.show_annotated = x;
        }
        if let Some(x) = self.arm_alarm {
            d.arm_alarm = x;
        }
    }
}
