//! Threat alarm playback
//!
//! `AlarmPlayer` implements the core's `AlarmSink`. Each play starts the sound in
//! the background and returns at once; a failed or missing player degrades to a
//! terminal bell (or just a log line when the bell is disabled).
//!
//! Env overrides:
//! - VIGIL_ALARM_SOUND: path to the sound file
//! - VIGIL_ALARM_PLAYER: preferred player (aplay|paplay|ffplay|mpg123|afplay or a path)
//! - VIGIL_ALARM_BELL: 0 to disable the bell fallback

use crate::player::{player_command, select_player};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use vigil_core::{AlarmSink, Result, VigilError};

#[derive(Clone, Debug)]
pub struct AlarmConfig {
    pub sound: Option<PathBuf>,
    pub player: Option<String>,
    pub bell_fallback: bool,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        let sound = std::env::var("VIGIL_ALARM_SOUND")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let player = std::env::var("VIGIL_ALARM_PLAYER")
            .ok()
            .filter(|s| !s.is_empty());
        let bell_fallback = std::env::var("VIGIL_ALARM_BELL")
            .map(|v| v != "0")
            .unwrap_or(true);
        Self {
            sound,
            player,
            bell_fallback,
        }
    }
}

/// How a play request is carried out
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Playback {
    Player { bin: PathBuf, sound: PathBuf },
    Bell,
    Silent,
}

pub struct AlarmPlayer {
    playback: Playback,
    plays: Arc<AtomicU64>,
}

impl AlarmPlayer {
    pub fn new(cfg: AlarmConfig) -> Self {
        let playback = resolve_playback(&cfg);
        match &playback {
            Playback::Player { bin, sound } => {
                info!(target: "alarm", player = ?bin, sound = ?sound, "Alarm player ready")
            }
            Playback::Bell => info!(target: "alarm", "No alarm player; using terminal bell"),
            Playback::Silent => info!(target: "alarm", "Alarm output disabled"),
        }
        Self {
            playback,
            plays: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Check that a configured sound file exists before starting the dashboard
    pub fn check(cfg: &AlarmConfig) -> Result<()> {
        match &cfg.sound {
            Some(sound) if !sound.is_file() => Err(VigilError::Audio(format!(
                "alarm sound not found: {}",
                sound.display()
            ))),
            _ => Ok(()),
        }
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    /// Number of times the alarm has been triggered
    pub fn plays(&self) -> u64 {
        self.plays.load(Ordering::Relaxed)
    }
}

fn resolve_playback(cfg: &AlarmConfig) -> Playback {
    let player = cfg.sound.as_deref().filter(|s| s.is_file()).and_then(|sound| {
        select_player(cfg.player.as_deref(), sound).map(|bin| Playback::Player {
            bin,
            sound: sound.to_path_buf(),
        })
    });
    match player {
        Some(player) => player,
        None if cfg.bell_fallback => Playback::Bell,
        None => Playback::Silent,
    }
}

impl AlarmSink for AlarmPlayer {
    fn play(&mut self) {
        let count = self.plays.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(target: "alarm", count, "Playing alarm");
        match &self.playback {
            Playback::Player { bin, sound } => spawn_player(bin.clone(), sound.clone()),
            Playback::Bell => ring_bell(),
            Playback::Silent => info!(target: "alarm", count, "Alarm triggered (silent)"),
        }
    }
}

// Fire and forget; overlapping plays are allowed
fn spawn_player(bin: PathBuf, sound: PathBuf) {
    let run = move || {
        if let Err(e) = play_once(&bin, &sound) {
            warn!(target: "alarm", player = ?bin, error = %e, "Alarm playback failed; ringing bell");
            ring_bell();
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(run);
        }
        Err(_) => {
            std::thread::spawn(run);
        }
    }
}

fn play_once(bin: &Path, sound: &Path) -> std::io::Result<()> {
    let status = player_command(bin, sound).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("player exited with {status}"),
        ))
    }
}

fn ring_bell() {
    let mut err = std::io::stderr();
    let _ = err.write_all(b"\x07");
    let _ = err.flush();
}
