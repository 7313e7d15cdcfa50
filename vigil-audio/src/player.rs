//! Locating and invoking command-line audio players
//!
//! Nothing is linked against a sound library; playback shells out to whatever
//! player the host has (aplay, paplay, ffplay, mpg123, afplay).

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Players that understand WAV, in order of preference
const WAV_PLAYERS: &[&str] = &["aplay", "paplay", "ffplay", "afplay"];
/// Players for compressed formats such as the stock mp3 warning sound
const COMPRESSED_PLAYERS: &[&str] = &["ffplay", "mpg123", "afplay"];

/// Look `bin` up on PATH, or check it directly when it is a path
pub fn find_on_path(bin: &str) -> Option<PathBuf> {
    // If a path-like string is provided, respect it directly
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return if p.exists() { Some(p) } else { None };
    }

    if let Some(paths_os) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths_os) {
            let candidate = dir.join(bin);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Candidate players for a sound file, chosen by extension
pub fn candidates_for(sound: &Path) -> &'static [&'static str] {
    let is_wav = sound
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);
    if is_wav {
        WAV_PLAYERS
    } else {
        COMPRESSED_PLAYERS
    }
}

/// Pick a player: the preference if it is installed, otherwise the first available candidate
pub fn select_player(pref: Option<&str>, sound: &Path) -> Option<PathBuf> {
    if let Some(p) = pref.filter(|p| !p.is_empty()) {
        if let Some(found) = find_on_path(p) {
            return Some(found);
        }
    }
    candidates_for(sound).iter().find_map(|bin| find_on_path(bin))
}

/// Build the command that plays `sound` once and exits
pub fn player_command(player_bin: &Path, sound: &Path) -> Command {
    let name = player_bin
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let mut cmd = Command::new(player_bin);
    match name {
        "ffplay" => {
            cmd.arg("-autoexit")
                .arg("-nodisp")
                .arg("-loglevel")
                .arg("quiet");
        }
        "aplay" | "mpg123" => {
            cmd.arg("-q");
        }
        _ => {}
    }
    cmd.arg(sound)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}
