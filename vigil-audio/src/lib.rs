// Audio output for the dashboard

pub mod alarm;
pub mod player;

pub use alarm::{AlarmConfig, AlarmPlayer, Playback};
