// Vigil Core Library
// Live state synchronizer for the threat detection dashboard

pub mod commands;
pub mod config;
pub mod event;
pub mod governor;
pub mod ports;
pub mod session;
pub mod snapshot;
pub mod sse;
pub mod state;
pub mod stream;
pub mod sync;
pub mod telemetry;

// Export core types
pub use commands::{CommandDispatcher, PromptSelector};
pub use config::{Features, SyncConfig};
pub use event::DashboardEvent;
pub use governor::{ErrorGovernor, GovernorVerdict};
pub use ports::{AlarmSink, Notice, NoticeLevel, RenderPort, SilentAlarm};
pub use session::{Session, SessionHandle, UserCommand};
pub use snapshot::{PromptField, Snapshot, SnapshotLoader};
pub use sse::SseEvent;
pub use state::{AcquisitionFrame, PromptChoice, ThreatLevel, ViewState};
pub use stream::{StreamConnection, StreamMessage};
pub use sync::Synchronizer;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VigilError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Malformed {event} event: {reason}")]
    MalformedEvent { event: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<reqwest::Error> for VigilError {
    fn from(err: reqwest::Error) -> Self {
        VigilError::Http(err.to_string())
    }
}

impl VigilError {
    /// Text shown to the user: the server's error body when there is one,
    /// otherwise the error itself.
    pub fn detail(&self) -> String {
        match self {
            VigilError::Status { status, body } if body.trim().is_empty() => {
                format!("server responded with status {status}")
            }
            VigilError::Status { body, .. } => body.trim().to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VigilError>;
