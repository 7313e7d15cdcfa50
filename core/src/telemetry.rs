// Logging setup and stream counters
use crate::{Result, VigilError};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Counters kept by the synchronizer for the status line and shutdown log
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    pub connections_opened: u64,
    pub events_received: u64,
    pub events_applied: u64,
    pub malformed_dropped: u64,
    pub unknown_ignored: u64,
    pub stream_errors: u64,
}

/// Install the fmt subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Logs go to stderr; stdout belongs to the dashboard output.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| VigilError::Config(format!("Failed to install tracing subscriber: {e}")))
}
