// Server-sent event as delivered to the synchronizer
//
// Wire parsing (line endings, comments, multi-line data, `id`, `retry`) is done by
// reqwest-eventsource; events without data are never dispatched, so the backend's
// `event: ping` keep-alives do not reach the synchronizer.

use reqwest_eventsource::retry::Constant;
use reqwest_eventsource::retry::RetryPolicy;
use eventsource_stream::Event as MessageEvent;
use std::time::Duration;

/// Event name used when the server sends no `event:` field
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One dispatched server-sent event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    /// Last event id seen on the connection when this event was dispatched
    pub id: Option<String>,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl From<MessageEvent> for SseEvent {
    fn from(message: MessageEvent) -> Self {
        let event = if message.event.is_empty() {
            DEFAULT_EVENT_NAME.to_string()
        } else {
            message.event
        };
        Self {
            event,
            data: message.data,
            id: Some(message.id).filter(|id| !id.is_empty()),
        }
    }
}

/// Reconnect policy for the event stream: a fixed delay, retried forever.
///
/// A `retry:` field from the server replaces the delay. Giving up is left to the
/// error governor.
pub fn reconnect_policy(delay: Duration) -> Box<dyn RetryPolicy + Send + Unpin + 'static> {
    Box::new(Constant::new(delay, None))
}
