// Event stream subscriber
//
// One StreamConnection per session. A spawned reader task drives a reqwest-eventsource
// EventSource, which reconnects after the retry delay and sends Last-Event-ID. Every
// failure is reported as a StreamMessage::Error; deciding when to give up is the
// governor's job, and closing the connection aborts the reader.

use crate::sse::{reconnect_policy, SseEvent};
use crate::VigilError;
use reqwest::{header, Client};
use reqwest_eventsource::{Event, EventSource};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

const STREAM_CHANNEL_SIZE: usize = 256;

#[derive(Debug)]
pub enum StreamMessage {
    /// Connection (re)established with a 2xx response
    Opened,
    Event(SseEvent),
    Error(VigilError),
}

pub struct StreamConnection {
    url: String,
    rx: mpsc::Receiver<StreamMessage>,
    reader: Option<JoinHandle<()>>,
}

impl StreamConnection {
    /// Start reading `url`. Must be called inside a tokio runtime.
    pub fn open(client: Client, url: impl Into<String>, retry: Duration) -> Self {
        let url = url.into();
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_SIZE);
        let reader = tokio::spawn(read_event_source(client, url.clone(), retry, tx));
        info!(target: "stream", url = %url, "Subscribing to event stream");
        Self {
            url,
            rx,
            reader: Some(reader),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Next message from the reader; None once the connection is closed
    pub async fn next(&mut self) -> Option<StreamMessage> {
        if self.reader.is_none() {
            return None;
        }
        self.rx.recv().await
    }

    pub fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
            self.rx.close();
            info!(target: "stream", url = %self.url, "Event stream closed");
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn read_event_source(
    client: Client,
    url: String,
    default_retry: Duration,
    tx: mpsc::Sender<StreamMessage>,
) {
    let request = client
        .get(&url)
        .header(header::ACCEPT, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache");
    let mut source = match EventSource::new(request) {
        Ok(source) => source,
        Err(e) => {
            error!(target: "stream", url = %url, error = %e, "Cannot build event stream request");
            let _ = tx
                .send(StreamMessage::Error(VigilError::Stream(e.to_string())))
                .await;
            return;
        }
    };
    source.set_retry_policy(reconnect_policy(default_retry));

    while let Some(item) = source.next().await {
        let message = match item {
            Ok(Event::Open) => StreamMessage::Opened,
            Ok(Event::Message(message)) => StreamMessage::Event(SseEvent::from(message)),
            Err(e) => {
                let failure = stream_failure(e).await;
                debug!(target: "stream", url = %url, error = %failure, "Event stream failed, reconnecting");
                StreamMessage::Error(failure)
            }
        };
        if tx.send(message).await.is_err() {
            source.close();
            return;
        }
    }
}

async fn stream_failure(err: reqwest_eventsource::Error) -> VigilError {
    use reqwest_eventsource::Error;
    match err {
        Error::InvalidStatusCode(status, response) => VigilError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        },
        Error::Transport(e) => VigilError::Http(format!("event stream connect failed: {e}")),
        Error::StreamEnded => VigilError::Stream("event stream closed by server".into()),
        other => VigilError::Stream(format!("event stream interrupted: {other}")),
    }
}
