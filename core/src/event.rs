// Typed dashboard events decoded from the SSE stream
//
// Event names and payload shapes follow the alerts backend:
// `raw_image`, `annotated_image`, `timestamp`, `prompt`, `llm_request_start`,
// `llm_response_start` (legacy: it ends the wait rather than starting a response),
// `<stream>_response_start`, `<stream>_response`, `<stream>_response_stop`,
// `pause_events`, `resume_events`, plus the acquisition side's `image`.

use crate::config::{Features, LEGACY_STREAM};
use crate::sse::SseEvent;
use crate::state::AcquisitionFrame;
use crate::{Result, VigilError};
use serde::Deserialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum DashboardEvent {
    RawImage(String),
    AnnotatedImage(String),
    /// Unix seconds of a new alert
    Timestamp(i64),
    Prompt {
        id: Option<i64>,
        text: Option<String>,
    },
    ResponseStart {
        stream: String,
    },
    ResponseChunk {
        stream: String,
        text: String,
    },
    ResponseStop {
        stream: String,
    },
    /// The legacy backend's `llm_response_start`: generation has begun, so the
    /// busy indicator goes away but the buffer is kept
    ResponseReady {
        stream: String,
    },
    PauseEvents,
    ResumeEvents,
    /// Acquisition-side frame with its inference statistics
    Frame {
        image: Option<String>,
        frame: AcquisitionFrame,
    },
    Unknown(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PromptPayload {
    Item {
        id: Option<i64>,
        prompt: Option<String>,
    },
    Id(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct ResponsePayload {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagePayload {
    image: Option<String>,
    threatcount: Option<Value>,
    leaks: Option<Value>,
    dropped: Option<Value>,
    inference: Option<Value>,
}

impl DashboardEvent {
    /// Decode a raw SSE event.
    ///
    /// Unknown names decode to `Unknown`; a payload that should be JSON but
    /// isn't yields `MalformedEvent` and the caller drops the event.
    pub fn decode(event: &SseEvent, features: &Features) -> Result<Self> {
        let name = event.event.as_str();
        let data = event.data.as_str();
        let decoded = match name {
            "raw_image" => DashboardEvent::RawImage(data.to_string()),
            "annotated_image" => DashboardEvent::AnnotatedImage(data.to_string()),
            "timestamp" => DashboardEvent::Timestamp(parse_timestamp(name, data)?),
            "prompt" => decode_prompt(name, data)?,
            "llm_request_start" => DashboardEvent::ResponseStart {
                stream: LEGACY_STREAM.to_string(),
            },
            "llm_response_start" => DashboardEvent::ResponseReady {
                stream: LEGACY_STREAM.to_string(),
            },
            "pause_events" => DashboardEvent::PauseEvents,
            "resume_events" => DashboardEvent::ResumeEvents,
            "image" => decode_image(name, data)?,
            _ => decode_response_event(name, data, features)?,
        };
        Ok(decoded)
    }
}

fn malformed(event: &str, reason: impl ToString) -> VigilError {
    VigilError::MalformedEvent {
        event: event.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_timestamp(name: &str, data: &str) -> Result<i64> {
    let raw = data.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Ok(secs);
    }
    match raw.parse::<f64>() {
        Ok(secs) if secs.is_finite() => Ok(secs.trunc() as i64),
        _ => Err(malformed(name, format!("not a unix timestamp: {raw:?}"))),
    }
}

fn decode_prompt(name: &str, data: &str) -> Result<DashboardEvent> {
    let payload: PromptPayload = match serde_json::from_str(data) {
        Ok(payload) => payload,
        // Older backends send the prompt as bare text
        Err(_) if is_bare_text(data) => PromptPayload::Text(data.to_string()),
        Err(e) => return Err(malformed(name, e)),
    };
    let (id, text) = match payload {
        PromptPayload::Item { id, prompt } => (id, prompt),
        PromptPayload::Id(id) => (Some(id), None),
        PromptPayload::Text(text) => (None, Some(text)),
    };
    if id.is_none() && text.is_none() {
        return Err(malformed(name, "payload has neither id nor prompt"));
    }
    Ok(DashboardEvent::Prompt { id, text })
}

fn is_bare_text(data: &str) -> bool {
    let trimmed = data.trim_start();
    !trimmed.is_empty() && !trimmed.starts_with('{') && !trimmed.starts_with('"')
}

fn decode_image(name: &str, data: &str) -> Result<DashboardEvent> {
    let payload: ImagePayload = serde_json::from_str(data).map_err(|e| malformed(name, e))?;
    let threat_count = payload
        .threatcount
        .as_ref()
        .or(payload.leaks.as_ref())
        .and_then(value_as_i64);
    let frame = AcquisitionFrame {
        threat_count,
        dropped: payload.dropped.as_ref().and_then(value_as_i64),
        inference_ms: payload.inference.as_ref().and_then(value_as_f64),
    };
    Ok(DashboardEvent::Frame {
        image: payload.image.filter(|img| !img.is_empty()),
        frame,
    })
}

fn decode_response_event(name: &str, data: &str, features: &Features) -> Result<DashboardEvent> {
    if let Some(stream) = name.strip_suffix("_response_start") {
        if features.recognizes_stream(stream) {
            return Ok(DashboardEvent::ResponseStart {
                stream: stream.to_string(),
            });
        }
    } else if let Some(stream) = name.strip_suffix("_response_stop") {
        if features.recognizes_stream(stream) {
            return Ok(DashboardEvent::ResponseStop {
                stream: stream.to_string(),
            });
        }
    } else if let Some(stream) = name.strip_suffix("_response") {
        if features.recognizes_stream(stream) {
            let payload: ResponsePayload =
                serde_json::from_str(data).map_err(|e| malformed(name, e))?;
            let text = payload
                .response
                .ok_or_else(|| malformed(name, "missing response field"))?;
            return Ok(DashboardEvent::ResponseChunk {
                stream: stream.to_string(),
                text,
            });
        }
    }
    Ok(DashboardEvent::Unknown(name.to_string()))
}

// Numbers arrive either as JSON numbers or as numeric strings
fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
