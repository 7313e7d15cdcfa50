// Snapshot loader
//
// One GET of /api/currentstate when the session starts. Every field is optional and a
// missing, null or empty field never overwrites what the view already holds.

use crate::config::{SyncConfig, IMAGE_ANALYSIS_STREAM, THREAT_ANALYSIS_STREAM};
use crate::state::ViewState;
use crate::{Result, VigilError};
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::debug;

/// Full-state response; every field optional
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Snapshot {
    pub raw_image: Option<String>,
    pub annotated_image: Option<String>,
    /// 0 means "no alert yet"
    pub timestamp: Option<i64>,
    pub prompt: Option<PromptField>,
    pub image_analysis: Option<String>,
    pub threat_analysis: Option<String>,
    pub events_paused: Option<bool>,
}

/// The `prompt` field changed shape between backend revisions
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PromptField {
    Item {
        id: Option<i64>,
        prompt: Option<String>,
    },
    Id(i64),
    /// Plain prompt text, or an `{id, prompt}` object encoded as a string
    Text(String),
}

#[derive(Deserialize)]
struct EncodedPrompt {
    id: Option<i64>,
    prompt: Option<String>,
}

impl PromptField {
    /// Resolve to (id, text)
    pub fn resolve(&self) -> (Option<i64>, Option<String>) {
        match self {
            PromptField::Item { id, prompt } => (*id, prompt.clone()),
            PromptField::Id(id) => (Some(*id), None),
            PromptField::Text(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return (None, None);
                }
                if trimmed.starts_with('{') {
                    if let Ok(encoded) = serde_json::from_str::<EncodedPrompt>(trimmed) {
                        return (encoded.id, encoded.prompt.filter(|p| !p.is_empty()));
                    }
                }
                (None, Some(raw.clone()))
            }
        }
    }
}

impl Snapshot {
    /// Partial merge into the view. Applying the same snapshot twice is a no-op the second time.
    pub fn merge_into(&self, state: &mut ViewState) {
        if let Some(image) = non_empty(&self.raw_image) {
            state.raw_image = Some(image.to_string());
            state.loaded = true;
        }
        if let Some(image) = non_empty(&self.annotated_image) {
            state.annotated_image = Some(image.to_string());
            state.loaded = true;
        }
        if let Some(ts) = self.timestamp.filter(|ts| *ts > 0) {
            state.timestamp = Some(ts);
        }
        if let Some(prompt) = &self.prompt {
            let (id, text) = prompt.resolve();
            if id.is_some() {
                state.prompt_id = id;
            }
            if text.is_some() {
                state.prompt_text = text;
            }
        }
        if let Some(text) = &self.image_analysis {
            state
                .streamed_text
                .insert(IMAGE_ANALYSIS_STREAM.to_string(), text.clone());
        }
        if let Some(text) = &self.threat_analysis {
            state
                .streamed_text
                .insert(THREAT_ANALYSIS_STREAM.to_string(), text.clone());
        }
        if let Some(paused) = self.events_paused {
            state.events_paused = paused;
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct SnapshotLoader {
    http: Client,
    url: String,
}

impl SnapshotLoader {
    pub fn new(http: Client, config: &SyncConfig) -> Self {
        Self {
            http,
            url: config.snapshot_url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Result<Snapshot> {
        debug!(target: "snapshot", url = %self.url, "GET current state");
        let resp = self
            .http
            .get(&self.url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VigilError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        // The backend answers `null` before the first alert
        let snapshot: Option<Snapshot> = serde_json::from_str(&body)?;
        Ok(snapshot.unwrap_or_default())
    }
}
