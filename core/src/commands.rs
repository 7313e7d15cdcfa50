// Command dispatcher
//
// Outgoing REST calls. Their effect on the view arrives later through the event
// stream; nothing here touches ViewState.

use crate::config::SyncConfig;
use crate::state::PromptChoice;
use crate::{Result, VigilError};
use reqwest::{header, Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

/// How a prompt is identified when selecting it
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptSelector {
    Id(i64),
    /// Backends that predate prompt ids take the prompt text itself
    Text(String),
}

impl PromptSelector {
    pub fn body(&self) -> serde_json::Value {
        match self {
            PromptSelector::Id(id) => json!({ "id": id }),
            PromptSelector::Text(text) => json!({ "prompt": text }),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PromptListEntry {
    Item { id: Option<i64>, prompt: String },
    Text(String),
}

impl From<PromptListEntry> for PromptChoice {
    fn from(entry: PromptListEntry) -> Self {
        match entry {
            PromptListEntry::Item { id, prompt } => PromptChoice { id, text: prompt },
            PromptListEntry::Text(text) => PromptChoice { id: None, text },
        }
    }
}

#[derive(Clone)]
pub struct CommandDispatcher {
    http: Client,
    prompt_url: String,
    resume_url: String,
    pause_resume: bool,
}

impl CommandDispatcher {
    pub fn new(http: Client, config: &SyncConfig) -> Self {
        Self {
            http,
            prompt_url: config.prompt_url(),
            resume_url: config.resume_url(),
            pause_resume: config.features.pause_resume,
        }
    }

    /// POST the selected prompt. Ok carries the server's confirmation text.
    pub async fn set_prompt(&self, selector: &PromptSelector) -> Result<String> {
        debug!(target: "commands", url = %self.prompt_url, ?selector, "POST prompt");
        let resp = self
            .http
            .post(&self.prompt_url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&selector.body())
            .send()
            .await?;
        let body = success_body(resp).await?;
        info!(target: "commands", ?selector, response = %body.trim(), "Prompt changed");
        Ok(body)
    }

    /// Ask the backend to resume alert processing; the response body is not inspected.
    pub async fn resume_events(&self) -> Result<()> {
        if !self.pause_resume {
            return Err(VigilError::Config(
                "pause/resume is disabled for this dashboard".into(),
            ));
        }
        debug!(target: "commands", url = %self.resume_url, "GET resume events");
        let resp = self.http.get(&self.resume_url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(VigilError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Fetch the prompt drop-down entries
    pub async fn load_prompt_choices(&self) -> Result<Vec<PromptChoice>> {
        debug!(target: "commands", url = %self.prompt_url, "GET prompt choices");
        let resp = self
            .http
            .get(&self.prompt_url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let body = success_body(resp).await?;
        let entries: Option<Vec<PromptListEntry>> = serde_json::from_str(&body)?;
        Ok(entries
            .unwrap_or_default()
            .into_iter()
            .map(PromptChoice::from)
            .collect())
    }
}

async fn success_body(resp: Response) -> Result<String> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.text().await?);
    }
    Err(VigilError::Status {
        status: status.as_u16(),
        body: resp.text().await.unwrap_or_default(),
    })
}
