// Session driver
//
// Owns the synchronizer and serialises every mutation onto one task: stream
// messages, snapshot and command results, and user input all arrive here through
// channels. Network calls run in spawned tasks and report back.

use crate::commands::{CommandDispatcher, PromptSelector};
use crate::config::SyncConfig;
use crate::governor::GovernorVerdict;
use crate::ports::{AlarmSink, Notice, RenderPort};
use crate::snapshot::{Snapshot, SnapshotLoader};
use crate::state::PromptChoice;
use crate::stream::{StreamConnection, StreamMessage};
use crate::sync::Synchronizer;
use crate::{Result, VigilError};
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const COMMAND_CHANNEL_SIZE: usize = 32;

/// Input from the user side of the dashboard
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserCommand {
    SetPrompt(PromptSelector),
    ResumeEvents,
    RefreshPrompts,
    ShowAnnotated(bool),
    ArmAlarm(bool),
    Shutdown,
}

/// Results of background calls, applied on the session task
enum CallResult {
    Snapshot(Result<Snapshot>),
    PromptChoices(Result<Vec<PromptChoice>>),
    PromptSet {
        selector: PromptSelector,
        result: Result<String>,
    },
    Resumed(Result<()>),
}

/// Cloneable sender side of a running session
#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: mpsc::Sender<UserCommand>,
}

impl SessionHandle {
    pub async fn send(&self, command: UserCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| VigilError::Stream("session has shut down".into()))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(UserCommand::Shutdown).await
    }
}

pub struct Session<R, A> {
    config: SyncConfig,
    sync: Synchronizer<R, A>,
    commands: CommandDispatcher,
    snapshots: SnapshotLoader,
    stream_client: Client,
    user_rx: mpsc::Receiver<UserCommand>,
}

impl<R, A> Session<R, A>
where
    R: RenderPort + Send + 'static,
    A: AlarmSink + Send + 'static,
{
    pub fn new(config: SyncConfig, renderer: R, alarm: A) -> Result<(Self, SessionHandle)> {
        config.validate()?;
        let http = config.http_client()?;
        let stream_client = config.stream_client()?;
        let (tx, user_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let session = Self {
            sync: Synchronizer::new(&config, renderer, alarm),
            commands: CommandDispatcher::new(http.clone(), &config),
            snapshots: SnapshotLoader::new(http, &config),
            stream_client,
            user_rx,
            config,
        };
        Ok((session, SessionHandle { tx }))
    }

    /// Run until Shutdown or until every handle is dropped; hands back the synchronizer
    /// so the caller can inspect the final view.
    pub async fn run(mut self) -> Synchronizer<R, A> {
        let (done_tx, mut done_rx) = mpsc::channel::<CallResult>(COMMAND_CHANNEL_SIZE);

        // The snapshot loads independently of the stream; neither waits for the other
        let loader = self.snapshots.clone();
        let tx = done_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(CallResult::Snapshot(loader.fetch().await)).await;
        });
        self.spawn_prompt_refresh(&done_tx);

        let mut stream = Some(StreamConnection::open(
            self.stream_client.clone(),
            self.config.sse_url(),
            self.config.retry_delay(),
        ));

        loop {
            tokio::select! {
                message = next_stream_message(&mut stream) => match message {
                    Some(StreamMessage::Opened) => self.sync.stream_opened(),
                    Some(StreamMessage::Event(event)) => self.sync.handle_event(&event),
                    Some(StreamMessage::Error(err)) => {
                        if self.sync.handle_stream_error(&err) != GovernorVerdict::Continue {
                            if let Some(mut conn) = stream.take() {
                                conn.close();
                            }
                        }
                    }
                    None => {
                        warn!(target: "stream", "Event stream reader stopped");
                        stream = None;
                    }
                },
                Some(result) = done_rx.recv() => self.apply_call_result(result),
                command = self.user_rx.recv() => match command {
                    None | Some(UserCommand::Shutdown) => break,
                    Some(command) => self.dispatch(command, &done_tx),
                },
            }
        }

        if let Some(mut conn) = stream.take() {
            conn.close();
        }
        info!(target: "sync", stats = ?self.sync.stats(), "Session ended");
        self.sync
    }

    fn dispatch(&mut self, command: UserCommand, done_tx: &mpsc::Sender<CallResult>) {
        debug!(target: "sync", ?command, "User command");
        match command {
            UserCommand::SetPrompt(selector) => {
                let commands = self.commands.clone();
                let tx = done_tx.clone();
                tokio::spawn(async move {
                    let result = commands.set_prompt(&selector).await;
                    let _ = tx.send(CallResult::PromptSet { selector, result }).await;
                });
            }
            UserCommand::ResumeEvents => {
                let commands = self.commands.clone();
                let tx = done_tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(CallResult::Resumed(commands.resume_events().await)).await;
                });
            }
            UserCommand::RefreshPrompts => self.spawn_prompt_refresh(done_tx),
            UserCommand::ShowAnnotated(show) => self.sync.set_show_annotated(show),
            UserCommand::ArmAlarm(armed) => self.sync.set_alarm_armed(armed),
            UserCommand::Shutdown => {}
        }
    }

    fn spawn_prompt_refresh(&self, done_tx: &mpsc::Sender<CallResult>) {
        let commands = self.commands.clone();
        let tx = done_tx.clone();
        tokio::spawn(async move {
            let result = commands.load_prompt_choices().await;
            let _ = tx.send(CallResult::PromptChoices(result)).await;
        });
    }

    fn apply_call_result(&mut self, result: CallResult) {
        match result {
            CallResult::Snapshot(Ok(snapshot)) => self.sync.apply_snapshot(&snapshot),
            CallResult::Snapshot(Err(err)) => self.sync.snapshot_failed(&err),
            CallResult::PromptChoices(Ok(choices)) => {
                debug!(target: "commands", count = choices.len(), "Loaded prompt choices");
                self.sync.set_prompt_choices(choices);
            }
            CallResult::PromptChoices(Err(err)) => {
                warn!(target: "commands", %err, "Could not load prompt choices");
                self.sync
                    .notify(Notice::error("Could not load prompts", err.detail()));
            }
            CallResult::PromptSet {
                selector,
                result: Ok(_),
            } => {
                let label = self.prompt_label(&selector);
                self.sync
                    .notify(Notice::success(format!("Prompt changed to {label}")));
            }
            CallResult::PromptSet {
                selector,
                result: Err(err),
            } => {
                warn!(target: "commands", ?selector, %err, "Prompt change failed");
                self.sync.notify(Notice::error("Error occurred!", err.detail()));
            }
            CallResult::Resumed(Ok(())) => {
                debug!(target: "commands", "Resume requested; waiting for resume_events");
            }
            CallResult::Resumed(Err(err @ VigilError::Config(_))) => {
                self.sync
                    .notify(Notice::error("Cannot resume events", err.detail()));
            }
            CallResult::Resumed(Err(err)) => {
                warn!(target: "commands", %err, "Resume request failed");
            }
        }
    }

    fn prompt_label(&self, selector: &PromptSelector) -> String {
        match selector {
            PromptSelector::Text(text) => text.clone(),
            PromptSelector::Id(id) => self
                .sync
                .state()
                .prompt_choices
                .iter()
                .find(|c| c.id == Some(*id))
                .map(|c| c.text.clone())
                .unwrap_or_else(|| format!("#{id}")),
        }
    }
}

async fn next_stream_message(stream: &mut Option<StreamConnection>) -> Option<StreamMessage> {
    match stream {
        Some(conn) => conn.next().await,
        None => std::future::pending().await,
    }
}
