// Ports between the synchronizer and its presentation
//
// The core never touches a terminal, window or speaker directly.

use crate::state::ViewState;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient, dismissable message (the web dashboard's toast)
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub detail: Option<String>,
}

impl Notice {
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            detail: None,
        }
    }

    pub fn error(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            detail: Some(detail.into()),
        }
    }
}

/// Rendering collaborator
pub trait RenderPort {
    /// Called after every change to the view state
    fn render(&mut self, state: &ViewState);

    fn notice(&mut self, notice: Notice);

    /// Blocking, terminal alert; no further stream updates follow it
    fn terminal_alert(&mut self, message: &str);
}

/// Fire-and-forget alarm sound
pub trait AlarmSink {
    fn play(&mut self);
}

/// Alarm that only logs; used when no audio output is configured
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentAlarm;

impl AlarmSink for SilentAlarm {
    fn play(&mut self) {
        tracing::info!(target: "alarm", "Alarm triggered (silent)");
    }
}

impl<T: RenderPort + ?Sized> RenderPort for Box<T> {
    fn render(&mut self, state: &ViewState) {
        (**self).render(state)
    }

    fn notice(&mut self, notice: Notice) {
        (**self).notice(notice)
    }

    fn terminal_alert(&mut self, message: &str) {
        (**self).terminal_alert(message)
    }
}

impl<T: AlarmSink + ?Sized> AlarmSink for Box<T> {
    fn play(&mut self) {
        (**self).play()
    }
}
