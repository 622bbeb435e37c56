//! Completion notifications.
//!
//! Playing a sound or drawing a toast is the host's job; the engine only
//! hands over the payload.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::timer::Mode;

pub const NOTIFICATION_TITLE: &str = "Lapse";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub completed: Mode,
    pub upcoming: Mode,
}

impl Notification {
    pub fn session_completed(completed: Mode, upcoming: Mode) -> Self {
        let next = match upcoming {
            Mode::Focus => "focus",
            Mode::Break => "a break",
            Mode::LongBreak => "a long break",
        };
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            message: format!("{} session completed! Time for {next}.", completed.label()),
            completed,
            upcoming,
        }
    }
}

pub trait Notifier: Send {
    fn notify(&mut self, notification: &Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, notification: &Notification) {
        tracing::info!(
            completed = ?notification.completed,
            upcoming = ?notification.upcoming,
            "{}",
            notification.message
        );
    }
}

/// Keeps every notification. Clones share the list.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier(Arc<Mutex<Vec<Notification>>>);

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.0
            .lock()
            .map(|list| list.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, notification: &Notification) {
        let mut list = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        list.push(notification.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_completion_message() {
        let n = Notification::session_completed(Mode::Focus, Mode::Break);
        assert_eq!(n.title, "Lapse");
        assert_eq!(n.message, "Focus session completed! Time for a break.");
    }

    #[test]
    fn long_break_messages() {
        let n = Notification::session_completed(Mode::Focus, Mode::LongBreak);
        assert_eq!(n.message, "Focus session completed! Time for a long break.");
        let n = Notification::session_completed(Mode::LongBreak, Mode::Focus);
        assert_eq!(n.message, "Long Break session completed! Time for focus.");
    }

    #[test]
    fn recording_notifier_shares_list() {
        let recorder = RecordingNotifier::new();
        let mut handle = recorder.clone();
        handle.notify(&Notification::session_completed(Mode::Break, Mode::Focus));
        assert_eq!(recorder.sent().len(), 1);
    }
}
