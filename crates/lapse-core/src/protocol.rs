//! Command protocol between surfaces and the timer engine.
//!
//! Requests are JSON objects tagged by `action`:
//!
//! ```text
//! {"action":"start","currentTime":1500,"state":{...}}   -> {"success":true}
//! {"action":"pause","state":{...}}                      -> {"success":true}
//! {"action":"reset","state":{...}}                      -> {"success":true}
//! {"action":"getState"}                                 -> TimerState | null
//! {"action":"settingsUpdated","settings":{...}}         -> (no reply)
//! ```
//!
//! The older `startTimer`/`pauseTimer`/`resetTimer` names are accepted.

use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::timer::{TimerState, TimerStatePatch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    #[serde(alias = "startTimer", rename_all = "camelCase")]
    Start {
        /// Seconds until the wake should fire. Falls back to the state's
        /// `currentTime` when absent.
        #[serde(default)]
        current_time: Option<u64>,
        #[serde(default)]
        state: TimerStatePatch,
    },
    #[serde(alias = "pauseTimer")]
    Pause {
        #[serde(default)]
        state: TimerStatePatch,
    },
    #[serde(alias = "resetTimer")]
    Reset {
        #[serde(default)]
        state: TimerStatePatch,
    },
    GetState,
    SettingsUpdated { settings: Settings },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Start { .. } => "start",
            Request::Pause { .. } => "pause",
            Request::Reset { .. } => "reset",
            Request::GetState => "getState",
            Request::SettingsUpdated { .. } => "settingsUpdated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Ack { success: bool },
    State(Option<TimerState>),
    /// Fire-and-forget commands produce no reply.
    None,
}

impl Response {
    pub fn ok() -> Self {
        Response::Ack { success: true }
    }

    /// Whether a reply should be written back at all.
    pub fn is_silent(&self) -> bool {
        matches!(self, Response::None)
    }
}
