//! User settings record.
//!
//! Lives in the sync partition of the store, separate from the timer record.
//! Settings shape durations and the cycle length but never hold timer
//! progress.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::timer::Mode;

pub const FOCUS_MINUTES_RANGE: (u32, u32) = (1, 60);
pub const BREAK_MINUTES_RANGE: (u32, u32) = (1, 30);
pub const LONG_BREAK_MINUTES_RANGE: (u32, u32) = (1, 60);
pub const TOTAL_SESSIONS_RANGE: (u32, u32) = (2, 10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    #[serde(default = "default_total_sessions")]
    pub total_sessions: u32,
    #[serde(default)]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub auto_start_next: bool,
    #[serde(default = "default_true")]
    pub reset_on_complete: bool,
    #[serde(default)]
    pub dark_mode: bool,
    /// Floating indicator visibility.
    #[serde(default = "default_true")]
    pub sticker_enabled: bool,
}

fn default_focus_minutes() -> u32 {
    25
}
fn default_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_total_sessions() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            break_minutes: default_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            total_sessions: default_total_sessions(),
            notifications_enabled: false,
            auto_start_next: false,
            reset_on_complete: true,
            dark_mode: false,
            sticker_enabled: true,
        }
    }
}

impl Settings {
    pub fn focus_secs(&self) -> u64 {
        u64::from(self.focus_minutes) * 60
    }

    pub fn break_secs(&self) -> u64 {
        u64::from(self.break_minutes) * 60
    }

    pub fn long_break_secs(&self) -> u64 {
        u64::from(self.long_break_minutes) * 60
    }

    /// Full length of a session in `mode`.
    pub fn duration_secs(&self, mode: Mode) -> u64 {
        match mode {
            Mode::Focus => self.focus_secs(),
            Mode::Break => self.break_secs(),
            Mode::LongBreak => self.long_break_secs(),
        }
    }

    /// Check every numeric field against its allowed range.
    ///
    /// # Errors
    /// Returns the first field found out of range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check("focusMinutes", self.focus_minutes, FOCUS_MINUTES_RANGE)?;
        check("breakMinutes", self.break_minutes, BREAK_MINUTES_RANGE)?;
        check(
            "longBreakMinutes",
            self.long_break_minutes,
            LONG_BREAK_MINUTES_RANGE,
        )?;
        check("totalSessions", self.total_sessions, TOTAL_SESSIONS_RANGE)?;
        Ok(())
    }
}

fn check(field: &'static str, value: u32, (min, max): (u32, u32)) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}
