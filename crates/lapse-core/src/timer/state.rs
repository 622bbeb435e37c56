//! The persisted timer record.
//!
//! There is exactly one `TimerState` per installation. While running, the
//! stored `current_time` is a snapshot taken at `start_time`; the true
//! remaining time is always derived from the wall clock, never counted down
//! in storage.

use serde::{Deserialize, Serialize};

use crate::settings::Settings;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    Focus,
    Break,
    LongBreak,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Focus => "Focus",
            Mode::Break => "Break",
            Mode::LongBreak => "Long Break",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerState {
    pub is_running: bool,
    pub is_paused: bool,
    /// Remaining seconds when stopped; the snapshot at `start_time` when running.
    pub current_time: u64,
    /// Epoch milliseconds of the last transition into running.
    pub start_time: Option<i64>,
    pub session_number: u32,
    pub mode: Mode,
    /// Bumped on every engine write. Lets the engine spot stale payloads.
    pub revision: u64,
}

impl TimerState {
    /// Stopped, focus mode, session 1, full focus duration.
    pub fn initial(settings: &Settings) -> Self {
        Self {
            is_running: false,
            is_paused: false,
            current_time: settings.focus_secs(),
            start_time: None,
            session_number: 1,
            mode: Mode::Focus,
            revision: 0,
        }
    }

    /// True when the wall clock is eating into `current_time`.
    pub fn is_counting(&self) -> bool {
        self.is_running && !self.is_paused && self.start_time.is_some()
    }

    /// Remaining seconds at `now_ms`.
    ///
    /// `max(0, current_time - floor((now - start_time) / 1000))` while
    /// counting, `current_time` otherwise. A clock reading earlier than
    /// `start_time` counts as zero elapsed.
    pub fn remaining_at(&self, now_ms: i64) -> u64 {
        match self.start_time {
            Some(start) if self.is_running && !self.is_paused => {
                let elapsed_secs = (now_ms.saturating_sub(start)).max(0) / 1000;
                self.current_time.saturating_sub(elapsed_secs as u64)
            }
            _ => self.current_time,
        }
    }

    /// Copy with `current_time` replaced by the derived remaining time.
    pub fn derived_at(&self, now_ms: i64) -> Self {
        Self {
            current_time: self.remaining_at(now_ms),
            ..self.clone()
        }
    }

    /// Repair combinations that must never be persisted.
    ///
    /// Running-and-paused, or running without a start time, collapse to
    /// paused at the stored `current_time`. A start time on a stopped timer
    /// is dropped. Session numbers below 1 become 1.
    pub fn normalized(mut self) -> Self {
        if self.is_running && (self.is_paused || self.start_time.is_none()) {
            self.is_running = false;
            self.is_paused = true;
        }
        if !self.is_running {
            self.start_time = None;
        }
        if self.session_number == 0 {
            self.session_number = 1;
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        !(self.is_running && self.is_paused) && self.start_time.is_some() == self.is_running
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::initial(&Settings::default())
    }
}

/// Fields a surface may supply with a command.
///
/// Everything is optional; absent fields keep the engine's value. Running
/// flags and `startTime` are accepted on the wire but always decided by the
/// engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerStatePatch {
    pub current_time: Option<u64>,
    pub session_number: Option<u32>,
    pub mode: Option<Mode>,
    pub revision: Option<u64>,
    pub is_running: Option<bool>,
    pub is_paused: Option<bool>,
    pub start_time: Option<i64>,
}

impl TimerStatePatch {
    /// Overlay the session fields of this patch on `base`.
    pub fn apply_to(&self, base: &TimerState) -> TimerState {
        let mut next = base.clone();
        if let Some(secs) = self.current_time {
            next.current_time = secs;
        }
        if let Some(n) = self.session_number {
            next.session_number = n.max(1);
        }
        if let Some(mode) = self.mode {
            next.mode = mode;
        }
        next
    }

    /// A payload is stale when it was built from an older revision than the
    /// one on record. Payloads without a revision are trusted.
    pub fn is_stale_against(&self, stored: &TimerState) -> bool {
        matches!(self.revision, Some(rev) if rev < stored.revision)
    }
}

impl From<&TimerState> for TimerStatePatch {
    fn from(state: &TimerState) -> Self {
        Self {
            current_time: Some(state.current_time),
            session_number: Some(state.session_number),
            mode: Some(state.mode),
            revision: Some(state.revision),
            is_running: Some(state.is_running),
            is_paused: Some(state.is_paused),
            start_time: state.start_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn running(current_time: u64, start_time: i64) -> TimerState {
        TimerState {
            is_running: true,
            is_paused: false,
            current_time,
            start_time: Some(start_time),
            ..TimerState::default()
        }
    }

    #[test]
    fn default_is_stopped_focus_session_one() {
        let state = TimerState::default();
        assert!(!state.is_running);
        assert!(!state.is_paused);
        assert_eq!(state.current_time, 25 * 60);
        assert_eq!(state.session_number, 1);
        assert_eq!(state.mode, Mode::Focus);
        assert_eq!(state.start_time, None);
    }

    #[test]
    fn serializes_with_camel_case_and_kebab_mode() {
        let state = TimerState {
            mode: Mode::LongBreak,
            ..TimerState::default()
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["mode"], "long-break");
        assert_eq!(json["isRunning"], false);
        assert_eq!(json["currentTime"], 1500);
        assert!(json["startTime"].is_null());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let state: TimerState =
            serde_json::from_str(r#"{"isRunning":false,"mode":"break","currentTime":300}"#)
                .unwrap();
        assert_eq!(state.mode, Mode::Break);
        assert_eq!(state.current_time, 300);
        assert_eq!(state.session_number, 1);
    }

    #[test]
    fn remaining_floors_partial_seconds() {
        let state = running(100, 0);
        assert_eq!(state.remaining_at(30_999), 70);
        assert_eq!(state.remaining_at(31_000), 69);
    }

    #[test]
    fn remaining_never_negative() {
        let state = running(10, 0);
        assert_eq!(state.remaining_at(20_000), 0);
    }

    #[test]
    fn remaining_ignores_clock_behind_start() {
        let state = running(50, 10_000);
        assert_eq!(state.remaining_at(0), 50);
    }

    #[test]
    fn paused_state_reports_stored_time() {
        let state = TimerState {
            is_paused: true,
            current_time: 42,
            ..TimerState::default()
        };
        assert_eq!(state.remaining_at(i64::MAX), 42);
    }

    #[test]
    fn normalized_repairs_running_and_paused() {
        let state = TimerState {
            is_running: true,
            is_paused: true,
            start_time: Some(5),
            current_time: 90,
            ..TimerState::default()
        }
        .normalized();
        assert!(state.is_valid());
        assert!(state.is_paused);
        assert!(!state.is_running);
        assert_eq!(state.start_time, None);
        assert_eq!(state.current_time, 90);
    }

    #[test]
    fn normalized_repairs_running_without_start() {
        let state = TimerState {
            is_running: true,
            ..TimerState::default()
        }
        .normalized();
        assert!(state.is_valid());
        assert!(state.is_paused);
    }

    #[test]
    fn patch_overlays_only_present_fields() {
        let base = TimerState::default();
        let patch = TimerStatePatch {
            mode: Some(Mode::Break),
            ..TimerStatePatch::default()
        };
        let next = patch.apply_to(&base);
        assert_eq!(next.mode, Mode::Break);
        assert_eq!(next.current_time, base.current_time);
        assert_eq!(next.session_number, base.session_number);
    }

    #[test]
    fn patch_without_revision_is_never_stale() {
        let stored = TimerState {
            revision: 9,
            ..TimerState::default()
        };
        assert!(!TimerStatePatch::default().is_stale_against(&stored));
        let old = TimerStatePatch {
            revision: Some(3),
            ..TimerStatePatch::default()
        };
        assert!(old.is_stale_against(&stored));
    }

    proptest! {
        #[test]
        fn remaining_matches_formula(
            current in 0u64..100_000,
            start in 0i64..1_000_000_000,
            offset in 0i64..200_000_000,
        ) {
            let state = running(current, start);
            let now = start + offset;
            let expected = (current as i64 - offset / 1000).max(0) as u64;
            prop_assert_eq!(state.remaining_at(now), expected);
        }

        #[test]
        fn remaining_is_non_increasing(
            current in 0u64..100_000,
            start in 0i64..1_000_000,
            a in 0i64..10_000_000,
            b in 0i64..10_000_000,
        ) {
            let state = running(current, start);
            let (early, late) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(state.remaining_at(start + late) <= state.remaining_at(start + early));
        }
    }
}
