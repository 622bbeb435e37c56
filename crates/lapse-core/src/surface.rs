//! Surface-side mirror of the timer.
//!
//! A surface (popup, floating sticker, `lapse timer watch`) polls the engine
//! every few seconds and counts down locally in between. The local count is
//! cosmetic; the next poll always replaces it.

use crate::settings::Settings;
use crate::timer::TimerState;

#[derive(Debug, Clone, Default)]
pub struct Mirror {
    state: Option<TimerState>,
    synced_at_ms: i64,
    settings: Settings,
}

impl Mirror {
    pub fn new(settings: Settings) -> Self {
        Self {
            state: None,
            synced_at_ms: 0,
            settings,
        }
    }

    /// Replace the snapshot with a fresh engine reply.
    pub fn sync(&mut self, state: Option<TimerState>, now_ms: i64) {
        self.state = state;
        self.synced_at_ms = now_ms;
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn state(&self) -> Option<&TimerState> {
        self.state.as_ref()
    }

    /// Seconds to show at `now_ms`, counted down from the last sync.
    pub fn display_remaining(&self, now_ms: i64) -> u64 {
        let Some(state) = &self.state else {
            return 0;
        };
        if !state.is_running || state.is_paused {
            return state.current_time;
        }
        let elapsed = now_ms.saturating_sub(self.synced_at_ms).max(0) / 1000;
        state.current_time.saturating_sub(elapsed as u64)
    }

    /// Fraction of the current mode already spent.
    pub fn progress(&self, now_ms: i64) -> f64 {
        let Some(state) = &self.state else {
            return 0.0;
        };
        let total = self.settings.duration_secs(state.mode);
        if total == 0 {
            return 0.0;
        }
        let remaining = self.display_remaining(now_ms).min(total);
        (1.0 - remaining as f64 / total as f64).clamp(0.0, 1.0)
    }

    pub fn sticker_visible(&self) -> bool {
        sticker_visible(self.state.as_ref(), &self.settings)
    }
}

/// Render seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// The floating indicator shows only for an active (running or paused)
/// session, and only when enabled.
pub fn sticker_visible(state: Option<&TimerState>, settings: &Settings) -> bool {
    match state {
        Some(state) => settings.sticker_enabled && (state.is_running || state.is_paused),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::Mode;

    const T0: i64 = 1_700_000_000_000;

    fn running(current_time: u64) -> TimerState {
        TimerState {
            is_running: true,
            current_time,
            start_time: Some(T0 - 5_000),
            ..TimerState::default()
        }
    }

    #[test]
    fn counts_down_from_last_sync() {
        let mut mirror = Mirror::new(Settings::default());
        mirror.sync(Some(running(1490)), T0);
        assert_eq!(mirror.display_remaining(T0), 1490);
        assert_eq!(mirror.display_remaining(T0 + 2_500), 1488);
        assert_eq!(mirror.display_remaining(T0 + 5_000_000), 0);
    }

    #[test]
    fn paused_state_does_not_tick() {
        let mut mirror = Mirror::new(Settings::default());
        let paused = TimerState {
            is_paused: true,
            current_time: 700,
            ..TimerState::default()
        };
        mirror.sync(Some(paused), T0);
        assert_eq!(mirror.display_remaining(T0 + 60_000), 700);
    }

    #[test]
    fn sync_replaces_local_countdown() {
        let mut mirror = Mirror::new(Settings::default());
        mirror.sync(Some(running(1490)), T0);
        mirror.sync(Some(running(1400)), T0 + 3_000);
        assert_eq!(mirror.display_remaining(T0 + 3_000), 1400);
    }

    #[test]
    fn progress_against_mode_duration() {
        let mut mirror = Mirror::new(Settings::default());
        assert_eq!(mirror.progress(T0), 0.0);

        mirror.sync(
            Some(TimerState {
                mode: Mode::Break,
                current_time: 150,
                ..TimerState::default()
            }),
            T0,
        );
        assert!((mirror.progress(T0) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(3600), "60:00");
    }

    #[test]
    fn sticker_hidden_when_idle_or_disabled() {
        let settings = Settings::default();
        assert!(!sticker_visible(None, &settings));
        assert!(!sticker_visible(Some(&TimerState::default()), &settings));
        assert!(sticker_visible(Some(&running(10)), &settings));

        let disabled = Settings {
            sticker_enabled: false,
            ..Settings::default()
        };
        assert!(!sticker_visible(Some(&running(10)), &disabled));
    }
}
