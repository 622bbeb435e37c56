//! Session-completion transition.
//!
//! ```text
//! focus(n) -> break(n+1)        when n+1 <= total_sessions
//! focus(n) -> long-break(1)     otherwise
//! break(n) -> focus(n)
//! long-break(n) -> focus(n)
//! ```
//!
//! The transition always lands stopped at the full duration of the next
//! mode. This function is pure; the engine decides when it may run.

use super::state::{Mode, TimerState};
use crate::settings::Settings;

/// Outcome of one completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub completed: Mode,
    pub next: TimerState,
}

pub fn next_session(state: &TimerState, settings: &Settings) -> Transition {
    let mut next = state.clone();

    match state.mode {
        Mode::Focus => {
            next.session_number = state.session_number.saturating_add(1);
            if next.session_number <= settings.total_sessions {
                next.mode = Mode::Break;
            } else {
                next.mode = Mode::LongBreak;
                next.session_number = 1;
            }
        }
        Mode::Break | Mode::LongBreak => {
            next.mode = Mode::Focus;
        }
    }

    next.current_time = settings.duration_secs(next.mode);
    next.is_running = false;
    next.is_paused = false;
    next.start_time = None;

    Transition {
        completed: state.mode,
        next,
    }
}
