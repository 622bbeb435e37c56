//! Timer engine implementation.
//!
//! The engine owns the canonical timer record. It keeps no live counter:
//! every read derives the remaining time from the wall clock and the
//! snapshot stored at the last start, so the process hosting the engine can
//! be suspended or killed at any point without losing progress.
//!
//! ## State Transitions
//!
//! ```text
//! Stopped -> Running -> Paused -> Running -> ... -> (complete) -> Stopped
//!               \-> Stopped (reset)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(store, wake);
//! engine.recover();
//! engine.handle(Request::GetState);
//! // when the wake scheduler delivers:
//! engine.on_wake_fired(fired);
//! ```
//!
//! No public operation returns an error. Store and scheduler failures are
//! logged and the operation degrades to a no-op, leaving the last persisted
//! state in place.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::state::{TimerState, TimerStatePatch};
use super::transition::{next_session, Transition};
use crate::notify::{LogNotifier, Notification, Notifier};
use crate::protocol::{Request, Response};
use crate::settings::Settings;
use crate::storage::records;
use crate::storage::{StateStore, StoreChange};
use crate::wake::{round_up, WakeFired, WakeScheduler};

/// What the launch-time reconciliation found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RecoveryOutcome {
    /// No record existed; the default one was written.
    Initialized,
    /// A running session was re-stamped and its wake re-armed.
    #[serde(rename_all = "camelCase")]
    Resumed { remaining_secs: u64 },
    /// A running session ran out while nothing was watching.
    CompletedWhileAway,
    /// The record was stopped or paused and left as is.
    Untouched,
    /// The store could not be read; recovery will be retried.
    Deferred,
}

pub struct TimerEngine {
    store: Arc<dyn StateStore>,
    wake: Box<dyn WakeScheduler>,
    notifier: Box<dyn Notifier>,
    clock: Arc<dyn Clock>,
    granularity: Duration,
    settings: Settings,
    recovered: bool,
}

impl TimerEngine {
    pub fn new(store: Arc<dyn StateStore>, wake: impl WakeScheduler + 'static) -> Self {
        Self {
            store,
            wake: Box::new(wake),
            notifier: Box::new(LogNotifier),
            clock: Arc::new(SystemClock),
            granularity: Duration::from_secs(1),
            settings: Settings::default(),
            recovered: false,
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Round wake delays up to this step.
    pub fn with_granularity(mut self, granularity: Duration) -> Self {
        self.granularity = granularity;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    /// Change notifications for every record written through the store.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.store.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Dispatch one surface command.
    pub fn handle(&mut self, request: Request) -> Response {
        debug!(action = request.name(), "handling request");
        match request {
            Request::Start {
                current_time,
                state,
            } => {
                self.start(current_time, &state);
                Response::ok()
            }
            Request::Pause { .. } => {
                self.pause();
                Response::ok()
            }
            Request::Reset { state } => {
                self.reset(&state);
                Response::ok()
            }
            Request::GetState => Response::State(self.get_state()),
            Request::SettingsUpdated { settings } => {
                self.update_settings(settings);
                Response::None
            }
        }
    }

    /// Reconcile the stored record with the wall clock.
    ///
    /// Runs once per engine before the first command. A running record is
    /// re-stamped to now with its derived remaining time and the wake is
    /// re-armed; one that ran out while the process was gone completes.
    pub fn recover(&mut self) -> RecoveryOutcome {
        self.refresh_settings();

        let stored = match records::load_timer_state(self.store.as_ref()) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "timer state unavailable, recovery deferred");
                return RecoveryOutcome::Deferred;
            }
        };
        self.recovered = true;

        let Some(state) = stored else {
            let initial = TimerState::initial(&self.settings);
            if !self.save(&initial) {
                self.recovered = false;
                return RecoveryOutcome::Deferred;
            }
            info!("initial timer state created");
            return RecoveryOutcome::Initialized;
        };

        if !state.is_counting() {
            debug!(mode = ?state.mode, paused = state.is_paused, "timer not running");
            return RecoveryOutcome::Untouched;
        }

        let now = self.clock.now_ms();
        let remaining = state.remaining_at(now);
        if remaining == 0 {
            info!(mode = ?state.mode, "session finished while engine was down");
            self.complete_session();
            return RecoveryOutcome::CompletedWhileAway;
        }

        let resumed = TimerState {
            current_time: remaining,
            start_time: Some(now),
            revision: state.revision + 1,
            ..state
        };
        if self.save(&resumed) {
            self.arm(remaining);
        }
        info!(remaining_secs = remaining, "running timer resumed");
        RecoveryOutcome::Resumed {
            remaining_secs: remaining,
        }
    }

    /// Start (or re-stamp) the current session.
    ///
    /// `patch` overlays the caller's view of the session; `wake_secs` is how
    /// far out to arm the wake and defaults to the resulting `currentTime`.
    pub fn start(&mut self, wake_secs: Option<u64>, patch: &TimerStatePatch) {
        self.ensure_recovered();
        self.refresh_settings();
        let now = self.clock.now_ms();
        let Some(base) = self.load_or_initial() else {
            return;
        };
        let base = base.derived_at(now);

        let stale = patch.is_stale_against(&base);
        let mut next = if stale {
            warn!(
                payload_revision = patch.revision,
                stored_revision = base.revision,
                "ignoring stale session fields in start"
            );
            base.clone()
        } else {
            patch.apply_to(&base)
        };
        next.is_running = true;
        next.is_paused = false;
        next.start_time = Some(now);
        next.revision = base.revision + 1;

        if !self.save(&next) {
            return;
        }
        let wake_secs = if stale {
            next.current_time
        } else {
            wake_secs.unwrap_or(next.current_time)
        };
        self.arm(wake_secs);
        info!(
            mode = ?next.mode,
            session = next.session_number,
            remaining_secs = next.current_time,
            "timer started"
        );
    }

    /// Freeze the session at its derived remaining time.
    pub fn pause(&mut self) {
        self.ensure_recovered();
        if let Err(e) = self.wake.cancel() {
            warn!(error = %e, "failed to cancel wake");
        }
        let state = match records::load_timer_state(self.store.as_ref()) {
            Ok(Some(state)) => state,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "pause skipped, store unavailable");
                return;
            }
        };

        let remaining = state.remaining_at(self.clock.now_ms());
        let paused = TimerState {
            current_time: remaining,
            is_running: false,
            is_paused: true,
            start_time: None,
            revision: state.revision + 1,
            ..state
        };
        if self.save(&paused) {
            info!(remaining_secs = remaining, "timer paused");
        }
    }

    /// Stop and reinitialize from the caller's payload.
    ///
    /// The supplied `currentTime` is taken as is; elapsed time is not
    /// subtracted. Without one, the full duration of the resulting mode is
    /// used.
    pub fn reset(&mut self, patch: &TimerStatePatch) {
        self.ensure_recovered();
        self.refresh_settings();
        if let Err(e) = self.wake.cancel() {
            warn!(error = %e, "failed to cancel wake");
        }
        let Some(base) = self.load_or_initial() else {
            return;
        };

        let mut next = if patch.is_stale_against(&base) {
            warn!(
                payload_revision = patch.revision,
                stored_revision = base.revision,
                "ignoring stale session fields in reset"
            );
            TimerState {
                current_time: self.settings.duration_secs(base.mode),
                ..base.clone()
            }
        } else {
            let mut next = patch.apply_to(&base);
            if patch.current_time.is_none() {
                next.current_time = self.settings.duration_secs(next.mode);
            }
            next
        };
        next.is_running = false;
        next.is_paused = false;
        next.start_time = None;
        next.revision = base.revision + 1;

        if self.save(&next) {
            info!(mode = ?next.mode, remaining_secs = next.current_time, "timer reset");
        }
    }

    /// Current record with `currentTime` derived from the wall clock.
    ///
    /// A running session that has reached zero is completed before
    /// returning, so pollers never see a stuck "0 seconds, running" record.
    pub fn get_state(&mut self) -> Option<TimerState> {
        self.ensure_recovered();
        let state = match records::load_timer_state(self.store.as_ref()) {
            Ok(state) => state?,
            Err(e) => {
                warn!(error = %e, "state unavailable");
                return None;
            }
        };

        let now = self.clock.now_ms();
        let derived = state.derived_at(now);
        if derived.current_time == 0 && state.is_running && !state.is_paused {
            self.complete_session();
            return match records::load_timer_state(self.store.as_ref()) {
                Ok(Some(after)) => Some(after.derived_at(self.clock.now_ms())),
                Ok(None) => None,
                Err(e) => {
                    warn!(error = %e, "state unavailable after completion");
                    Some(derived)
                }
            };
        }
        Some(derived)
    }

    /// The armed wake elapsed. Completes the running session regardless of
    /// the derived remaining time.
    pub fn on_wake(&mut self) {
        self.ensure_recovered();
        info!("wake fired");
        self.complete_session();
    }

    /// Like [`TimerEngine::on_wake`], but drops deliveries superseded by a
    /// later arm or cancel.
    pub fn on_wake_fired(&mut self, fired: WakeFired) {
        if !self.wake.is_current(&fired) {
            debug!(generation = fired.generation, "ignoring superseded wake");
            return;
        }
        self.on_wake();
    }

    /// Validate, persist and apply new settings.
    ///
    /// An idle timer still sitting at the full duration of its mode picks up
    /// the new duration.
    pub fn update_settings(&mut self, settings: Settings) {
        self.ensure_recovered();
        if let Err(e) = settings.validate() {
            warn!(error = %e, "rejecting settings update");
            return;
        }
        self.refresh_settings();
        if let Err(e) = records::save_settings(self.store.as_ref(), &settings) {
            warn!(error = %e, "failed to persist settings");
        }
        let previous = std::mem::replace(&mut self.settings, settings);
        info!(
            focus_minutes = self.settings.focus_minutes,
            break_minutes = self.settings.break_minutes,
            total_sessions = self.settings.total_sessions,
            "settings updated"
        );

        let state = match records::load_timer_state(self.store.as_ref()) {
            Ok(Some(state)) => state,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "state unavailable, duration not refreshed");
                return;
            }
        };
        let idle = !state.is_running && !state.is_paused;
        let fresh = self.settings.duration_secs(state.mode);
        if idle
            && state.current_time == previous.duration_secs(state.mode)
            && fresh != state.current_time
        {
            let refreshed = TimerState {
                current_time: fresh,
                revision: state.revision + 1,
                ..state
            };
            self.save(&refreshed);
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn ensure_recovered(&mut self) {
        if !self.recovered {
            self.recover();
        }
    }

    /// The single place that advances the cycle.
    ///
    /// Re-reads the record and only transitions while it is still running,
    /// so a wake and a poll racing on the same expiry advance it once.
    fn complete_session(&mut self) -> Option<Transition> {
        let state = match records::load_timer_state(self.store.as_ref()) {
            Ok(Some(state)) => state,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "completion skipped, store unavailable");
                return None;
            }
        };
        if !state.is_running || state.is_paused {
            debug!("session already completed");
            return None;
        }

        self.refresh_settings();
        let mut transition = next_session(&state, &self.settings);
        transition.next.revision = state.revision + 1;
        if !self.save(&transition.next) {
            return None;
        }
        if let Err(e) = self.wake.cancel() {
            warn!(error = %e, "failed to cancel wake");
        }
        info!(
            completed = ?transition.completed,
            next = ?transition.next.mode,
            session = transition.next.session_number,
            "session completed"
        );

        let notification =
            Notification::session_completed(transition.completed, transition.next.mode);
        self.notifier.notify(&notification);

        if self.settings.auto_start_next {
            self.start(None, &TimerStatePatch::default());
        }
        Some(transition)
    }

    /// Pick up settings written by other processes sharing the store.
    fn refresh_settings(&mut self) {
        match records::load_settings(self.store.as_ref()) {
            Ok(settings) => self.settings = settings,
            Err(e) => warn!(error = %e, "settings unavailable, keeping current values"),
        }
    }

    fn load_or_initial(&self) -> Option<TimerState> {
        match records::load_timer_state(self.store.as_ref()) {
            Ok(Some(state)) => Some(state),
            Ok(None) => Some(TimerState::initial(&self.settings)),
            Err(e) => {
                warn!(error = %e, "store unavailable, command dropped");
                None
            }
        }
    }

    fn save(&self, state: &TimerState) -> bool {
        match records::save_timer_state(self.store.as_ref(), state) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to persist timer state");
                false
            }
        }
    }

    fn arm(&mut self, secs: u64) {
        let after = round_up(Duration::from_secs(secs), self.granularity);
        if let Err(e) = self.wake.arm(after) {
            warn!(
                error = %e,
                "wake unavailable, relying on surface countdown and next poll"
            );
        }
    }
}
