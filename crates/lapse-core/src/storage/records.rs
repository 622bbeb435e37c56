//! Typed records on top of the raw key-value store.
//!
//! A record that fails to parse is reported as absent. The caller then
//! treats it like a fresh install instead of surfacing an error.

use serde::{Deserialize, Serialize};

use super::{Partition, StateStore};
use crate::error::Result;
use crate::settings::Settings;
use crate::timer::TimerState;

pub const TIMER_STATE_KEY: &str = "pomodoroState";
pub const SETTINGS_KEY: &str = "settings";
pub const STICKER_POSITION_KEY: &str = "stickerPosition";

/// Floating indicator position in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StickerPosition {
    pub left: f64,
    pub top: f64,
}

fn load_json<T: for<'de> Deserialize<'de>>(
    store: &dyn StateStore,
    partition: Partition,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = store.get(partition, key)? else {
        return Ok(None);
    };
    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding malformed record");
            Ok(None)
        }
    }
}

fn save_json<T: Serialize>(
    store: &dyn StateStore,
    partition: Partition,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(partition, key, &raw)?;
    Ok(())
}

/// Load the timer record, repaired if it holds an invalid combination.
pub fn load_timer_state(store: &dyn StateStore) -> Result<Option<TimerState>> {
    let state: Option<TimerState> = load_json(store, Partition::Local, TIMER_STATE_KEY)?;
    Ok(state.map(|s| {
        if !s.is_valid() {
            tracing::warn!(state = ?s, "repairing invalid timer record");
        }
        s.normalized()
    }))
}

pub fn save_timer_state(store: &dyn StateStore, state: &TimerState) -> Result<()> {
    save_json(store, Partition::Local, TIMER_STATE_KEY, state)
}

/// Load settings, falling back to defaults when absent or unreadable.
pub fn load_settings(store: &dyn StateStore) -> Result<Settings> {
    Ok(load_json(store, Partition::Sync, SETTINGS_KEY)?.unwrap_or_default())
}

pub fn save_settings(store: &dyn StateStore, settings: &Settings) -> Result<()> {
    save_json(store, Partition::Sync, SETTINGS_KEY, settings)
}

pub fn load_sticker_position(store: &dyn StateStore) -> Result<Option<StickerPosition>> {
    load_json(store, Partition::Sync, STICKER_POSITION_KEY)
}

pub fn save_sticker_position(store: &dyn StateStore, position: &StickerPosition) -> Result<()> {
    save_json(store, Partition::Sync, STICKER_POSITION_KEY, position)
}
