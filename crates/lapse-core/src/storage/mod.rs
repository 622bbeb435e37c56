//! Durable state store.
//!
//! A process-external key-value store split into two partitions: `Local`
//! for state that must survive restarts of this machine's engine, and
//! `Sync` for records that may follow the user across devices. Every write
//! is announced to subscribers so surfaces can re-sync without polling.

mod config;
pub mod database;
pub mod memory;
pub mod migrations;
pub mod records;

pub use config::{Config, LogConfig, StorageConfig, SurfaceConfig, WakeConfig};
pub use database::Database;
pub use memory::MemoryStore;
pub use records::{StickerPosition, SETTINGS_KEY, STICKER_POSITION_KEY, TIMER_STATE_KEY};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;

use crate::error::{ConfigError, StoreError};

/// Capacity of the change-notification channel.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Local,
    Sync,
}

impl Partition {
    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Local => "local",
            Partition::Sync => "sync",
        }
    }
}

/// Announced after every successful write or removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreChange {
    pub partition: Partition,
    pub key: String,
}

/// Key-value store shared by the engine and its surfaces.
///
/// No transactions are assumed. The timer engine is the only writer of the
/// timer record; concurrent writers from other processes resolve as last
/// writer wins.
pub trait StateStore: Send + Sync {
    fn get(&self, partition: Partition, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, partition: Partition, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, partition: Partition, key: &str) -> Result<(), StoreError>;

    /// Receive a `StoreChange` for every write made through this handle.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Returns `~/.config/lapse[-dev]/` based on LAPSE_ENV.
///
/// Set LAPSE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("LAPSE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("lapse-dev")
    } else {
        base_dir.join("lapse")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}
