//! In-process store.
//!
//! Used when no database can be opened and as a test double. `fail_next`
//! and `set_available` simulate a store that is briefly unreachable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::{Partition, StateStore, StoreChange, CHANGE_CHANNEL_CAPACITY};
use crate::error::StoreError;

pub struct MemoryStore {
    entries: Mutex<HashMap<(Partition, String), String>>,
    changes: broadcast::Sender<StoreChange>,
    available: AtomicBool,
    failures_pending: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            changes,
            available: AtomicBool::new(true),
            failures_pending: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Make every operation fail until switched back on.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fail the next `n` operations.
    pub fn fail_next(&self, n: usize) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    /// Successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store switched off".into()));
        }
        let consumed = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, partition: Partition, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(&(partition, key.to_string())).cloned())
    }

    fn set(&self, partition: Partition, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        {
            let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
            entries.insert((partition, key.to_string()), value.to_string());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.changes
            .send(StoreChange {
                partition,
                key: key.to_string(),
            })
            .ok();
        Ok(())
    }

    fn remove(&self, partition: Partition, key: &str) -> Result<(), StoreError> {
        self.check()?;
        let removed = {
            let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
            entries.remove(&(partition, key.to_string())).is_some()
        };
        if removed {
            self.changes
                .send(StoreChange {
                    partition,
                    key: key.to_string(),
                })
                .ok();
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
