//! Helpers shared by the command modules.

use std::error::Error;
use std::sync::Arc;

use lapse_core::storage::records;
use lapse_core::{Config, Database, LogNotifier, Notification, Notifier, TimerEngine, WakeScheduler};

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

pub fn open_store(config: &Config) -> CliResult<Arc<Database>> {
    let path = config.database_path()?;
    Ok(Arc::new(Database::open_at(path)?))
}

/// Engine over `store`, with wake granularity from `config` and the
/// notifier chosen by the stored `notificationsEnabled` setting.
pub fn build_engine(
    config: &Config,
    store: Arc<Database>,
    wake: impl WakeScheduler + 'static,
) -> TimerEngine {
    let notify = records::load_settings(store.as_ref())
        .map(|s| s.notifications_enabled)
        .unwrap_or(false);
    let engine = TimerEngine::new(store, wake).with_granularity(config.wake.granularity());
    if notify {
        engine.with_notifier(StderrNotifier)
    } else {
        engine.with_notifier(LogNotifier)
    }
}

/// Prints notifications for one-shot commands, keeping stdout for JSON.
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&mut self, notification: &Notification) {
        eprintln!("{}: {}", notification.title, notification.message);
    }
}
