//! Debounced persistence of the floating indicator position.
//!
//! Dragging produces a burst of positions; only the last one of a burst is
//! written, once no new position has arrived for the quiet period.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::SchedulerError;
use crate::storage::{records, StateStore, StickerPosition};

pub struct PositionWriter {
    tx: mpsc::UnboundedSender<StickerPosition>,
    task: JoinHandle<()>,
}

impl PositionWriter {
    /// Spawn the writer on the current runtime.
    pub fn spawn(store: Arc<dyn StateStore>, quiet: Duration) -> Result<Self, SchedulerError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SchedulerError::RuntimeUnavailable(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(run(rx, store, quiet));
        Ok(Self { tx, task })
    }

    pub fn update(&self, position: StickerPosition) -> Result<(), SchedulerError> {
        self.tx
            .send(position)
            .map_err(|_| SchedulerError::ChannelClosed)
    }

    /// Write any pending position and stop.
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!(error = %e, "position writer ended abnormally");
        }
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<StickerPosition>,
    store: Arc<dyn StateStore>,
    quiet: Duration,
) {
    while let Some(mut latest) = rx.recv().await {
        let mut closed = false;
        loop {
            match tokio::time::timeout(quiet, rx.recv()).await {
                Ok(Some(next)) => latest = next,
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }
        match records::save_sticker_position(store.as_ref(), &latest) {
            Ok(()) => debug!(left = latest.left, top = latest.top, "sticker position saved"),
            Err(e) => warn!(error = %e, "failed to save sticker position"),
        }
        if closed {
            return;
        }
    }
}
