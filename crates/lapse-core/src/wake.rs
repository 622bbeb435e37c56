//! Wake scheduler.
//!
//! A coarse one-shot alarm: at most one wake is pending, arming replaces it,
//! and cancelling clears it. Delivery is best effort. When no wake can be
//! armed the engine still converges, because recovery on launch and the
//! zero check in `get_state` both complete an expired session.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::SchedulerError;

/// Delivered to the engine's owner when an armed wake elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeFired {
    pub generation: u64,
}

pub trait WakeScheduler: Send {
    /// Fire once after `after`, replacing any pending wake.
    fn arm(&mut self, after: Duration) -> Result<(), SchedulerError>;

    /// Drop the pending wake, if any.
    fn cancel(&mut self) -> Result<(), SchedulerError>;

    /// Whether `fired` belongs to the wake that is still pending.
    ///
    /// A wake can elapse while a newer `arm` or `cancel` is being handled;
    /// the stale delivery must then be ignored.
    fn is_current(&self, fired: &WakeFired) -> bool {
        let _ = fired;
        true
    }
}

/// Round `after` up to a whole multiple of `granularity`.
///
/// Saturates at [`Duration::MAX`] instead of wrapping, so an absurd request
/// never turns into a short wake.
pub fn round_up(after: Duration, granularity: Duration) -> Duration {
    let step = granularity.as_millis().max(1);
    let rounded = after.as_millis().div_ceil(step).saturating_mul(step);
    match u64::try_from(rounded / 1000) {
        Ok(secs) => Duration::new(secs, (rounded % 1000) as u32 * 1_000_000),
        Err(_) => Duration::MAX,
    }
}

/// Wakes backed by `tokio::time::sleep` on the current runtime.
pub struct TokioWake {
    tx: mpsc::UnboundedSender<WakeFired>,
    pending: Option<JoinHandle<()>>,
    generation: u64,
}

impl TokioWake {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WakeFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                pending: None,
                generation: 0,
            },
            rx,
        )
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation += 1;
    }
}

impl WakeScheduler for TokioWake {
    fn arm(&mut self, after: Duration) -> Result<(), SchedulerError> {
        self.abort_pending();
        if self.tx.is_closed() {
            return Err(SchedulerError::ChannelClosed);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SchedulerError::RuntimeUnavailable(e.to_string()))?;

        let tx = self.tx.clone();
        let generation = self.generation;
        self.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(after).await;
            tx.send(WakeFired { generation }).ok();
        }));
        tracing::debug!(after_secs = after.as_secs(), generation, "wake armed");
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), SchedulerError> {
        self.abort_pending();
        tracing::debug!(generation = self.generation, "wake cancelled");
        Ok(())
    }

    fn is_current(&self, fired: &WakeFired) -> bool {
        self.pending.is_some() && fired.generation == self.generation
    }
}

impl Drop for TokioWake {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

/// For processes that exit right after one command.
///
/// Nothing is scheduled; the next launch's recovery pass, or the next
/// `get_state` that sees zero remaining, completes the session instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedWake;

impl WakeScheduler for DetachedWake {
    fn arm(&mut self, after: Duration) -> Result<(), SchedulerError> {
        tracing::debug!(
            after_secs = after.as_secs(),
            "wake deferred to next launch reconciliation"
        );
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), SchedulerError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ManualWakeInner {
    armed: Option<Duration>,
    arm_count: usize,
    cancel_count: usize,
    failing: bool,
}

/// Observable wake scheduler. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ManualWake(Arc<Mutex<ManualWakeInner>>);

impl ManualWake {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut ManualWakeInner) -> R) -> R {
        let mut inner = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut inner)
    }

    /// Delay of the pending wake.
    pub fn armed(&self) -> Option<Duration> {
        self.with(|w| w.armed)
    }

    pub fn arm_count(&self) -> usize {
        self.with(|w| w.arm_count)
    }

    pub fn cancel_count(&self) -> usize {
        self.with(|w| w.cancel_count)
    }

    /// Make `arm` fail as if the host had no alarm facility.
    pub fn set_failing(&self, failing: bool) {
        self.with(|w| w.failing = failing);
    }
}

impl WakeScheduler for ManualWake {
    fn arm(&mut self, after: Duration) -> Result<(), SchedulerError> {
        self.with(|w| {
            if w.failing {
                return Err(SchedulerError::RuntimeUnavailable("alarms disabled".into()));
            }
            w.armed = Some(after);
            w.arm_count += 1;
            Ok(())
        })
    }

    fn cancel(&mut self) -> Result<(), SchedulerError> {
        self.with(|w| {
            w.armed = None;
            w.cancel_count += 1;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_to_minutes() {
        let minute = Duration::from_secs(60);
        assert_eq!(round_up(Duration::from_secs(61), minute), Duration::from_secs(120));
        assert_eq!(round_up(Duration::from_secs(60), minute), Duration::from_secs(60));
        assert_eq!(round_up(Duration::ZERO, minute), Duration::ZERO);
    }

    #[test]
    fn round_up_with_second_granularity_is_identity() {
        let second = Duration::from_secs(1);
        assert_eq!(round_up(Duration::from_secs(70), second), Duration::from_secs(70));
    }

    #[test]
    fn round_up_never_shortens_huge_delays() {
        let second = Duration::from_secs(1);
        let huge = Duration::from_secs(20_000_000_000_000_000);
        assert_eq!(round_up(huge, second), huge);
        assert!(round_up(huge, Duration::from_secs(60)) >= huge);
        assert_eq!(round_up(Duration::MAX, Duration::from_secs(60)), Duration::MAX);
    }

    #[test]
    fn arm_outside_runtime_reports_unavailable() {
        let (mut wake, _rx) = TokioWake::new();
        assert!(matches!(
            wake.arm(Duration::from_secs(1)),
            Err(SchedulerError::RuntimeUnavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_wake_fires_after_delay() {
        let (mut wake, mut rx) = TokioWake::new();
        wake.arm(Duration::from_secs(70)).unwrap();

        tokio::time::sleep(Duration::from_secs(69)).await;
        assert!(rx.try_recv().is_err());

        let fired = rx.recv().await.unwrap();
        assert!(wake.is_current(&fired));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_supersedes_pending_wake() {
        let (mut wake, mut rx) = TokioWake::new();
        wake.arm(Duration::from_secs(10)).unwrap();
        wake.arm(Duration::from_secs(30)).unwrap();

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(rx.try_recv().is_err());

        let fired = rx.recv().await.unwrap();
        assert!(wake.is_current(&fired));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wake_never_fires() {
        let (mut wake, mut rx) = TokioWake::new();
        wake.arm(Duration::from_secs(5)).unwrap();
        wake.cancel().unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stale_generation_is_not_current() {
        let (mut wake, _rx) = TokioWake::new();
        wake.cancel().unwrap();
        assert!(!wake.is_current(&WakeFired { generation: 0 }));
    }

    #[test]
    fn manual_wake_tracks_calls() {
        let wake = ManualWake::new();
        let mut handle = wake.clone();
        handle.arm(Duration::from_secs(70)).unwrap();
        assert_eq!(wake.armed(), Some(Duration::from_secs(70)));
        handle.cancel().unwrap();
        assert_eq!(wake.armed(), None);
        assert_eq!((wake.arm_count(), wake.cancel_count()), (1, 1));

        wake.set_failing(true);
        assert!(handle.arm(Duration::from_secs(1)).is_err());
    }
}
