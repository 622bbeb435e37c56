//! # Lapse Core Library
//!
//! Core logic for the Lapse Pomodoro timer: a single timer that stays
//! correct while the process hosting it is suspended, killed and restarted.
//!
//! ## Architecture
//!
//! - **Timer Engine**: owns the persisted timer record. Remaining time is
//!   derived from the wall clock on every read, never counted down in
//!   storage. A recovery pass on launch reconciles the record with the
//!   clock and re-arms the wake.
//! - **Storage**: SQLite key-value store split into local and sync
//!   partitions, plus TOML process configuration.
//! - **Wake**: one-shot coarse alarm that fires when the running session
//!   should end.
//! - **Surface**: local countdown mirror for UIs that poll the engine.
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: command handling and the recovery protocol
//! - [`Database`]: durable state store
//! - [`Config`]: process configuration
//! - [`Request`] / [`Response`]: the command protocol

pub mod error;
pub mod notify;
pub mod position;
pub mod protocol;
pub mod settings;
pub mod storage;
pub mod surface;
pub mod timer;
pub mod wake;

pub use error::{ConfigError, CoreError, SchedulerError, StoreError, ValidationError};
pub use notify::{LogNotifier, Notification, Notifier, RecordingNotifier};
pub use position::PositionWriter;
pub use protocol::{Request, Response};
pub use settings::Settings;
pub use storage::{Config, Database, MemoryStore, Partition, StateStore, StoreChange};
pub use surface::{format_clock, Mirror};
pub use timer::{Mode, RecoveryOutcome, TimerEngine, TimerState, TimerStatePatch};
pub use wake::{DetachedWake, ManualWake, TokioWake, WakeFired, WakeScheduler};
