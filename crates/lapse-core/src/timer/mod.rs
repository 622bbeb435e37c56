mod clock;
mod engine;
mod state;
mod transition;


pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{RecoveryOutcome, TimerEngine};
pub use state::{Mode, TimerState, TimerStatePatch};
pub use transition::{next_session, Transition};
