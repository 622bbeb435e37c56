use std::io::Write;
use std::time::Duration;

use clap::{Subcommand, ValueEnum};
use lapse_core::surface::{format_clock, Mirror};
use lapse_core::timer::{Clock, SystemClock};
use lapse_core::{Config, DetachedWake, Mode, Request, TimerEngine, TimerStatePatch};

use crate::common::{build_engine, open_store, CliResult};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Focus,
    Break,
    LongBreak,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Focus => Mode::Focus,
            ModeArg::Break => Mode::Break,
            ModeArg::LongBreak => Mode::LongBreak,
        }
    }
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start or resume the current session
    Start {
        /// Switch to this mode at its full duration first
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Run for this many seconds instead of the remaining time
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Pause the running session
    Pause,
    /// Stop and restore the full duration of the current mode
    Reset {
        /// Reset into this mode instead
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Print current timer state as JSON
    Status,
    /// Show a live countdown until interrupted
    Watch,
}

fn print_state(engine: &mut TimerEngine) -> CliResult {
    let response = engine.handle(Request::GetState);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

pub fn run(action: TimerAction) -> CliResult {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let mut engine = build_engine(&config, store, DetachedWake);
    let outcome = engine.recover();
    tracing::debug!(?outcome, "recovery finished");

    match action {
        TimerAction::Start { mode, seconds } => {
            let current = engine.get_state().unwrap_or_default();
            let mut patch = TimerStatePatch::from(&current);
            if let Some(mode) = mode {
                let mode = Mode::from(mode);
                patch.mode = Some(mode);
                patch.current_time = Some(engine.settings().duration_secs(mode));
            }
            if let Some(secs) = seconds {
                patch.current_time = Some(secs);
            }
            engine.handle(Request::Start {
                current_time: seconds,
                state: patch,
            });
            print_state(&mut engine)?;
        }
        TimerAction::Pause => {
            engine.handle(Request::Pause {
                state: TimerStatePatch::default(),
            });
            print_state(&mut engine)?;
        }
        TimerAction::Reset { mode } => {
            let current = engine.get_state().unwrap_or_default();
            let mode = mode.map(Mode::from).unwrap_or(current.mode);
            let patch = TimerStatePatch {
                current_time: Some(engine.settings().duration_secs(mode)),
                mode: Some(mode),
                ..TimerStatePatch::from(&current)
            };
            engine.handle(Request::Reset { state: patch });
            print_state(&mut engine)?;
        }
        TimerAction::Status => print_state(&mut engine)?,
        TimerAction::Watch => watch(engine, &config)?,
    }
    Ok(())
}

/// Poll the engine every `surface.poll_interval_secs` and redraw once per
/// second from the local mirror in between.
fn watch(mut engine: TimerEngine, config: &Config) -> CliResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let clock = SystemClock;
    let mut mirror = Mirror::new(engine.settings().clone());

    runtime.block_on(async {
        let mut poll = tokio::time::interval(config.surface.poll_interval());
        let mut redraw = tokio::time::interval(Duration::from_secs(1));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    mirror.set_settings(engine.settings().clone());
                    mirror.sync(engine.get_state(), clock.now_ms());
                }
                _ = redraw.tick() => render(&mirror, clock.now_ms())?,
                _ = &mut ctrl_c => break,
            }
        }
        println!();
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn render(mirror: &Mirror, now_ms: i64) -> CliResult {
    let Some(state) = mirror.state() else {
        return Ok(());
    };
    let status = if state.is_running {
        "running"
    } else if state.is_paused {
        "paused"
    } else {
        "stopped"
    };
    let mut out = std::io::stdout().lock();
    write!(
        out,
        "\r{:<10} {}  session {}  {:<8} {:>3.0}%",
        state.mode.label(),
        format_clock(mirror.display_remaining(now_ms)),
        state.session_number,
        status,
        mirror.progress(now_ms) * 100.0,
    )?;
    out.flush()?;
    Ok(())
}
