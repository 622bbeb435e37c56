//! Long-running engine host.
//!
//! Reads one JSON request per line on stdin and writes one JSON line per
//! reply or event on stdout:
//!
//! ```text
//! {"event":"recovered","recovery":{"outcome":"resumed","remainingSecs":1410}}
//! {"success":true}
//! {"event":"changed","partition":"local","key":"pomodoroState"}
//! {"event":"notification","title":"Lapse","message":"...","completed":"focus","upcoming":"break"}
//! ```
//!
//! A line of the form `{"stickerPosition":{"left":..,"top":..}}` moves the
//! floating indicator; positions are written after a short quiet period.
//! The daemon exits on end of input or Ctrl-C.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lapse_core::storage::StickerPosition;
use lapse_core::{
    Config, Notification, Notifier, PositionWriter, Request, StoreChange, TimerEngine, TokioWake,
};
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::common::{open_store, CliResult};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Inbound {
    Command(Request),
    #[serde(rename_all = "camelCase")]
    Position {
        sticker_position: StickerPosition,
    },
}

/// Emits notification events on stdout while notifications are enabled.
struct StdoutNotifier {
    enabled: Arc<AtomicBool>,
}

impl Notifier for StdoutNotifier {
    fn notify(&mut self, notification: &Notification) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        let mut event = json!({ "event": "notification" });
        if let (Some(obj), Ok(serde_json::Value::Object(fields))) =
            (event.as_object_mut(), serde_json::to_value(notification))
        {
            obj.extend(fields);
        }
        println!("{event}");
    }
}

pub fn run() -> CliResult {
    let config = Config::load()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> CliResult {
    let store = open_store(&config)?;
    let (wake, mut fired) = TokioWake::new();
    let notifications = Arc::new(AtomicBool::new(false));
    let mut engine = TimerEngine::new(store.clone(), wake)
        .with_granularity(config.wake.granularity())
        .with_notifier(StdoutNotifier {
            enabled: notifications.clone(),
        });

    let recovery = engine.recover();
    notifications.store(engine.settings().notifications_enabled, Ordering::Relaxed);
    info!(?recovery, "daemon ready");
    println!("{}", json!({ "event": "recovered", "recovery": recovery }));

    let positions = PositionWriter::spawn(store, config.surface.position_debounce())?;
    let mut changes = engine.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => handle_line(&mut engine, &positions, &notifications, &line),
                None => break,
            },
            Some(event) = fired.recv() => engine.on_wake_fired(event),
            change = changes.recv() => match change {
                Ok(StoreChange { partition, key }) => println!(
                    "{}",
                    json!({ "event": "changed", "partition": partition, "key": key })
                ),
                Err(RecvError::Lagged(missed)) => warn!(missed, "dropped change notifications"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
        }
    }

    positions.close().await;
    Ok(())
}

fn handle_line(
    engine: &mut TimerEngine,
    positions: &PositionWriter,
    notifications: &AtomicBool,
    line: &str,
) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    match serde_json::from_str::<Inbound>(line) {
        Ok(Inbound::Command(request)) => {
            let response = engine.handle(request);
            notifications.store(engine.settings().notifications_enabled, Ordering::Relaxed);
            if !response.is_silent() {
                match serde_json::to_string(&response) {
                    Ok(reply) => println!("{reply}"),
                    Err(e) => warn!(error = %e, "failed to encode reply"),
                }
            }
        }
        Ok(Inbound::Position { sticker_position }) => {
            if let Err(e) = positions.update(sticker_position) {
                warn!(error = %e, "position writer stopped");
            }
        }
        Err(e) => {
            warn!(error = %e, "unreadable request");
            println!("{}", json!({ "event": "error", "message": e.to_string() }));
        }
    }
}
