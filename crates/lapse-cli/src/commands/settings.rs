use clap::Subcommand;
use lapse_core::{Config, DetachedWake, Request, Settings};

use crate::common::{build_engine, open_store, CliResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the timer settings as JSON
    Show,
    /// Set one setting (e.g. "focusMinutes", "autoStartNext")
    Set {
        /// Setting name
        key: String,
        /// New value
        value: String,
    },
    /// Restore default settings
    Reset,
}

/// Return `settings` with `key` replaced by `value`, parsed as the type the
/// key already has.
fn with_value(settings: &Settings, key: &str, value: &str) -> CliResult<Settings> {
    let mut json = serde_json::to_value(settings)?;
    let obj = json.as_object_mut().ok_or("settings are not an object")?;
    let parsed = match obj.get(key) {
        Some(serde_json::Value::Bool(_)) => serde_json::Value::Bool(value.parse()?),
        Some(serde_json::Value::Number(_)) => {
            serde_json::Value::Number(value.parse::<u32>()?.into())
        }
        Some(_) => serde_json::Value::String(value.to_string()),
        None => return Err(format!("unknown setting: {key}").into()),
    };
    obj.insert(key.to_string(), parsed);
    Ok(serde_json::from_value(json)?)
}

pub fn run(action: SettingsAction) -> CliResult {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let mut engine = build_engine(&config, store, DetachedWake);
    engine.recover();

    match action {
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(engine.settings())?);
        }
        SettingsAction::Set { key, value } => {
            let settings = with_value(engine.settings(), &key, &value)?;
            settings.validate()?;
            engine.handle(Request::SettingsUpdated { settings });
            println!("ok");
        }
        SettingsAction::Reset => {
            engine.handle(Request::SettingsUpdated {
                settings: Settings::default(),
            });
            println!("settings reset to defaults");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_numeric_and_boolean_values() {
        let settings = with_value(&Settings::default(), "focusMinutes", "45").unwrap();
        assert_eq!(settings.focus_minutes, 45);
        let settings = with_value(&settings, "autoStartNext", "true").unwrap();
        assert!(settings.auto_start_next);
    }

    #[test]
    fn rejects_unknown_key_and_bad_value() {
        assert!(with_value(&Settings::default(), "volume", "3").is_err());
        assert!(with_value(&Settings::default(), "focusMinutes", "soon").is_err());
    }
}
