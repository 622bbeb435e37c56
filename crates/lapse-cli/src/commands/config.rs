use clap::Subcommand;
use lapse_core::Config;
use serde_json::json;

use crate::common::CliResult;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value (e.g. "wake.granularity_secs", "log.level")
    Get {
        /// Dot-separated key
        key: String,
    },
    /// Change one value and save
    Set {
        /// Dot-separated key
        key: String,
        /// New value
        value: String,
    },
    /// Print the whole config as JSON
    List,
    /// Check the config file and print the paths it resolves to
    Validate,
    /// Restore the default config
    Reset,
}

fn lookup(config: &Config, key: &str) -> CliResult<String> {
    config
        .get(key)
        .ok_or_else(|| format!("unknown key: {key}").into())
}

/// What the process would run with, or the first value that is out of range.
fn report(config: &Config) -> CliResult<serde_json::Value> {
    config.validate()?;
    Ok(json!({
        "config": Config::path()?,
        "database": config.database_path()?,
        "wakeGranularitySecs": config.wake.granularity_secs,
        "pollIntervalSecs": config.surface.poll_interval_secs,
    }))
}

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Get { key } => println!("{}", lookup(&Config::load()?, &key)?),
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("ok");
        }
        ConfigAction::List => {
            println!("{}", serde_json::to_string_pretty(&Config::load()?)?);
        }
        ConfigAction::Validate => {
            let report = report(&Config::load()?)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
