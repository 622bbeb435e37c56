//! TOML-based process configuration.
//!
//! Stores how this installation runs, as opposed to the user's timer
//! settings (which live in the store's sync partition):
//! - Log filter
//! - Database location override
//! - Wake granularity
//! - Surface polling and position debounce
//!
//! Configuration is stored at `~/.config/lapse/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing-subscriber` filter directive, overridden by `LAPSE_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file. Defaults to `lapse.db` in the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeConfig {
    /// Wakes are rounded up to a multiple of this. 60 mimics minute alarms.
    #[serde(default = "default_granularity_secs")]
    pub granularity_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_position_debounce_ms")]
    pub position_debounce_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/lapse/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub wake: WakeConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
}

fn default_log_level() -> String {
    "warn".into()
}
fn default_granularity_secs() -> u64 {
    1
}
fn default_poll_interval_secs() -> u64 {
    3
}
fn default_position_debounce_ms() -> u64 {
    100
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            granularity_secs: default_granularity_secs(),
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            position_debounce_ms: default_position_debounce_ms(),
        }
    }
}

impl WakeConfig {
    pub fn granularity(&self) -> Duration {
        Duration::from_secs(self.granularity_secs.max(1))
    }
}

impl SurfaceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn position_debounce(&self) -> Duration {
        Duration::from_millis(self.position_debounce_ms)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let new_value = match obj.get(part) {
                    Some(serde_json::Value::Bool(_)) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    Some(serde_json::Value::Number(_)) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    Some(serde_json::Value::Object(_)) | Some(serde_json::Value::Array(_)) => {
                        return Err(invalid("cannot replace a whole section".into()));
                    }
                    Some(_) => serde_json::Value::String(value.into()),
                    // Optional fields are omitted while unset.
                    None if Self::is_optional_key(key) => serde_json::Value::String(value.into()),
                    None => return Err(unknown()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn is_optional_key(key: &str) -> bool {
        key == "storage.database"
    }

    /// Location of the config file in the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory is unavailable.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults when no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults when it is missing.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    ///
    /// See [`Config::save`].
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key).or_else(|| {
            Self::is_optional_key(key).then_some(&serde_json::Value::Null)
        })?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key, in memory. Call [`Config::save`] to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// as the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error for values that would stall the wake scheduler or
    /// the polling surface.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wake.granularity_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "wake.granularity_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.surface.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "surface.poll_interval_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Database file to open.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is set and the data directory is
    /// unavailable.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.database {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("lapse.db")),
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default configuration");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("wake.granularity_secs").as_deref(), Some("1"));
        assert_eq!(cfg.get("log.level").as_deref(), Some("warn"));
        assert_eq!(cfg.get("storage.database").as_deref(), Some("null"));
        assert!(cfg.get("wake.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_number() {
        let mut cfg = Config::default();
        cfg.set("wake.granularity_secs", "60").unwrap();
        assert_eq!(cfg.wake.granularity(), Duration::from_secs(60));
    }

    #[test]
    fn set_updates_optional_path() {
        let mut cfg = Config::default();
        cfg.set("storage.database", "/tmp/lapse-test.db").unwrap();
        assert_eq!(
            cfg.database_path().unwrap(),
            PathBuf::from("/tmp/lapse-test.db")
        );
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("wake.nonexistent_key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("surface.poll_interval_secs", "soon").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn set_rejects_zero_granularity() {
        let mut cfg = Config::default();
        assert!(cfg.set("wake.granularity_secs", "0").is_err());
        assert_eq!(cfg.wake.granularity_secs, 1);
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[wake]\ngranularity_secs = 60\n").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.wake.granularity_secs, 60);
        assert_eq!(cfg.surface.poll_interval_secs, 3);
        assert_eq!(cfg.log.level, "warn");
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "wake = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
