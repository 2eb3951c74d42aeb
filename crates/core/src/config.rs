//! Application configuration.
//!
//! Settings come from `<config_dir>/backlog/config.json`, overridden by
//! `BACKLOG__<FIELD>` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Directory under the platform config/data dirs used by the application.
pub const APP_DIR: &str = "backlog";
/// Name of the configuration file.
pub const CONFIG_FILE: &str = "config.json";
/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "BACKLOG";

/// User-tunable settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the game table.
    pub data_dir: PathBuf,
    /// File name of the game table inside `data_dir`.
    pub store_file: String,
    /// Length of the undo window for deletions, in milliseconds.
    pub undo_window_ms: u64,
    /// How long plain messages stay visible, in milliseconds.
    pub message_duration_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR),
            store_file: "games.json".to_string(),
            undo_window_ms: 10_000,
            message_duration_ms: 2_000,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration from `path` plus environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        Self::load_layered(path.into(), environment())
    }

    fn load_layered(path: PathBuf, env: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.clone()).required(false))
            .add_source(env)
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// Full path of the game table.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }

    /// Undo window for deletions.
    pub fn undo_window(&self) -> Duration {
        Duration::from_millis(self.undo_window_ms)
    }

    /// Display time of plain messages.
    pub fn message_duration(&self) -> Duration {
        Duration::from_millis(self.message_duration_ms)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

/// Default location of the configuration file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}

/// Write a default configuration file if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let serialised = serde_json::to_string_pretty(&AppConfig::default())
        .context("failed to serialize default configuration")?;
    fs::write(path, serialised).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join(CONFIG_FILE))?;
        assert_eq!(config.store_file, "games.json");
        assert_eq!(config.undo_window(), Duration::from_secs(10));
        assert_eq!(config.message_duration(), Duration::from_secs(2));
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{ "data_dir": "/tmp/backlog-test", "undo_window_ms": 2500 }"#,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.undo_window(), Duration::from_millis(2500));
        assert_eq!(
            config.store_path(),
            PathBuf::from("/tmp/backlog-test").join("games.json")
        );
        Ok(())
    }

    #[test]
    fn environment_overrides_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{ "undo_window_ms": 2500 }"#)?;

        let mut vars = config::Map::new();
        vars.insert("BACKLOG__UNDO_WINDOW_MS".to_string(), "4000".to_string());
        vars.insert("BACKLOG__STORE_FILE".to_string(), "other.json".to_string());
        let config = AppConfig::load_layered(path, environment().source(Some(vars)))?;

        assert_eq!(config.undo_window(), Duration::from_secs(4));
        assert_eq!(config.store_file, "other.json");
        assert_eq!(config.message_duration(), Duration::from_secs(2));
        Ok(())
    }

    #[test]
    fn default_file_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join(CONFIG_FILE);
        write_default_config(&path)?;
        assert!(path.exists());
        assert_eq!(AppConfig::load_from(&path)?, AppConfig::default());
        Ok(())
    }
}
