//! Player configuration
//!
//! Resolution order:
//! 1. Explicit path (command-line `--config`)
//! 2. `HARMONY_CONFIG` environment variable
//! 3. `<config dir>/harmony/config.toml`
//! 4. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PlaybackError, Result};
use crate::model::RepeatState;

pub const CONFIG_ENV_VAR: &str = "HARMONY_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Repeat mode the queue starts with
    pub repeat: RepeatState,
    pub shuffle: bool,
    /// Fixed seed for the shuffle order; random when unset
    pub shuffle_seed: Option<u64>,
    /// Immediate retries after the engine fails to prepare or play
    pub engine_retry_limit: u32,
    /// Skip-previous restarts the track when further in than this
    pub previous_restart_threshold_ms: u64,
    /// Directory for rotated log files
    pub log_dir: PathBuf,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            repeat: RepeatState::Off,
            shuffle: false,
            shuffle_seed: None,
            engine_retry_limit: 1,
            previous_restart_threshold_ms: 3000,
            log_dir: PathBuf::from(".logs"),
        }
    }
}

impl PlayerConfig {
    pub fn previous_restart_threshold(&self) -> Duration {
        Duration::from_millis(self.previous_restart_threshold_ms)
    }

    /// Resolve and load the configuration.
    ///
    /// An explicit or environment-supplied path must exist; the per-user file
    /// is optional.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlaybackError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)
            .map_err(|e| PlaybackError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Per-user config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("harmony").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.engine_retry_limit, 1);
        assert_eq!(config.previous_restart_threshold(), Duration::from_secs(3));
        assert_eq!(config.repeat, RepeatState::Off);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PlayerConfig::from_toml("repeat = \"all\"\nshuffle_seed = 42\n").unwrap();
        assert_eq!(config.repeat, RepeatState::All);
        assert_eq!(config.shuffle_seed, Some(42));
        assert!(!config.shuffle);
        assert_eq!(config.engine_retry_limit, 1);
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "shuffle = true").unwrap();
        writeln!(file, "engine_retry_limit = 2").unwrap();

        let config = PlayerConfig::load(Some(file.path())).unwrap();
        assert!(config.shuffle);
        assert_eq!(config.engine_retry_limit, 2);
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlayerConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, PlaybackError::Config(_)));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "repeat = \"sometimes\"").unwrap();
        let err = PlayerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, PlaybackError::Config(_)));
    }
}
