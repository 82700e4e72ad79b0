use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, de::DeserializeOwned};

/// Settings of a map buffer.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MapBufferConfig {
    /// Root of the world save. Quad files live in `<save_root>/maps/`.
    pub save_root: PathBuf,

    /// Minimum time between two progress reports during a save, in milliseconds.
    pub progress_interval_ms: u64,

    /// Thousands separator of old quad file names, probed on load
    /// when the canonical file is missing.
    pub legacy_separator: char,
}

impl MapBufferConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl Default for MapBufferConfig {
    fn default() -> Self {
        Self {
            save_root: PathBuf::from("save"),
            progress_interval_ms: 500,
            legacy_separator: ',',
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("[M501] Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("[M502] Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Read a TOML config file.
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let data = fs::read_to_string(path)?;
    Ok(toml::from_str(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: MapBufferConfig = toml::from_str("save_root = \"/tmp/world\"").unwrap();
        assert_eq!(config.save_root, PathBuf::from("/tmp/world"));
        assert_eq!(config.progress_interval(), Duration::from_millis(500));
        assert_eq!(config.legacy_separator, ',');
    }

    #[test]
    fn overrides() {
        let config: MapBufferConfig =
            toml::from_str("progress_interval_ms = 20\nlegacy_separator = \".\"").unwrap();
        assert_eq!(config.progress_interval(), Duration::from_millis(20));
        assert_eq!(config.legacy_separator, '.');
    }
}
