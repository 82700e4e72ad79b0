use std::path::PathBuf;

use bevy::prelude::*;
use serde::Deserialize;
use world::{
    MapBufferConfig,
    config::{ConfigError, load_toml},
};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "MAPBUFFER_CONFIG";

#[derive(Resource, Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Settings of the map buffer, under the `[map]` table.
    pub map: MapBufferConfig,

    /// Seconds between two autosaves.
    pub autosave_secs: f32,

    /// Radius, in submaps, of the reality bubble around the origin.
    pub bubble_radius: i32,

    /// Lowest and highest z level kept in the reality bubble.
    pub bubble_z: (i32, i32),

    /// Simulation ticks per second.
    pub tick_hz: f32,
}

impl Config {
    /// Load the config from `$MAPBUFFER_CONFIG`, or `server.toml` in the working directory.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("server.toml"));

        load_toml(&path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map: MapBufferConfig::default(),
            autosave_secs: 60.0,
            bubble_radius: 6,
            bubble_z: (-1, 1),
            tick_hz: 30.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_map_table() {
        let config: Config = toml::from_str(
            r#"
            autosave_secs = 5.0
            bubble_z = [0, 0]

            [map]
            save_root = "/srv/world"
            "#,
        )
        .unwrap();

        assert_eq!(config.autosave_secs, 5.0);
        assert_eq!(config.bubble_z, (0, 0));
        assert_eq!(config.bubble_radius, 6);
        assert_eq!(config.map.save_root, PathBuf::from("/srv/world"));
        assert_eq!(config.map.progress_interval_ms, 500);
    }
}
