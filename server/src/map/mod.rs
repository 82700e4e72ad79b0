use std::sync::Arc;

use bevy::prelude::*;
use world::{ConfigError, GridSubmap, LogProgress, MapBuffer, SubmapBounds, SubmapPos};

use crate::config::Config;

pub mod generator;

pub type ServerMap = MapBuffer<GridSubmap>;

/// Submaps around the origin that are kept resident.
#[derive(Resource, Deref)]
pub struct Bubble(pub SubmapBounds);

#[derive(Resource, Deref, DerefMut)]
pub struct AutosaveTimer(pub Timer);

pub struct ServerMapPlugin {
    pub config: Config,

    /// Why the config file could not be used, reported once logging is up.
    load_error: Option<String>,
}

impl ServerMapPlugin {
    pub fn new(config: Result<Config, ConfigError>) -> Self {
        match config {
            Ok(config) => Self {
                config,
                load_error: None,
            },
            Err(e) => Self {
                config: Config::default(),
                load_error: Some(e.to_string()),
            },
        }
    }
}

impl Plugin for ServerMapPlugin {
    #[rustfmt::skip]
    fn build(&self, app: &mut App) {
        if let Some(e) = &self.load_error {
            warn!("[S101] Using the default config: {e}");
        }

        let config = self.config.clone();
        let overmap = generator::Overmap::default();
        let (min_z, max_z) = config.bubble_z;

        info!("Map save root: '{}'", config.map.save_root.display());

        app
            .insert_resource(ServerMap::new(config.map.clone(), Arc::new(overmap.clone())))
            .insert_resource(Bubble(SubmapBounds::around(
                SubmapPos::default(),
                config.bubble_radius,
                min_z,
                max_z,
            )))
            .insert_resource(AutosaveTimer(Timer::from_seconds(
                config.autosave_secs,
                TimerMode::Repeating,
            )))
            .insert_resource(overmap)
            .insert_resource(config)
            .add_systems(Startup, populate_reality_bubble)
            .add_systems(Update, autosave)
            .add_systems(Last, save_on_exit.run_if(on_message::<AppExit>))
        ;
    }
}

/// Make every submap of the reality bubble resident, generating the ones that
/// were never saved.
pub fn populate_reality_bubble(
    mut map: ResMut<ServerMap>,
    bubble: Res<Bubble>,
    overmap: Res<generator::Overmap>,
) {
    let mut generated = 0;
    for pos in bubble.iter() {
        if !map.submap_exists(pos) && map.add_submap(pos, overmap.generate(pos)).is_ok() {
            generated += 1;
        }
    }

    info!(
        "Reality bubble ready: {} submaps resident, {generated} generated.",
        map.len()
    );
}

/// Periodically flush the map, evicting what left the reality bubble.
pub fn autosave(
    time: Res<Time>,
    mut timer: ResMut<AutosaveTimer>,
    mut map: ResMut<ServerMap>,
    bubble: Res<Bubble>,
) {
    if !timer.tick(time.delta()).just_finished() {
        return;
    }

    if let Err(e) = map.save(false, &bubble.0, &mut LogProgress) {
        error!("[S501] Autosave failed, unsaved quads stay resident: {e}");
    }
}

/// Flush everything on shutdown.
pub fn save_on_exit(mut map: ResMut<ServerMap>, bubble: Res<Bubble>) {
    match map.save(true, &bubble.0, &mut LogProgress) {
        Ok(summary) => info!("Map saved on exit, {} quads.", summary.quads),
        Err(e) => error!("[S502] Failed to save map on exit: {e}"),
    }
}
