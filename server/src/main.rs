use std::time::Duration;

use bevy::{
    app::{
        App, AppExit, PanicHandlerPlugin, ScheduleRunnerPlugin, TaskPoolPlugin,
        TerminalCtrlCHandlerPlugin,
    },
    log::LogPlugin,
    time::TimePlugin,
};

pub mod config;
pub mod map;

#[rustfmt::skip]
fn main() -> AppExit {
    let map_plugin = map::ServerMapPlugin::new(config::Config::load());
    let tick_hz = map_plugin.config.tick_hz.max(1.0);

    App::new()
        // add bevy plugins
        .add_plugins((
            PanicHandlerPlugin,
            LogPlugin::default(),
            TaskPoolPlugin::default(),
            TimePlugin,
            ScheduleRunnerPlugin::run_loop(Duration::from_secs_f32(1.0 / tick_hz)),
            TerminalCtrlCHandlerPlugin,
        ))
        // map buffer, loaded after logging is up.
        .add_plugins(map_plugin)
        .run()
}
