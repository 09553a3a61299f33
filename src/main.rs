mod audio;
mod camera;
mod checkpoint;
mod components;
mod config;
mod controller;
mod edge_scan;
mod enemy;
mod events;
#[cfg(not(target_arch = "wasm32"))]
mod file_watcher;
mod game_runtime;
mod input;
mod level;
mod physics;
mod physics_core;
mod platform;
mod player;
mod render;
mod rigid_body;
mod screen;
mod simulation;
mod tilemap;
mod timer;
mod weapon;

use bevy::prelude::*;
use components::HeadlessMode;
use config::StartupConfig;
use tilemap::Tilemap;

fn config_path() -> String {
    std::env::var("GRIDRUNNER_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "game.json".to_string())
}

fn load_startup_config(path: &str) -> StartupConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match StartupConfig::from_json(&contents) {
            Ok(cfg) => {
                println!("[Gridrunner] Loaded startup config from {}", path);
                cfg
            }
            Err(e) => {
                eprintln!("[Gridrunner] Failed to parse {}: {}", path, e);
                StartupConfig::default()
            }
        },
        Err(_) => StartupConfig::default(),
    }
}

/// Env var beats `game.json`; a missing or invalid file falls back to the test level.
fn load_level(startup: &StartupConfig) -> (Tilemap, Option<String>) {
    let path = std::env::var("GRIDRUNNER_LEVEL")
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| startup.level.clone());
    let Some(path) = path else {
        return (Tilemap::test_level(startup.tuning.tile_size), None);
    };
    match Tilemap::load(&path) {
        Ok(map) => {
            println!(
                "[Gridrunner] Loaded level {} ({}x{} tiles)",
                path, map.width, map.height
            );
            (map, Some(path))
        }
        Err(e) => {
            eprintln!("[Gridrunner] {e}; using the built-in test level");
            (Tilemap::test_level(startup.tuning.tile_size), Some(path))
        }
    }
}

fn simulate(path: &str, tilemap: &Tilemap, startup: &StartupConfig) -> Result<String, String> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read {path}: {e}"))?;
    let request: simulation::SimulationRequest = serde_json::from_str(&contents)
        .map_err(|e| format!("Invalid simulation request: {e}"))?;
    let result = simulation::run_simulation(tilemap, &startup.tuning, &request)?;
    serde_json::to_string_pretty(&result).map_err(|e| format!("Failed to encode result: {e}"))
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let headless = args.iter().any(|a| a == "--headless");

    let config_path = config_path();
    let startup_config = load_startup_config(&config_path);
    let (tilemap, level_path) = load_level(&startup_config);

    if let Some(pos) = args.iter().position(|a| a == "--simulate") {
        let Some(request_path) = args.get(pos + 1) else {
            eprintln!("[Gridrunner] --simulate needs a request file");
            std::process::exit(2);
        };
        match simulate(request_path, &tilemap, &startup_config) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("[Gridrunner] Simulation failed: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let mut app = App::new();
    app.insert_resource(HeadlessMode(headless));

    if headless {
        app.add_plugins(MinimalPlugins);
        app.add_plugins(bevy::state::app::StatesPlugin);
        println!("[Gridrunner] Starting in HEADLESS mode");
    } else {
        let window_title = startup_config
            .window_title
            .clone()
            .unwrap_or_else(|| "Gridrunner".to_string());
        let window_width = startup_config.window_width.unwrap_or(1024.0);
        let window_height = startup_config.window_height.unwrap_or(768.0);

        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: window_title,
                resolution: (window_width, window_height).into(),
                present_mode: bevy::window::PresentMode::AutoVsync,
                ..default()
            }),
            ..default()
        }));
        let bg = startup_config.background_color.unwrap_or([0.08, 0.08, 0.12]);
        app.insert_resource(ClearColor(Color::srgb(bg[0], bg[1], bg[2])));
        app.add_plugins(render::RenderPlugin);
        println!("[Gridrunner] Starting in WINDOWED mode");
    }

    app.insert_resource(startup_config.tuning.clone())
        .insert_resource(tilemap)
        .insert_resource(Time::<Fixed>::from_hz(60.0))
        .add_plugins(input::InputPlugin)
        .add_plugins(game_runtime::RuntimeStatePlugin)
        .add_plugins(events::GameEventsPlugin)
        .add_plugins(audio::AudioPlugin)
        .add_plugins(camera::CameraPlugin)
        .add_plugins(tilemap::TilemapPlugin)
        .add_plugins(player::PlayerPlugin)
        .add_plugins(level::LevelPlugin)
        .add_plugins(physics::PhysicsPlugin);

    if let Some(triggers) = startup_config.audio_triggers.clone() {
        println!("[Gridrunner] Using {} custom audio triggers", triggers.len());
        app.world_mut()
            .resource_mut::<audio::AudioCues>()
            .set_triggers(triggers);
    }

    #[cfg(not(target_arch = "wasm32"))]
    app.add_plugins(file_watcher::FileWatcherPlugin {
        config_path: config_path.into(),
        level_path: level_path.map(Into::into),
    });
    #[cfg(target_arch = "wasm32")]
    let _ = level_path;

    app.run();
}
