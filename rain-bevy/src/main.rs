//! Weeping Rain - an interactive novel in the rain, narrated by Claude.
//!
//! This application renders the story with Bevy and egui. It features:
//! - Procedural rain that follows the mood of each scene
//! - Noise beds and crossfading music
//! - Three save slots and a persistent record of the endings found
//!
//! Environment:
//! - `ANTHROPIC_API_KEY` enables the narrator; without it every scene is the
//!   fallback scene.
//! - `RAIN_DATA_DIR` is where saves live (default `saves`).
//! - `RAIN_CONFIG` optionally points at a JSON narrative config.

mod audio;
mod effects;
mod rain;
mod runtime;
mod state;
mod ui;

use std::sync::Arc;

use bevy::asset::io::file::FileAssetReader;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use rain_core::oracle::UnavailableOracle;
use rain_core::{ClaudeOracle, FileStore, MemoryStore, NarrativeConfig, NarrativeOracle};

use crate::audio::AudioStage;
use crate::rain::RainField;
use crate::state::{AppState, GamePhase, SharedStore};

fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let mut app = App::new();
    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "Weeping Rain".into(),
            resolution: (1280., 800.).into(),
            resizable: true,
            ..default()
        }),
        ..default()
    }))
    .add_plugins(EguiPlugin)
    .insert_resource(ClearColor(Color::srgb(0.03, 0.04, 0.06)))
    .init_state::<GamePhase>()
    .init_resource::<RainField>()
    // Startup systems
    .add_systems(Startup, setup);

    audio::register(&mut app);

    app
        // Rain is painted on the background layer before the panels.
        .add_systems(Update, (rain::draw_rain, ui::main_ui_system).chain())
        .add_systems(Update, ui::handle_keyboard_input)
        .add_systems(
            Update,
            (
                state::poll_story,
                effects::apply_queued_cues,
                state::clear_old_status,
            )
                .chain(),
        )
        .run();
}

/// Initial setup system. Runs after logging is up so fallbacks are reported.
fn setup(mut commands: Commands) {
    commands.spawn(Camera2d);

    let config = load_config();
    let store = open_store();
    let oracle = open_oracle(&config);

    commands.insert_resource(AppState::new(config, store, oracle));
    commands.insert_resource(AudioStage::new(
        FileAssetReader::get_base_path().join("assets"),
    ));
}

fn load_config() -> NarrativeConfig {
    let Ok(path) = std::env::var("RAIN_CONFIG") else {
        return NarrativeConfig::new();
    };
    match NarrativeConfig::load(&path) {
        Ok(config) => {
            info!("narrative config loaded from {path}");
            config
        }
        Err(e) => {
            warn!("could not load {path}: {e}; using defaults");
            NarrativeConfig::new()
        }
    }
}

fn open_store() -> SharedStore {
    let dir = std::env::var("RAIN_DATA_DIR").unwrap_or_else(|_| "saves".to_string());
    match FileStore::open(&dir) {
        Ok(store) => {
            info!("saves in {dir}");
            Arc::new(store)
        }
        Err(e) => {
            warn!("could not open {dir}: {e}; progress will not be kept");
            Arc::new(MemoryStore::new())
        }
    }
}

fn open_oracle(config: &NarrativeConfig) -> Arc<dyn NarrativeOracle> {
    match ClaudeOracle::from_env(config.clone()) {
        Ok(oracle) => {
            info!("narrating with {}", oracle.model());
            Arc::new(oracle)
        }
        Err(e) => {
            warn!("narrator unavailable: {e}");
            Arc::new(UnavailableOracle)
        }
    }
}
