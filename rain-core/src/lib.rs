//! Story engine for Weeping Rain, an interactive novel narrated by Claude.
//!
//! This crate provides:
//! - A scene graph controller with pacing, endings and a scripted meta sequence
//! - A persistent ending ledger and three save slots
//! - Mood-driven rain particles and a crossfading audio director
//! - A Claude-backed narrative oracle with a safe fallback scene
//!
//! # Quick Start
//!
//! ```ignore
//! use rain_core::{ClaudeOracle, FileStore, NarrativeConfig, StorySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NarrativeConfig::new();
//!     let oracle = ClaudeOracle::from_env(config.clone())?;
//!     let store = FileStore::open("saves")?;
//!
//!     let mut session = StorySession::new(config, store, oracle);
//!     session.start().await?;
//!     println!("{}", session.current_scene().unwrap().narrative);
//!
//!     session.choose("Step out into the rain").await?;
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod config;
pub mod controller;
pub mod ledger;
pub mod meta;
pub mod oracle;
pub mod particles;
pub mod persist;
pub mod scene;
pub mod session;
pub mod state;
pub mod store;
pub mod testing;

// Re-export for convenience
pub use rain_macros::{Schema, Tool};

// Primary public API
pub use audio::{AudioDirector, Intensity, Mixer, NoiseLayer, Soundtrack};
pub use config::{NarrativeConfig, PacingPolicy};
pub use controller::{ChooseError, Cue, Dispatch, OracleCall, OracleRequest, SceneGraph, Ticket};
pub use ledger::EndingLedger;
pub use oracle::{generate_or_fallback, ClaudeOracle, NarrativeOracle, OracleError};
pub use particles::ParticleField;
pub use persist::{PersistenceGateway, SlotId};
pub use scene::{Choice, EndingType, Mood, Scene};
pub use session::{SessionError, StorySession};
pub use state::{GameState, MusicMode};
pub use store::{FileStore, KvStore, MemoryStore};
