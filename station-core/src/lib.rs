//! Session engine for Dark Station Chronicles, an AI-narrated text adventure.
//!
//! This crate provides:
//! - The station map and player state with all-or-nothing state changes
//! - Command classification and deterministic command handling
//! - AI narration over interchangeable backends with timeouts, fallback
//!   text and backend demotion
//! - Versioned JSON save/load
//! - A multi-session engine with per-session locking
//!
//! # Quick Start
//!
//! ```ignore
//! use station_core::{BackendRegistry, EngineConfig, GameEngine, ProviderBackend, World};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::from_env()?;
//!     let claude = ProviderBackend::Claude(providers::Claude::from_env()?);
//!     let registry = BackendRegistry::new().with_backend("claude", Arc::new(claude));
//!     let narrator = Arc::new(config.narrator(registry));
//!
//!     let engine = GameEngine::with_file_storage(Arc::new(World::dark_station()), narrator, config);
//!     let start = engine.start_session().await;
//!     println!("{}", start.opening);
//!
//!     let response = engine.process_command(start.session_id, "go north").await?;
//!     println!("{}", response.narrative);
//!
//!     engine.save(start.session_id, "corridor").await?;
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod command;
pub mod config;
pub mod engine;
pub mod history;
pub mod persist;
pub mod player;
pub mod processor;
pub mod session;
pub mod testing;
pub mod world;

// Primary public API
pub use ai::{
    BackendError, BackendId, BackendRegistry, DemotionPolicy, NarrativeBackend, Narrator,
    NoDemotion, ProviderBackend, RegistryError, ThresholdDemotion, FALLBACK_NARRATION,
};
pub use command::{Command, CommandError};
pub use config::{BusyPolicy, ConfigError, EngineConfig};
pub use engine::{EngineError, GameEngine, LoadedSession, SessionStart};
pub use history::{ConversationHistory, Role, Turn};
pub use persist::{FileStorage, MemoryStorage, PersistError, SaveInfo, SaveMetadata, SaveStorage};
pub use player::{CharacterClass, Player, PlayerStats, StatDelta, StateError};
pub use processor::{CommandOutcome, CommandProcessor, CommandResponse, Rejection};
pub use session::{Session, SessionId, StateSnapshot};
pub use testing::{FailingBackend, GatedBackend, ScriptedBackend, TestHarness};
pub use world::{Room, World, WorldError};
