//! The narrative backend trait and the data that crosses it.

use crate::history::Turn;
use crate::player::{CharacterClass, PlayerStats, StatDelta};
use crate::world::{ItemId, RoomId};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use super::prompt::Prompt;

/// Why a backend could not produce narration.
///
/// None of these ever reach the player; the narrator turns them into
/// fallback text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Everything the narrator knows about the moment a command was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeContext {
    pub character_class: Option<CharacterClass>,
    pub room_id: RoomId,
    pub room_description: String,
    pub exits: Vec<String>,
    pub items_here: Vec<ItemId>,
    pub stats: PlayerStats,
    pub inventory: Vec<ItemId>,
    /// Recent turns only, oldest first.
    pub history: Vec<Turn>,
    /// The raw player input.
    pub command: String,
}

/// A single call to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub context: NarrativeContext,
    pub prompt: Prompt,
}

/// What a backend produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    /// Optional stat change suggested alongside the text.
    pub delta: Option<StatDelta>,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delta: None,
        }
    }

    pub fn with_delta(mut self, delta: StatDelta) -> Self {
        self.delta = Some(delta);
        self
    }
}

/// A source of narration.
///
/// Implementations must be cancel-safe: the narrator drops the future when
/// its timeout expires.
#[async_trait]
pub trait NarrativeBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, BackendError>;

    /// Whether the backend is configured and usable right now.
    fn is_available(&self) -> bool {
        true
    }

    /// Release resources. Called once at shutdown.
    async fn close(&self) {}
}
