//! Testing utilities for the station engine.
//!
//! This module provides tools for integration testing:
//! - `ScriptedBackend`, `FailingBackend` and `GatedBackend` in place of real providers
//! - `TestHarness` for driving a whole engine against a small world
//! - Assertion helpers for command responses

use crate::ai::{
    BackendError, BackendRegistry, Generation, GenerationRequest, NarrativeBackend, Narrator,
};
use crate::config::EngineConfig;
use crate::engine::GameEngine;
use crate::persist::MemoryStorage;
use crate::processor::{CommandOutcome, CommandResponse};
use crate::session::SessionId;
use crate::world::{Room, World};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Text a `ScriptedBackend` returns once its script runs out.
pub const DEFAULT_SCRIPTED_TEXT: &str = "The station hums quietly around you.";

/// A two-room world: airlock (with a helmet) east to corridor, and back.
pub fn airlock_world() -> World {
    let rooms = vec![
        Room::new("airlock", "A cramped airlock. Frost rims the outer door.")
            .with_exit("east", "corridor")
            .with_item("helmet"),
        Room::new("corridor", "A humming corridor lit by failing strips.")
            .with_exit("west", "airlock"),
    ];
    match World::new("airlock", rooms) {
        Ok(world) => world,
        Err(e) => unreachable!("test world is well formed: {e}"),
    }
}

/// A backend that replays queued results and records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<Generation, BackendError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    unavailable: AtomicBool,
    stalled: bool,
    closed: AtomicBool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose calls never complete.
    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::default()
        }
    }

    pub fn push(&self, generation: Generation) {
        self.lock_script().push_back(Ok(generation));
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push(Generation::text(text));
    }

    pub fn push_error(&self, error: BackendError) {
        self.lock_script().push_back(Err(error));
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Generation, BackendError>>> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl NarrativeBackend for ScriptedBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, BackendError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        if self.stalled {
            std::future::pending::<()>().await;
        }

        let next = self.lock_script().pop_front();
        next.unwrap_or_else(|| Ok(Generation::text(DEFAULT_SCRIPTED_TEXT)))
    }

    fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A backend that always fails the same way.
#[derive(Debug)]
pub struct FailingBackend {
    error: BackendError,
    available: bool,
    calls: AtomicUsize,
}

impl FailingBackend {
    pub fn new(error: BackendError) -> Self {
        Self {
            error,
            available: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Registered but reporting itself unavailable.
    pub fn unavailable() -> Self {
        Self {
            error: BackendError::Unavailable("not configured".to_string()),
            available: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NarrativeBackend for FailingBackend {
    async fn generate(&self, _request: &GenerationRequest) -> Result<Generation, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// A backend that blocks each call until released.
///
/// Lets a test hold a session lock open deterministically.
#[derive(Debug)]
pub struct GatedBackend {
    text: String,
    entered: Notify,
    release: Notify,
}

impl GatedBackend {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Wait until a call is in progress.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one waiting (or the next) call finish.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl NarrativeBackend for GatedBackend {
    async fn generate(&self, _request: &GenerationRequest) -> Result<Generation, BackendError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Generation::text(self.text.clone()))
    }
}

/// Test harness for running scripted sessions through a real engine.
///
/// The engine runs over [`airlock_world`], keeps saves in memory, and talks
/// to a [`ScriptedBackend`] registered as `claude`.
pub struct TestHarness {
    pub engine: GameEngine,
    pub backend: Arc<ScriptedBackend>,
    pub storage: Arc<MemoryStorage>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::new())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_backends(config, Vec::new())
    }

    /// Register `extra` backends after the scripted `claude` one; an extra
    /// with the id `claude` replaces it.
    pub fn with_backends(
        config: EngineConfig,
        extra: Vec<(&str, Arc<dyn NarrativeBackend>)>,
    ) -> Self {
        let backend = Arc::new(ScriptedBackend::new());
        let mut registry = BackendRegistry::new().with_backend("claude", backend.clone());
        for (id, extra) in extra {
            registry.register(id, extra);
        }
        Self::with_registry(registry, backend, config)
    }

    fn with_registry(registry: BackendRegistry, backend: Arc<ScriptedBackend>, config: EngineConfig) -> Self {
        let narrator: Arc<Narrator> = Arc::new(config.narrator(registry));
        let storage = Arc::new(MemoryStorage::new());
        let engine = GameEngine::new(Arc::new(airlock_world()), narrator, storage.clone(), config);
        Self {
            engine,
            backend,
            storage,
        }
    }

    /// Start a session and return its id.
    pub async fn start(&self) -> SessionId {
        self.engine.start_session().await.session_id
    }

    /// Send a command, panicking if the engine refuses it.
    pub async fn input(&self, session: SessionId, text: &str) -> CommandResponse {
        match self.engine.process_command(session, text).await {
            Ok(response) => response,
            Err(e) => panic!("command {text:?} failed: {e}"),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// Assertion helpers

#[track_caller]
pub fn assert_room(response: &CommandResponse, room: &str) {
    assert_eq!(
        response.snapshot.room, room,
        "Expected to be in {room}, narrative was: {}",
        response.narrative
    );
}

#[track_caller]
pub fn assert_narrated(response: &CommandResponse) {
    assert!(
        matches!(response.outcome, CommandOutcome::Narrated { .. }),
        "Expected narration, got {:?}",
        response.outcome
    );
}

#[track_caller]
pub fn assert_fallback(response: &CommandResponse) {
    assert!(
        matches!(response.outcome, CommandOutcome::Fallback { .. }),
        "Expected fallback narration, got {:?}",
        response.outcome
    );
    assert_eq!(response.narrative, crate::ai::FALLBACK_NARRATION);
}

#[track_caller]
pub fn assert_rejected(response: &CommandResponse) {
    assert!(
        matches!(response.outcome, CommandOutcome::Rejected(_)),
        "Expected a rejection, got {:?}",
        response.outcome
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_harness_scripted_flow() {
        let harness = TestHarness::new();
        harness.backend.push_text("Frost cracks under your boots.");
        let session = harness.start().await;

        let look = harness.input(session, "look").await;
        assert_narrated(&look);
        assert_eq!(look.narrative, "Frost cracks under your boots.");

        let moved = harness.input(session, "east").await;
        assert_room(&moved, "corridor");

        let blocked = harness.input(session, "go up").await;
        assert_rejected(&blocked);
        assert_room(&blocked, "corridor");
    }

    #[tokio::test]
    async fn test_scripted_backend_runs_out_gracefully() {
        let harness = TestHarness::new();
        let session = harness.start().await;

        let response = harness.input(session, "listen").await;
        assert_eq!(response.narrative, DEFAULT_SCRIPTED_TEXT);
        assert_eq!(harness.backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_error() {
        let harness = TestHarness::new();
        harness
            .backend
            .push_error(BackendError::RateLimited("slow down".to_string()));
        let session = harness.start().await;

        let response = harness.input(session, "look").await;
        assert_fallback(&response);
    }
}
