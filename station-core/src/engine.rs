//! GameEngine - the public entry point for running sessions.
//!
//! The engine owns the shared world, the narrator, the save storage and
//! every live session. Each session sits behind its own async mutex, held
//! for the whole of a command, a save or a restore. Different sessions never
//! wait on each other.

use crate::ai::{BackendId, Narrator, RegistryError};
use crate::config::{BusyPolicy, EngineConfig};
use crate::persist::{self, FileStorage, PersistError, SaveInfo, SaveStorage};
use crate::processor::{CommandProcessor, CommandResponse};
use crate::session::{Session, SessionId, StateSnapshot};
use crate::world::World;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{info, warn};

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session {0} is busy with another command")]
    SessionBusy(SessionId),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// A newly started session.
#[derive(Debug, Clone)]
pub struct SessionStart {
    pub session_id: SessionId,
    pub opening: String,
    pub snapshot: StateSnapshot,
}

/// A session populated from a save.
#[derive(Debug, Clone)]
pub struct LoadedSession {
    pub session_id: SessionId,
    pub save: SaveInfo,
    pub snapshot: StateSnapshot,
}

pub struct GameEngine {
    world: Arc<World>,
    processor: CommandProcessor,
    storage: Arc<dyn SaveStorage>,
    config: EngineConfig,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl GameEngine {
    pub fn new(
        world: Arc<World>,
        narrator: Arc<Narrator>,
        storage: Arc<dyn SaveStorage>,
        config: EngineConfig,
    ) -> Self {
        if !narrator.registry().contains(&config.default_backend) {
            warn!(
                backend = %config.default_backend,
                "Default backend is not registered; narration will fall back"
            );
        }
        Self {
            world,
            processor: CommandProcessor::new(narrator, config.history_window),
            storage,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// An engine saving to `config.save_dir`.
    pub fn with_file_storage(world: Arc<World>, narrator: Arc<Narrator>, config: EngineConfig) -> Self {
        let storage = Arc::new(FileStorage::new(config.save_dir.clone()));
        Self::new(world, narrator, storage, config)
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn narrator(&self) -> &Arc<Narrator> {
        self.processor.narrator()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn start_session(&self) -> SessionStart {
        let session = Session::new(
            self.world.clone(),
            self.config.default_backend.clone(),
            self.config.max_stored_turns,
        );
        let start = SessionStart {
            session_id: session.id(),
            opening: session.opening_text(),
            snapshot: session.snapshot(),
        };
        self.insert(session).await;
        info!(session = %start.session_id, backend = %self.config.default_backend, "Session started");
        start
    }

    pub async fn process_command(
        &self,
        session_id: SessionId,
        raw: &str,
    ) -> Result<CommandResponse, EngineError> {
        let mut session = self.lock(session_id).await?;
        Ok(self.processor.process(&mut session, raw).await)
    }

    /// Change the session's backend. History is kept as is.
    pub async fn switch_backend(
        &self,
        session_id: SessionId,
        backend: &str,
    ) -> Result<BackendId, EngineError> {
        let mut session = self.lock(session_id).await?;
        self.narrator()
            .switch(session.selection_mut(), backend)
            .inspect_err(|e| warn!(session = %session_id, error = %e, "Backend switch refused"))?;
        Ok(session.active_backend().clone())
    }

    pub async fn save(&self, session_id: SessionId, name: &str) -> Result<SaveInfo, EngineError> {
        let session = self.lock(session_id).await?;
        let info = persist::save_session(self.storage.as_ref(), &session, name).await?;
        info!(session = %session_id, save = %info.name, turns = info.metadata.turns, "Session saved");
        Ok(info)
    }

    /// Load a save into a brand new session.
    pub async fn load(&self, name: &str) -> Result<LoadedSession, EngineError> {
        let (session, save) =
            persist::load_session(self.storage.as_ref(), self.world.clone(), name).await?;
        let loaded = LoadedSession {
            session_id: session.id(),
            save,
            snapshot: session.snapshot(),
        };
        self.insert(session).await;
        info!(session = %loaded.session_id, save = %loaded.save.name, "Session loaded");
        Ok(loaded)
    }

    /// Replace an existing session's state with a save, keeping its id.
    ///
    /// Nothing changes unless the save loads cleanly.
    pub async fn restore(&self, session_id: SessionId, name: &str) -> Result<LoadedSession, EngineError> {
        let mut session = self.lock(session_id).await?;
        let (loaded, save) =
            persist::load_session(self.storage.as_ref(), self.world.clone(), name).await?;
        session.replace_state(loaded);
        info!(session = %session_id, save = %save.name, "Session restored");
        Ok(LoadedSession {
            session_id,
            save,
            snapshot: session.snapshot(),
        })
    }

    /// All saves, newest first.
    pub async fn list_saves(&self) -> Result<Vec<SaveInfo>, EngineError> {
        Ok(persist::list_saves(self.storage.as_ref()).await?)
    }

    pub async fn snapshot(&self, session_id: SessionId) -> Result<StateSnapshot, EngineError> {
        Ok(self.lock(session_id).await?.snapshot())
    }

    /// Forget a session. A command already running on it completes first.
    pub async fn end_session(&self, session_id: SessionId) -> Result<(), EngineError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        let turns = session.lock().await.history().len();
        info!(session = %session_id, turns, "Session ended");
        Ok(())
    }

    /// Drop all sessions and close the narrator's backends.
    pub async fn shutdown(&self) {
        let sessions = std::mem::take(&mut *self.sessions.write().await);
        self.narrator().shutdown().await;
        info!(sessions = sessions.len(), "Engine shut down");
    }

    async fn insert(&self, session: Session) {
        self.sessions
            .write()
            .await
            .insert(session.id(), Arc::new(Mutex::new(session)));
    }

    async fn lock(&self, session_id: SessionId) -> Result<OwnedMutexGuard<Session>, EngineError> {
        let session = self
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(EngineError::SessionNotFound(session_id))?;

        match self.config.busy_policy {
            BusyPolicy::Queue => Ok(session.lock_owned().await),
            BusyPolicy::Reject => session
                .try_lock_owned()
                .map_err(|_| EngineError::SessionBusy(session_id)),
        }
    }
}
