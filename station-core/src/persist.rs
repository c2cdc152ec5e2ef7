//! Save/load of sessions.
//!
//! Saves are pretty-printed JSON with a format version. Loading validates
//! the record against the world it is loaded into; anything inconsistent is
//! reported as [`PersistError::Corrupt`] and never half-applied.

use crate::ai::BackendId;
use crate::history::ConversationHistory;
use crate::player::{CharacterClass, Player, MAX_STAT};
use crate::session::Session;
use crate::world::{ItemId, RoomId, World};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

const MAX_NAME_LEN: usize = 64;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("No save named {0}")]
    NotFound(String),

    #[error("Save {name} is corrupt: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("Invalid save name {0:?}: use 1-64 letters, digits, '-' or '_'")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PersistError {
    fn corrupt(name: &str, reason: impl Into<String>) -> Self {
        PersistError::Corrupt {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Check a save name, stripping an optional `.json` suffix.
pub fn validate_name(raw: &str) -> Result<String, PersistError> {
    let trimmed = raw.trim();
    let name = trimmed.strip_suffix(".json").unwrap_or(trimmed);
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(name.to_string())
    } else {
        Err(PersistError::InvalidName(raw.to_string()))
    }
}

/// Summary stored alongside the session for cheap listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub room: RoomId,
    pub level: u32,
    pub class: Option<CharacterClass>,
    pub turns: usize,
    pub saved_at: DateTime<Utc>,
}

/// A listed save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveInfo {
    pub name: String,
    pub metadata: SaveMetadata,
}

/// The persisted part of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    player: Player,
    history: ConversationHistory,
    active_backend: BackendId,
    #[serde(default)]
    room_items: BTreeMap<RoomId, Vec<ItemId>>,
    created_at: DateTime<Utc>,
}

/// A complete save file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SaveRecord {
    version: u32,
    name: String,
    metadata: SaveMetadata,
    session: SessionRecord,
}

/// Serialize a session under `name`.
pub fn serialize_session(session: &Session, name: &str) -> Result<(Vec<u8>, SaveInfo), PersistError> {
    let name = validate_name(name)?;
    let player = session.player();
    let metadata = SaveMetadata {
        room: player.current_room().clone(),
        level: player.level(),
        class: player.character_class(),
        turns: session.history().len(),
        saved_at: Utc::now(),
    };
    let record = SaveRecord {
        version: SAVE_VERSION,
        name: name.clone(),
        metadata: metadata.clone(),
        session: SessionRecord {
            player: player.clone(),
            history: session.history().clone(),
            active_backend: session.active_backend().clone(),
            room_items: session.room_items().clone(),
            created_at: session.created_at(),
        },
    };
    let bytes = serde_json::to_vec_pretty(&record).map_err(std::io::Error::from)?;
    Ok((bytes, SaveInfo { name, metadata }))
}

/// Rebuild a session from save bytes, validated against `world`.
///
/// The restored session gets a fresh id.
pub fn deserialize_session(
    bytes: &[u8],
    name: &str,
    world: Arc<World>,
) -> Result<(Session, SaveInfo), PersistError> {
    let record: SaveRecord =
        serde_json::from_slice(bytes).map_err(|e| PersistError::corrupt(name, e.to_string()))?;

    if record.version != SAVE_VERSION {
        return Err(PersistError::corrupt(
            name,
            format!(
                "version mismatch: expected {SAVE_VERSION}, found {}",
                record.version
            ),
        ));
    }

    let session = record.session;
    let player = &session.player;
    if !world.contains(player.current_room()) {
        return Err(PersistError::corrupt(
            name,
            format!("room {} does not exist", player.current_room()),
        ));
    }
    if let Some(room) = session.room_items.keys().find(|room| !world.contains(room)) {
        return Err(PersistError::corrupt(
            name,
            format!("items recorded for unknown room {room}"),
        ));
    }
    match session.history.max_turns() {
        Some(0) => return Err(PersistError::corrupt(name, "history cap of zero turns")),
        Some(max) if session.history.len() > max => {
            return Err(PersistError::corrupt(
                name,
                format!(
                    "history holds {} turns, over its cap of {max}",
                    session.history.len()
                ),
            ));
        }
        _ => {}
    }
    if player.health() > MAX_STAT || player.energy() > MAX_STAT || player.level() == 0 {
        return Err(PersistError::corrupt(
            name,
            format!("stats out of range ({})", player.stats()),
        ));
    }

    let info = SaveInfo {
        name: name.to_string(),
        metadata: record.metadata,
    };
    let session = Session::from_parts(
        world,
        session.player,
        session.history,
        session.active_backend,
        session.room_items,
        session.created_at,
    );
    Ok((session, info))
}

/// Read just the metadata of a save stored under `name`.
///
/// The listed name is the storage key, not the name recorded inside.
pub fn peek_metadata(bytes: &[u8], name: &str) -> Result<SaveInfo, PersistError> {
    #[derive(Deserialize)]
    struct Partial {
        version: u32,
        metadata: SaveMetadata,
    }

    let partial: Partial =
        serde_json::from_slice(bytes).map_err(|e| PersistError::corrupt(name, e.to_string()))?;
    if partial.version != SAVE_VERSION {
        return Err(PersistError::corrupt(
            name,
            format!("version mismatch: found {}", partial.version),
        ));
    }
    Ok(SaveInfo {
        name: name.to_string(),
        metadata: partial.metadata,
    })
}

/// A byte-level store of named saves.
#[async_trait]
pub trait SaveStorage: Send + Sync {
    /// Store `bytes` under `name`, replacing any existing save.
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), PersistError>;

    /// Fails with [`PersistError::NotFound`] if there is no such save.
    async fn read(&self, name: &str) -> Result<Vec<u8>, PersistError>;

    /// Names of all stored saves. Empty if nothing was ever saved.
    async fn names(&self) -> Result<Vec<String>, PersistError>;
}

/// Saves as `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl SaveStorage for FileStorage {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir).await?;
        // Unique per write so concurrent saves under one name never share it.
        let tmp = self.dir.join(format!(".{name}.{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, self.path(name)).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, PersistError> {
        match fs::read(self.path(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PersistError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn names(&self) -> Result<Vec<String>, PersistError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    if validate_name(stem).is_ok() {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        Ok(names)
    }
}

/// In-process storage, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    saves: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SaveStorage for MemoryStorage {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), PersistError> {
        self.saves
            .write()
            .await
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, PersistError> {
        self.saves
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| PersistError::NotFound(name.to_string()))
    }

    async fn names(&self) -> Result<Vec<String>, PersistError> {
        Ok(self.saves.read().await.keys().cloned().collect())
    }
}

/// Save `session` under `name`, overwriting any save with that name.
pub async fn save_session(
    storage: &dyn SaveStorage,
    session: &Session,
    name: &str,
) -> Result<SaveInfo, PersistError> {
    let (bytes, info) = serialize_session(session, name)?;
    storage.write(&info.name, &bytes).await?;
    debug!(save = %info.name, bytes = bytes.len(), "Wrote save");
    Ok(info)
}

/// Load the save called `name` into a new session.
pub async fn load_session(
    storage: &dyn SaveStorage,
    world: Arc<World>,
    name: &str,
) -> Result<(Session, SaveInfo), PersistError> {
    let name = validate_name(name)?;
    let bytes = storage.read(&name).await?;
    deserialize_session(&bytes, &name, world)
}

/// All readable saves, newest first. Unreadable entries are skipped.
pub async fn list_saves(storage: &dyn SaveStorage) -> Result<Vec<SaveInfo>, PersistError> {
    let mut saves = Vec::new();
    for name in storage.names().await? {
        let peeked = match storage.read(&name).await {
            Ok(bytes) => peek_metadata(&bytes, &name),
            Err(e) => Err(e),
        };
        match peeked {
            Ok(info) => saves.push(info),
            Err(e) => warn!(save = %name, error = %e, "Skipping unreadable save"),
        }
    }

    saves.sort_by(|a, b| {
        b.metadata
            .saved_at
            .cmp(&a.metadata.saved_at)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(saves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::airlock_world;

    fn session() -> Session {
        Session::new(Arc::new(airlock_world()), "claude", None)
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("slot_1").unwrap(), "slot_1");
        assert_eq!(validate_name("before-boss.json").unwrap(), "before-boss");
        assert!(matches!(validate_name("bad*name"), Err(PersistError::InvalidName(_))));
        assert!(validate_name("").is_err());
        assert!(validate_name(".json").is_err());
        assert!(validate_name("../etc/passwd").is_err());
        assert!(validate_name(&"a".repeat(65)).is_err());
        assert!(validate_name(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_round_trip_restores_state() {
        let mut original = session();
        original.take("helmet").unwrap();
        original.go("east").unwrap();
        original.history_mut().push_player("go east");
        original.history_mut().push_narrator("You move east.");

        let (bytes, info) = serialize_session(&original, "slot").unwrap();
        assert_eq!(info.metadata.room, "corridor");
        assert_eq!(info.metadata.turns, 2);

        let (restored, _) = deserialize_session(&bytes, "slot", original.world().clone()).unwrap();
        assert_eq!(restored.player(), original.player());
        assert_eq!(restored.history(), original.history());
        assert_eq!(restored.room_items(), original.room_items());
        assert_eq!(restored.active_backend(), original.active_backend());
        assert_ne!(restored.id(), original.id());
    }

    #[test]
    fn test_unknown_room_is_corrupt() {
        let (bytes, _) = serialize_session(&session(), "slot").unwrap();
        let other = World::new("bridge", vec![crate::world::Room::new("bridge", "")]).unwrap();

        let result = deserialize_session(&bytes, "slot", Arc::new(other));
        assert!(matches!(result, Err(PersistError::Corrupt { .. })));
    }

    #[test]
    fn test_version_mismatch_is_corrupt() {
        let (bytes, _) = serialize_session(&session(), "slot").unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["version"] = serde_json::json!(99);
        let bytes = serde_json::to_vec(&value).unwrap();

        let result = deserialize_session(&bytes, "slot", Arc::new(airlock_world()));
        assert!(matches!(result, Err(PersistError::Corrupt { reason, .. }) if reason.contains("version")));
    }

    #[test]
    fn test_out_of_range_stats_are_corrupt() {
        let (bytes, _) = serialize_session(&session(), "slot").unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["session"]["player"]["health"] = serde_json::json!(150);
        let bytes = serde_json::to_vec(&value).unwrap();

        let result = deserialize_session(&bytes, "slot", Arc::new(airlock_world()));
        assert!(matches!(result, Err(PersistError::Corrupt { .. })));
    }

    fn with_history_cap(cap: serde_json::Value) -> Vec<u8> {
        let mut session = session();
        session.history_mut().push_player("look");
        session.history_mut().push_narrator("Dim lights.");
        let (bytes, _) = serialize_session(&session, "slot").unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["session"]["history"]["max_turns"] = cap;
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_zero_history_cap_is_corrupt() {
        let result = deserialize_session(&with_history_cap(serde_json::json!(0)), "slot", Arc::new(airlock_world()));
        assert!(matches!(result, Err(PersistError::Corrupt { reason, .. }) if reason.contains("zero")));
    }

    #[test]
    fn test_history_over_its_cap_is_corrupt() {
        let result = deserialize_session(&with_history_cap(serde_json::json!(1)), "slot", Arc::new(airlock_world()));
        assert!(matches!(result, Err(PersistError::Corrupt { reason, .. }) if reason.contains("over its cap")));

        let (restored, _) =
            deserialize_session(&with_history_cap(serde_json::json!(2)), "slot", Arc::new(airlock_world()))
                .unwrap();
        assert_eq!(restored.history().len(), 2);
    }

    #[test]
    fn test_listing_uses_storage_key() {
        let (bytes, _) = serialize_session(&session(), "original").unwrap();
        let info = peek_metadata(&bytes, "copied").unwrap();
        assert_eq!(info.name, "copied");

        let (_, info) = deserialize_session(&bytes, "copied", Arc::new(airlock_world())).unwrap();
        assert_eq!(info.name, "copied");
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let result = deserialize_session(b"{ not json", "slot", Arc::new(airlock_world()));
        assert!(matches!(result, Err(PersistError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_memory_storage_overwrite_and_listing() {
        let storage = MemoryStorage::new();
        let mut session = session();

        save_session(&storage, &session, "slot").await.unwrap();
        session.go("east").unwrap();
        save_session(&storage, &session, "slot.json").await.unwrap();
        storage.write("broken", b"nope").await.unwrap();

        let saves = list_saves(&storage).await.unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].metadata.room, "corridor");

        assert!(matches!(
            load_session(&storage, session.world().clone(), "missing").await,
            Err(PersistError::NotFound(_))
        ));
    }
}
