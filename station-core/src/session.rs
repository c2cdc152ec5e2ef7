//! Session - one player's game in progress.
//!
//! A session owns its player, its conversation history, the backend it
//! talks to, and the items that have moved since the world was loaded. The
//! world itself is shared and read-only.

use crate::ai::{BackendId, BackendSelection, NarrativeContext};
use crate::history::ConversationHistory;
use crate::player::{CharacterClass, Player, StatDelta, StateError};
use crate::world::{normalize_direction, ItemId, Room, RoomId, World, WorldError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a session.
pub type SessionId = Uuid;

/// Everything a transport layer needs to render the current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub room: RoomId,
    pub description: String,
    pub exits: Vec<String>,
    pub items_here: Vec<ItemId>,
    pub health: u8,
    pub energy: u8,
    pub level: u32,
    pub experience: u64,
    pub class: Option<CharacterClass>,
    pub inventory: Vec<ItemId>,
    pub active_backend: BackendId,
    pub turn_count: usize,
}

/// A live game session.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    world: Arc<World>,
    player: Player,
    history: ConversationHistory,
    selection: BackendSelection,
    /// Rooms whose item list differs from the world template.
    room_items: BTreeMap<RoomId, Vec<ItemId>>,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Start a fresh game at the world's starting room.
    ///
    /// `max_turns` caps the stored history; `None` keeps every turn.
    pub fn new(
        world: Arc<World>,
        backend: impl Into<BackendId>,
        max_turns: Option<usize>,
    ) -> Self {
        let player = Player::new(world.start_room().clone());
        Self {
            id: Uuid::new_v4(),
            world,
            player,
            history: max_turns
                .map_or_else(ConversationHistory::new, ConversationHistory::with_max_turns),
            selection: BackendSelection::new(backend),
            room_items: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Reassemble a session from already-validated parts.
    pub(crate) fn from_parts(
        world: Arc<World>,
        player: Player,
        history: ConversationHistory,
        active_backend: BackendId,
        room_items: BTreeMap<RoomId, Vec<ItemId>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            world,
            player,
            history,
            selection: BackendSelection::new(active_backend),
            room_items,
            created_at,
        }
    }

    /// Take over the game state of `loaded`, keeping this session's id.
    pub(crate) fn replace_state(&mut self, loaded: Session) {
        let id = self.id;
        *self = Session { id, ..loaded };
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut ConversationHistory {
        &mut self.history
    }

    pub fn selection(&self) -> &BackendSelection {
        &self.selection
    }

    pub(crate) fn selection_mut(&mut self) -> &mut BackendSelection {
        &mut self.selection
    }

    pub fn active_backend(&self) -> &BackendId {
        &self.selection.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The item overlay: only rooms that changed.
    pub fn room_items(&self) -> &BTreeMap<RoomId, Vec<ItemId>> {
        &self.room_items
    }

    /// The room the player stands in.
    pub fn current_room(&self) -> Result<&Room, StateError> {
        let id = self.player.current_room();
        self.world
            .get_room(id)
            .map_err(|_| StateError::InvalidRoom(id.clone()))
    }

    /// Items currently lying in `room`.
    pub fn items_in(&self, room: &str) -> Vec<ItemId> {
        match self.room_items.get(room) {
            Some(items) => items.clone(),
            None => self
                .world
                .get_room(room)
                .map(|room| room.items.clone())
                .unwrap_or_default(),
        }
    }

    pub fn items_here(&self) -> Vec<ItemId> {
        self.items_in(self.player.current_room())
    }

    /// The welcome text shown when a session starts.
    pub fn opening_text(&self) -> String {
        let mut text = String::from(
            "Welcome to Dark Station Chronicles!\n\n\
             In the depths of space, aboard an abandoned research station, your story begins. \
             Choose your path carefully as you uncover the mysteries that lie within.\n\n\
             Available character classes:\n",
        );
        for class in CharacterClass::ALL {
            let name = class.name();
            let mut chars = name.chars();
            let title: String = chars
                .next()
                .map(|first| first.to_ascii_uppercase())
                .into_iter()
                .chain(chars)
                .collect();
            text.push_str(&format!("- {title}: {}\n", class.description()));
        }
        text.push_str(
            "\nTo begin, select your class with the command: /select-class [classname]\n\
             Example: /select-class cybernetic\n\n",
        );
        if let Ok(room) = self.current_room() {
            text.push_str(&room.description);
        }
        text
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let (description, exits) = match self.current_room() {
            Ok(room) => (room.description.clone(), room.directions()),
            Err(_) => (String::new(), Vec::new()),
        };
        let stats = self.player.stats();
        StateSnapshot {
            room: self.player.current_room().clone(),
            description,
            exits,
            items_here: self.items_here(),
            health: stats.health,
            energy: stats.energy,
            level: stats.level,
            experience: stats.experience,
            class: self.player.character_class(),
            inventory: self.player.inventory().to_vec(),
            active_backend: self.selection.active.clone(),
            turn_count: self.history.len(),
        }
    }

    /// What the narrator sees for `command`, with the last `window` exchanges.
    pub fn narrative_context(&self, command: &str, window: usize) -> NarrativeContext {
        let (room_description, exits) = match self.current_room() {
            Ok(room) => (room.description.clone(), room.directions()),
            Err(_) => (String::new(), Vec::new()),
        };
        NarrativeContext {
            character_class: self.player.character_class(),
            room_id: self.player.current_room().clone(),
            room_description,
            exits,
            items_here: self.items_here(),
            stats: self.player.stats(),
            inventory: self.player.inventory().to_vec(),
            history: self.history.recent_exchanges(window),
            command: command.to_string(),
        }
    }

    /// Move through an exit. Returns the normalized direction.
    ///
    /// A malformed direction, a missing exit and an exit leading to a room
    /// that does not exist are all [`StateError::InvalidRoom`]; the player
    /// does not move.
    pub fn go(&mut self, direction: &str) -> Result<String, StateError> {
        let direction = normalize_direction(direction)
            .map_err(|_| StateError::InvalidRoom(direction.trim().to_string()))?;
        let destination = match self.world.adjacent(self.player.current_room(), &direction) {
            Ok(destination) => destination.clone(),
            Err(WorldError::NoExit { direction, .. }) => {
                return Err(StateError::InvalidRoom(direction))
            }
            Err(_) => return Err(StateError::InvalidRoom(self.player.current_room().clone())),
        };
        self.player.move_to(&self.world, &destination)?;
        Ok(direction)
    }

    /// Pick up an item from the current room (case-insensitive).
    pub fn take(&mut self, item: &str) -> Result<ItemId, StateError> {
        let room = self.player.current_room().clone();
        let mut items = self.items_in(&room);
        let index = items
            .iter()
            .position(|here| here.eq_ignore_ascii_case(item.trim()))
            .ok_or_else(|| StateError::ItemNotFound(item.trim().to_string()))?;

        let taken = items.remove(index);
        self.player.add_item(taken.clone());
        self.room_items.insert(room, items);
        Ok(taken)
    }

    /// Drop a held item into the current room (case-insensitive).
    pub fn drop_item(&mut self, item: &str) -> Result<ItemId, StateError> {
        let held = self
            .player
            .find_item(item)
            .cloned()
            .ok_or_else(|| StateError::ItemNotFound(item.trim().to_string()))?;

        let room = self.player.current_room().clone();
        let mut items = self.items_in(&room);
        let dropped = self.player.remove_item(&held)?;
        items.push(dropped.clone());
        self.room_items.insert(room, items);
        Ok(dropped)
    }

    pub fn select_class(&mut self, class: CharacterClass) {
        self.player.set_class(class);
    }

    /// Apply a stat delta; on error the player is unchanged.
    pub fn apply_delta(&mut self, delta: StatDelta) -> Result<(), StateError> {
        self.player = self.player.apply_delta(delta)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let world = World::new(
            "airlock",
            vec![
                Room::new("airlock", "A cramped airlock.")
                    .with_exit("east", "corridor")
                    .with_exit("down", "void")
                    .with_item("helmet"),
                Room::new("corridor", "A humming corridor.").with_exit("west", "airlock"),
            ],
        )
        .unwrap();
        Session::new(Arc::new(world), "claude", None)
    }

    #[test]
    fn test_go_moves_through_exit() {
        let mut session = session();
        assert_eq!(session.go("E").unwrap(), "east");
        assert_eq!(session.player().current_room(), "corridor");
    }

    #[test]
    fn test_go_without_exit_stays_put() {
        let mut session = session();
        assert_eq!(
            session.go("west"),
            Err(StateError::InvalidRoom("west".to_string()))
        );
        assert_eq!(session.player().current_room(), "airlock");
    }

    #[test]
    fn test_go_through_dangling_exit_is_rejected() {
        let mut session = session();
        assert!(matches!(session.go("down"), Err(StateError::InvalidRoom(_))));
        assert_eq!(session.player().current_room(), "airlock");
    }

    #[test]
    fn test_go_with_malformed_direction() {
        let mut session = session();
        assert!(matches!(session.go("#!"), Err(StateError::InvalidRoom(_))));
    }

    #[test]
    fn test_take_and_drop_move_items_between_room_and_inventory() {
        let mut session = session();

        assert_eq!(session.take("HELMET").unwrap(), "helmet");
        assert!(session.items_here().is_empty());
        assert_eq!(session.player().inventory(), ["helmet"]);
        // The shared world template is untouched.
        assert_eq!(session.world().get_room("airlock").unwrap().items, vec!["helmet"]);

        session.go("east").unwrap();
        assert_eq!(session.drop_item("helmet").unwrap(), "helmet");
        assert_eq!(session.items_here(), vec!["helmet"]);
        assert!(session.player().inventory().is_empty());
    }

    #[test]
    fn test_take_missing_item_changes_nothing() {
        let mut session = session();
        assert_eq!(
            session.take("keycard"),
            Err(StateError::ItemNotFound("keycard".to_string()))
        );
        assert!(session.room_items().is_empty());
        assert!(session.player().inventory().is_empty());
        assert!(session.drop_item("helmet").is_err());
    }

    #[test]
    fn test_snapshot() {
        let mut session = session();
        session.select_class(CharacterClass::Hunter);
        session.history_mut().push_player("look");

        let snapshot = session.snapshot();
        assert_eq!(snapshot.room, "airlock");
        assert_eq!(snapshot.exits, vec!["down".to_string(), "east".to_string()]);
        assert_eq!(snapshot.items_here, vec!["helmet".to_string()]);
        assert_eq!(snapshot.class, Some(CharacterClass::Hunter));
        assert_eq!(snapshot.active_backend.as_str(), "claude");
        assert_eq!(snapshot.turn_count, 1);
        assert_eq!(snapshot.health, 100);
    }

    #[test]
    fn test_narrative_context_uses_window() {
        let mut session = session();
        for i in 0..5 {
            session.history_mut().push_player(format!("command {i}"));
            session.history_mut().push_narrator(format!("reply {i}"));
        }
        let context = session.narrative_context("look", 2);
        assert_eq!(context.history.len(), 4);
        assert_eq!(context.history[0].text, "command 3");
        assert_eq!(context.command, "look");
        assert_eq!(context.room_description, "A cramped airlock.");
    }

    #[test]
    fn test_opening_text() {
        let text = session().opening_text();
        assert!(text.starts_with("Welcome to Dark Station Chronicles!"));
        assert!(text.contains("- Psionic: Gifted with psychic abilities"));
        assert!(text.contains("/select-class [classname]"));
        assert!(text.ends_with("A cramped airlock."));
    }

    #[test]
    fn test_replace_state_keeps_id() {
        let mut session = session();
        let id = session.id();
        let mut other = self::session();
        other.go("east").unwrap();

        session.replace_state(other);
        assert_eq!(session.id(), id);
        assert_eq!(session.player().current_room(), "corridor");
    }
}
