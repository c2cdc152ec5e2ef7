//! The station map: rooms, their exits, and the items placed in them.
//!
//! A [`World`] is template data. It is loaded once, shared between sessions
//! behind an `Arc`, and never mutated afterwards. Runtime item presence lives
//! in each session (see [`crate::session::Session`]).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Identifier of a room (e.g. `"airlock"`).
pub type RoomId = String;

/// Identifier of an item (e.g. `"keycard"`).
pub type ItemId = String;

/// Errors from world lookups and world loading.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("No exit {direction} from {room}")]
    NoExit { room: RoomId, direction: String },

    #[error("Invalid direction: {0:?}")]
    InvalidDirection(String),

    #[error("Room {0} is defined more than once")]
    DuplicateRoom(RoomId),

    #[error("Starting room {0} is not defined")]
    MissingStartRoom(RoomId),

    #[error("Invalid world definition: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Normalize a direction: trim, lowercase, expand short aliases.
///
/// Directions are an open set, but must be non-empty and made of ASCII
/// letters, `-` or `_`.
pub fn normalize_direction(raw: &str) -> Result<String, WorldError> {
    let lowered = raw.trim().to_ascii_lowercase();
    let expanded = match lowered.as_str() {
        "n" => "north",
        "s" => "south",
        "e" => "east",
        "w" => "west",
        "u" => "up",
        "d" => "down",
        "ne" => "northeast",
        "nw" => "northwest",
        "se" => "southeast",
        "sw" => "southwest",
        other => other,
    };

    let valid = !expanded.is_empty()
        && expanded
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == '-' || c == '_');
    if valid {
        Ok(expanded.to_string())
    } else {
        Err(WorldError::InvalidDirection(raw.to_string()))
    }
}

/// Whether a bare word is one of the common compass/vertical directions.
///
/// Used by the command parser to accept `north` without a `go` verb; exits
/// with unusual names still need `go <direction>`.
pub fn is_common_direction(word: &str) -> bool {
    matches!(
        normalize_direction(word).as_deref(),
        Ok("north"
            | "south"
            | "east"
            | "west"
            | "up"
            | "down"
            | "northeast"
            | "northwest"
            | "southeast"
            | "southwest")
    )
}

/// A room template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub description: String,
    /// Direction → destination room.
    #[serde(default)]
    pub exits: BTreeMap<String, RoomId>,
    /// Items initially present.
    #[serde(default)]
    pub items: Vec<ItemId>,
}

impl Room {
    pub fn new(id: impl Into<RoomId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            exits: BTreeMap::new(),
            items: Vec::new(),
        }
    }

    /// Add an exit. The direction is normalized when the room joins a [`World`].
    pub fn with_exit(mut self, direction: impl Into<String>, to: impl Into<RoomId>) -> Self {
        self.exits.insert(direction.into(), to.into());
        self
    }

    pub fn with_item(mut self, item: impl Into<ItemId>) -> Self {
        self.items.push(item.into());
        self
    }

    /// Destination for an already-normalized direction.
    pub fn exit(&self, direction: &str) -> Option<&RoomId> {
        self.exits.get(direction)
    }

    /// Available directions, in sorted order.
    pub fn directions(&self) -> Vec<String> {
        self.exits.keys().cloned().collect()
    }
}

/// On-disk shape of a world definition.
#[derive(Debug, Deserialize)]
struct WorldDef {
    start_room: RoomId,
    rooms: Vec<Room>,
}

/// The read-only room graph.
///
/// Cycles and unreachable rooms are fine. Exits pointing at rooms that do
/// not exist are accepted here and rejected when a player tries to use them.
#[derive(Debug, Clone)]
pub struct World {
    start_room: RoomId,
    rooms: HashMap<RoomId, Room>,
}

impl World {
    /// Build a world, normalizing exit directions.
    pub fn new(
        start_room: impl Into<RoomId>,
        rooms: impl IntoIterator<Item = Room>,
    ) -> Result<Self, WorldError> {
        let start_room = start_room.into();
        let mut map = HashMap::new();

        for mut room in rooms {
            let mut exits = BTreeMap::new();
            for (direction, to) in std::mem::take(&mut room.exits) {
                exits.insert(normalize_direction(&direction)?, to);
            }
            room.exits = exits;

            if map.contains_key(&room.id) {
                return Err(WorldError::DuplicateRoom(room.id));
            }
            map.insert(room.id.clone(), room);
        }

        if !map.contains_key(&start_room) {
            return Err(WorldError::MissingStartRoom(start_room));
        }

        Ok(Self {
            start_room,
            rooms: map,
        })
    }

    /// Load a world from its JSON definition.
    pub fn from_json(bytes: &[u8]) -> Result<Self, WorldError> {
        let def: WorldDef = serde_json::from_slice(bytes)?;
        Self::new(def.start_room, def.rooms)
    }

    /// The built-in Dark Station map.
    pub fn dark_station() -> Self {
        let rooms = vec![
            Room::new(
                "start",
                "You find yourself in the dimly lit reception area of Dark Station. \
                 Emergency lights cast an eerie red glow across abandoned terminals.",
            )
            .with_exit("north", "corridor")
            .with_exit("east", "security")
            .with_item("flashlight"),
            Room::new(
                "corridor",
                "A long corridor stretches before you. Loose cables hang from the ceiling, \
                 occasionally sparking with residual power.",
            )
            .with_exit("south", "start")
            .with_exit("north", "lab"),
            Room::new(
                "security",
                "The security office is a mess of broken monitors and scattered datapads. \
                 A powered-down security robot sits motionless in the corner.",
            )
            .with_exit("west", "start")
            .with_item("keycard"),
            Room::new(
                "lab",
                "This appears to be a research laboratory. Strange equipment lines the walls, \
                 and holographic displays flicker with corrupted data.",
            )
            .with_exit("south", "corridor")
            .with_item("datapad"),
        ];

        match Self::new("start", rooms) {
            Ok(world) => world,
            Err(e) => unreachable!("built-in world is well formed: {e}"),
        }
    }

    pub fn start_room(&self) -> &RoomId {
        &self.start_room
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rooms.contains_key(id)
    }

    pub fn get_room(&self, id: &str) -> Result<&Room, WorldError> {
        self.rooms
            .get(id)
            .ok_or_else(|| WorldError::RoomNotFound(id.to_string()))
    }

    /// Destination reached by leaving `id` towards `direction`.
    ///
    /// The destination itself is not checked for existence.
    pub fn adjacent(&self, id: &str, direction: &str) -> Result<&RoomId, WorldError> {
        let room = self.get_room(id)?;
        let direction = normalize_direction(direction)?;
        room.exit(&direction).ok_or(WorldError::NoExit {
            room: id.to_string(),
            direction,
        })
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn airlock_world() -> World {
        World::new(
            "airlock",
            vec![
                Room::new("airlock", "A cramped airlock.").with_exit("East", "corridor"),
                Room::new("corridor", "A humming corridor.").with_exit("west", "airlock"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_direction() {
        assert_eq!(normalize_direction("  North ").unwrap(), "north");
        assert_eq!(normalize_direction("u").unwrap(), "up");
        assert_eq!(normalize_direction("SW").unwrap(), "southwest");
        assert_eq!(normalize_direction("port-side").unwrap(), "port-side");
        assert!(normalize_direction("").is_err());
        assert!(normalize_direction("north 2").is_err());
        assert!(normalize_direction("!!").is_err());
    }

    #[test]
    fn test_common_directions() {
        assert!(is_common_direction("north"));
        assert!(is_common_direction("D"));
        assert!(!is_common_direction("starboard"));
        assert!(!is_common_direction("look"));
    }

    #[test]
    fn test_adjacent_is_case_insensitive() {
        let world = airlock_world();
        assert_eq!(world.adjacent("airlock", " EAST ").unwrap(), "corridor");
        assert_eq!(world.adjacent("corridor", "w").unwrap(), "airlock");
    }

    #[test]
    fn test_adjacent_without_exit() {
        let world = airlock_world();
        assert!(matches!(
            world.adjacent("airlock", "west"),
            Err(WorldError::NoExit { .. })
        ));
        assert!(matches!(
            world.adjacent("nowhere", "west"),
            Err(WorldError::RoomNotFound(_))
        ));
    }

    #[test]
    fn test_get_room() {
        let world = airlock_world();
        assert_eq!(world.get_room("airlock").unwrap().description, "A cramped airlock.");
        assert!(matches!(
            world.get_room("bridge"),
            Err(WorldError::RoomNotFound(id)) if id == "bridge"
        ));
    }

    #[test]
    fn test_missing_start_room() {
        let result = World::new("bridge", vec![Room::new("airlock", "")]);
        assert!(matches!(result, Err(WorldError::MissingStartRoom(_))));
    }

    #[test]
    fn test_duplicate_room() {
        let result = World::new(
            "airlock",
            vec![Room::new("airlock", "one"), Room::new("airlock", "two")],
        );
        assert!(matches!(result, Err(WorldError::DuplicateRoom(_))));
    }

    #[test]
    fn test_dangling_exit_and_unreachable_room_allowed() {
        let world = World::new(
            "a",
            vec![
                Room::new("a", "").with_exit("north", "missing"),
                Room::new("island", ""),
            ],
        )
        .unwrap();
        assert_eq!(world.adjacent("a", "north").unwrap(), "missing");
        assert!(!world.contains("missing"));
    }

    #[test]
    fn test_from_json() {
        let json = br#"{
            "start_room": "airlock",
            "rooms": [
                {"id": "airlock", "description": "Cold.", "exits": {"E": "corridor"}, "items": ["helmet"]},
                {"id": "corridor", "description": "Dark."}
            ]
        }"#;
        let world = World::from_json(json).unwrap();
        assert_eq!(world.len(), 2);
        assert_eq!(world.adjacent("airlock", "east").unwrap(), "corridor");
        assert_eq!(world.get_room("airlock").unwrap().items, vec!["helmet"]);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(World::from_json(b"{nope"), Err(WorldError::Parse(_))));
    }

    #[test]
    fn test_dark_station_layout() {
        let world = World::dark_station();
        assert_eq!(world.start_room(), "start");
        assert_eq!(world.adjacent("start", "north").unwrap(), "corridor");
        assert_eq!(world.adjacent("corridor", "north").unwrap(), "lab");
        assert_eq!(world.adjacent("security", "west").unwrap(), "start");
        assert_eq!(
            world.get_room("start").unwrap().directions(),
            vec!["east".to_string(), "north".to_string()]
        );
    }
}
