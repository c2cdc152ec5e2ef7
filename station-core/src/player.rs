//! Player state and the rules that keep it consistent.
//!
//! Every mutation here is all-or-nothing: a failing operation returns a
//! [`StateError`] and leaves the player exactly as it was.

use crate::world::{ItemId, RoomId, World};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Upper bound for health and energy.
pub const MAX_STAT: u8 = 100;

/// State-integrity violations. All are recovered locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("There is no room at {0}")]
    InvalidRoom(String),

    #[error("You don't have {0}")]
    ItemNotFound(ItemId),

    #[error("Invalid stat change: {0}")]
    InvalidDelta(String),
}

/// The closed set of playable classes.
///
/// A class only flavours the narration; it never changes game rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterClass {
    Cybernetic,
    Psionic,
    Hunter,
}

impl CharacterClass {
    pub const ALL: [CharacterClass; 3] = [
        CharacterClass::Cybernetic,
        CharacterClass::Psionic,
        CharacterClass::Hunter,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CharacterClass::Cybernetic => "cybernetic",
            CharacterClass::Psionic => "psionic",
            CharacterClass::Hunter => "hunter",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|class| class.name().eq_ignore_ascii_case(name))
    }

    pub fn description(&self) -> &'static str {
        match self {
            CharacterClass::Cybernetic => "Enhanced with advanced technology and neural interfaces",
            CharacterClass::Psionic => "Gifted with psychic abilities and enhanced perception",
            CharacterClass::Hunter => "Skilled in survival, tracking, and combat techniques",
        }
    }

    /// Narration style added to the AI framing for this class.
    pub fn prompt_modifier(&self) -> &'static str {
        match self {
            CharacterClass::Cybernetic => {
                "Use technical, precise language. Reference cybernetic enhancements \
                 and technological solutions. Interface with station systems."
            }
            CharacterClass::Psionic => {
                "Use mystical, ethereal language. Reference psychic phenomena \
                 and emotional undercurrents. Sense station mysteries."
            }
            CharacterClass::Hunter => {
                "Use tactical, survival-focused language. Reference tracking, \
                 stealth, and resource management. Analyze station threats."
            }
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A requested change to the player's stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatDelta {
    pub health: i32,
    pub energy: i32,
    pub level: i32,
    pub experience: i64,
}

impl StatDelta {
    pub fn health(amount: i32) -> Self {
        Self {
            health: amount,
            ..Self::default()
        }
    }

    pub fn energy(amount: i32) -> Self {
        Self {
            energy: amount,
            ..Self::default()
        }
    }

    pub fn level(amount: i32) -> Self {
        Self {
            level: amount,
            ..Self::default()
        }
    }

    pub fn experience(amount: i64) -> Self {
        Self {
            experience: amount,
            ..Self::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Read-only view of the numeric stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub health: u8,
    pub energy: u8,
    pub level: u32,
    pub experience: u64,
}

impl fmt::Display for PlayerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "health {}/{MAX_STAT}, energy {}/{MAX_STAT}, level {}, experience {}",
            self.health, self.energy, self.level, self.experience
        )
    }
}

/// The player character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    health: u8,
    energy: u8,
    level: u32,
    experience: u64,
    character_class: Option<CharacterClass>,
    inventory: Vec<ItemId>,
    current_room: RoomId,
}

impl Player {
    /// A fresh player standing in `start_room`.
    pub fn new(start_room: impl Into<RoomId>) -> Self {
        Self {
            health: MAX_STAT,
            energy: MAX_STAT,
            level: 1,
            experience: 0,
            character_class: None,
            inventory: Vec::new(),
            current_room: start_room.into(),
        }
    }

    pub fn health(&self) -> u8 {
        self.health
    }

    pub fn energy(&self) -> u8 {
        self.energy
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn experience(&self) -> u64 {
        self.experience
    }

    pub fn stats(&self) -> PlayerStats {
        PlayerStats {
            health: self.health,
            energy: self.energy,
            level: self.level,
            experience: self.experience,
        }
    }

    pub fn character_class(&self) -> Option<CharacterClass> {
        self.character_class
    }

    pub fn set_class(&mut self, class: CharacterClass) {
        self.character_class = Some(class);
    }

    pub fn inventory(&self) -> &[ItemId] {
        &self.inventory
    }

    pub fn current_room(&self) -> &RoomId {
        &self.current_room
    }

    /// Apply a stat delta, returning the updated player.
    ///
    /// Health and energy are clamped to `0..=100`. Level may only go up and
    /// experience may not drop below zero; either violation is rejected.
    pub fn apply_delta(&self, delta: StatDelta) -> Result<Player, StateError> {
        if delta.level < 0 {
            return Err(StateError::InvalidDelta(format!(
                "level cannot decrease (requested {})",
                delta.level
            )));
        }
        let level = self
            .level
            .checked_add(delta.level as u32)
            .ok_or_else(|| StateError::InvalidDelta("level overflow".to_string()))?;

        let experience = i128::from(self.experience) + i128::from(delta.experience);
        if experience < 0 {
            return Err(StateError::InvalidDelta(format!(
                "experience cannot drop below zero ({} {:+})",
                self.experience, delta.experience
            )));
        }
        let experience = u64::try_from(experience)
            .map_err(|_| StateError::InvalidDelta("experience overflow".to_string()))?;

        Ok(Player {
            health: clamp_stat(self.health, delta.health),
            energy: clamp_stat(self.energy, delta.energy),
            level,
            experience,
            ..self.clone()
        })
    }

    pub fn add_item(&mut self, item: impl Into<ItemId>) {
        self.inventory.push(item.into());
    }

    /// Remove the first occurrence of `item`.
    pub fn remove_item(&mut self, item: &str) -> Result<ItemId, StateError> {
        let index = self
            .inventory
            .iter()
            .position(|held| held == item)
            .ok_or_else(|| StateError::ItemNotFound(item.to_string()))?;
        Ok(self.inventory.remove(index))
    }

    /// Find a held item by case-insensitive name.
    pub fn find_item(&self, name: &str) -> Option<&ItemId> {
        let name = name.trim();
        self.inventory
            .iter()
            .find(|held| held.eq_ignore_ascii_case(name))
    }

    /// Move to `room`, which must exist in `world`.
    pub fn move_to(&mut self, world: &World, room: &str) -> Result<(), StateError> {
        if !world.contains(room) {
            return Err(StateError::InvalidRoom(room.to_string()));
        }
        self.current_room = room.to_string();
        Ok(())
    }
}

fn clamp_stat(current: u8, delta: i32) -> u8 {
    (i64::from(current) + i64::from(delta)).clamp(0, i64::from(MAX_STAT)) as u8
}
