//! Prompt construction.
//!
//! Building a prompt is pure: the same framing and context always produce
//! the same [`Prompt`]. Nothing time-dependent goes into it.

use super::backend::NarrativeContext;
use crate::history::Role;
use std::fmt::Write;

/// Base framing shared by every session.
pub const DEFAULT_FRAMING: &str = include_str!("prompts/framing.txt");

/// A provider-neutral prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Framing plus the class style modifier.
    pub system: String,
    /// Recent interactions, current state and the player's input.
    pub user: String,
}

impl Prompt {
    /// Single-block dialogue form for models without a system channel.
    pub fn flatten(&self) -> String {
        format!("{}\n\nHuman: {}\n\nAssistant:", self.system, self.user)
    }
}

/// Turns a [`NarrativeContext`] into a [`Prompt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    framing: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_FRAMING)
    }
}

impl PromptBuilder {
    pub fn new(framing: impl Into<String>) -> Self {
        Self {
            framing: framing.into().trim().to_string(),
        }
    }

    pub fn framing(&self) -> &str {
        &self.framing
    }

    pub fn build(&self, context: &NarrativeContext) -> Prompt {
        let mut system = self.framing.clone();
        if let Some(class) = context.character_class {
            let _ = write!(
                system,
                "\n\nThe player is a {class} character. {}",
                class.prompt_modifier()
            );
        }

        let mut user = String::new();

        if !context.history.is_empty() {
            user.push_str("Recent interactions:\n");
            for turn in &context.history {
                let speaker = match turn.role {
                    Role::Player => "Player",
                    Role::Narrator => "Response",
                };
                let _ = writeln!(user, "{speaker}: {}", turn.text);
            }
            user.push('\n');
        }

        user.push_str("Current game state:\n");
        let _ = writeln!(
            user,
            "- Location: {}: {}",
            context.room_id, context.room_description
        );
        let _ = writeln!(user, "- Exits: {}", list_or_none(&context.exits));
        let _ = writeln!(user, "- Items here: {}", list_or_none(&context.items_here));
        let _ = writeln!(user, "- Player stats: {}", context.stats);
        let _ = writeln!(user, "- Inventory: {}", list_or_none(&context.inventory));
        let _ = write!(user, "\nPlayer input: {}", context.command);

        Prompt { system, user }
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
