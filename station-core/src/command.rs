//! Command classification.
//!
//! Only the state-changing verbs are parsed strictly. Anything the parser
//! does not recognise becomes [`Command::Narrative`] and is handed to the AI
//! narrator with the raw text, since the narrator is expected to interpret
//! free-form input.

use crate::player::CharacterClass;
use crate::world::is_common_direction;
use thiserror::Error;

const GO_USAGE: &str = "Usage: go <direction> (for example: go north)";
const TAKE_USAGE: &str = "Usage: take <item>";
const DROP_USAGE: &str = "Usage: drop <item>";
const CLASS_USAGE: &str = "Invalid class. Choose from: cybernetic, psionic, or hunter.";
const EMPTY_USAGE: &str = "Type a command, or `help` for a list of commands.";

/// A deterministic verb was used without the argument it needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{usage}")]
    InvalidCommand { usage: String },
}

impl CommandError {
    fn usage(usage: &str) -> Self {
        CommandError::InvalidCommand {
            usage: usage.to_string(),
        }
    }
}

/// A classified player command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Go { direction: String },
    Inventory,
    Stats,
    Take { item: String },
    Drop { item: String },
    SelectClass(CharacterClass),
    Help,
    /// Free text for the narrator (includes `look`).
    Narrative(String),
}

impl Command {
    /// Classify raw player input.
    pub fn parse(raw: &str) -> Result<Command, CommandError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(CommandError::usage(EMPTY_USAGE));
        }

        let lowered = text.to_lowercase();
        let (verb, rest) = match lowered.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (lowered.as_str(), ""),
        };
        // Arguments keep the player's casing; lookups are case-insensitive.
        let arg = text
            .split_once(char::is_whitespace)
            .map_or("", |(_, rest)| rest.trim());

        let command = match verb {
            "go" | "move" | "walk" => {
                if rest.is_empty() {
                    return Err(CommandError::usage(GO_USAGE));
                }
                if rest.contains(char::is_whitespace) {
                    // "go talk to the robot" is prose, not a direction.
                    Command::Narrative(text.to_string())
                } else {
                    Command::Go {
                        direction: rest.to_string(),
                    }
                }
            }
            "inventory" | "inv" | "i" if rest.is_empty() => Command::Inventory,
            "stats" | "status" if rest.is_empty() => Command::Stats,
            "examine" | "x" if rest == "self" || rest == "me" => Command::Stats,
            "take" | "get" => item_command(arg, TAKE_USAGE, |item| Command::Take { item })?,
            "pick" if rest == "up" || rest.starts_with("up ") => {
                let item = arg.get(2..).unwrap_or_default().trim();
                item_command(item, TAKE_USAGE, |item| Command::Take { item })?
            }
            "drop" => item_command(arg, DROP_USAGE, |item| Command::Drop { item })?,
            "/select-class" => match rest.split_whitespace().last() {
                Some(name) => match CharacterClass::from_name(name) {
                    Some(class) => Command::SelectClass(class),
                    None => return Err(CommandError::usage(CLASS_USAGE)),
                },
                None => return Err(CommandError::usage(CLASS_USAGE)),
            },
            "help" | "?" | "commands" if rest.is_empty() => Command::Help,
            word if rest.is_empty() && is_common_direction(word) => Command::Go {
                direction: word.to_string(),
            },
            _ => Command::Narrative(text.to_string()),
        };

        Ok(command)
    }
}

fn item_command(
    item: &str,
    usage: &str,
    build: impl FnOnce(String) -> Command,
) -> Result<Command, CommandError> {
    if item.is_empty() {
        Err(CommandError::usage(usage))
    } else {
        Ok(build(item.to_string()))
    }
}

/// The list of deterministic commands shown by `help`.
pub fn help_text() -> String {
    [
        "Commands:",
        "  go <direction>        - move (north, south, east, west, up, down; n/s/e/w/u/d also work)",
        "  take <item>           - pick up an item in this room",
        "  drop <item>           - drop an item you carry",
        "  inventory             - list what you carry",
        "  stats                 - show health, energy, level and experience",
        "  /select-class <class> - choose cybernetic, psionic or hunter",
        "  help                  - show this list",
        "Anything else is narrated by the station's AI.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Command {
        Command::parse(raw).unwrap()
    }

    #[test]
    fn test_movement_forms() {
        let east = Command::Go {
            direction: "east".to_string(),
        };
        assert_eq!(parse("go east"), east);
        assert_eq!(parse("  GO   East "), Command::Go { direction: "east".to_string() });
        assert_eq!(parse("east"), east);
        assert_eq!(parse("move e"), Command::Go { direction: "e".to_string() });
        assert_eq!(parse("go starboard"), Command::Go { direction: "starboard".to_string() });
    }

    #[test]
    fn test_go_without_direction() {
        assert_eq!(
            Command::parse("go"),
            Err(CommandError::InvalidCommand {
                usage: GO_USAGE.to_string()
            })
        );
    }

    #[test]
    fn test_go_with_prose_is_narrative() {
        assert_eq!(
            parse("go talk to the robot"),
            Command::Narrative("go talk to the robot".to_string())
        );
    }

    #[test]
    fn test_queries() {
        assert_eq!(parse("inventory"), Command::Inventory);
        assert_eq!(parse("i"), Command::Inventory);
        assert_eq!(parse("stats"), Command::Stats);
        assert_eq!(parse("examine self"), Command::Stats);
        assert_eq!(parse("help"), Command::Help);
    }

    #[test]
    fn test_items_keep_casing() {
        assert_eq!(parse("take Keycard"), Command::Take { item: "Keycard".to_string() });
        assert_eq!(parse("pick up flashlight"), Command::Take { item: "flashlight".to_string() });
        assert_eq!(parse("drop red wrench"), Command::Drop { item: "red wrench".to_string() });
        assert!(Command::parse("take").is_err());
        assert!(Command::parse("pick up").is_err());
        assert!(Command::parse("drop  ").is_err());
    }

    #[test]
    fn test_select_class() {
        assert_eq!(
            parse("/select-class Psionic"),
            Command::SelectClass(CharacterClass::Psionic)
        );
        let usage = CommandError::InvalidCommand {
            usage: CLASS_USAGE.to_string(),
        };
        assert_eq!(Command::parse("/select-class wizard"), Err(usage.clone()));
        assert_eq!(Command::parse("/select-class"), Err(usage));
    }

    #[test]
    fn test_unknown_input_is_narrative() {
        assert_eq!(parse("look"), Command::Narrative("look".to_string()));
        assert_eq!(
            parse("examine the robot"),
            Command::Narrative("examine the robot".to_string())
        );
        assert_eq!(parse("xyzzy"), Command::Narrative("xyzzy".to_string()));
        assert_eq!(parse("i think so"), Command::Narrative("i think so".to_string()));
        assert!(matches!(parse("north"), Command::Go { .. }));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            Command::parse("   "),
            Err(CommandError::InvalidCommand { .. })
        ));
    }
}
