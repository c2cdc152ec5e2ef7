//! Command processing.
//!
//! Each command is classified, then either resolved locally or sent to the
//! narrator. Either way exactly one player turn and one narrator turn are
//! recorded, so later narration sees movement and pickups too.

use crate::ai::{BackendError, BackendId, NarrationSource, Narrator};
use crate::command::{help_text, Command, CommandError};
use crate::player::StateError;
use crate::session::{Session, StateSnapshot};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a command was refused. The session is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// How a command was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Resolved locally without the AI.
    Resolved,
    /// Narrated by a backend.
    Narrated { backend: BackendId },
    /// The backend failed; the text is the fallback narration.
    Fallback { reason: BackendError },
    /// Refused with a player-facing message.
    Rejected(Rejection),
}

/// The result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub narrative: String,
    pub snapshot: StateSnapshot,
    pub outcome: CommandOutcome,
}

/// Dispatches commands against a session.
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    narrator: Arc<Narrator>,
    history_window: usize,
}

impl CommandProcessor {
    /// `history_window` is the number of exchanges the narrator sees.
    pub fn new(narrator: Arc<Narrator>, history_window: usize) -> Self {
        Self {
            narrator,
            history_window,
        }
    }

    pub fn narrator(&self) -> &Arc<Narrator> {
        &self.narrator
    }

    pub async fn process(&self, session: &mut Session, raw: &str) -> CommandResponse {
        let input = raw.trim();

        let (narrative, outcome) = match Command::parse(input) {
            Err(err) => {
                session.history_mut().push_player(input);
                (err.to_string(), CommandOutcome::Rejected(err.into()))
            }
            Ok(Command::Narrative(text)) => {
                // Context is taken before this command joins the history.
                let context = session.narrative_context(&text, self.history_window);
                session.history_mut().push_player(input);
                self.narrate(session, context).await
            }
            Ok(command) => {
                session.history_mut().push_player(input);
                match resolve(session, command) {
                    Ok(message) => (message, CommandOutcome::Resolved),
                    Err((message, rejection)) => (message, CommandOutcome::Rejected(rejection)),
                }
            }
        };

        session.history_mut().push_narrator(narrative.clone());
        debug!(session = %session.id(), outcome = ?outcome, "Command processed");

        CommandResponse {
            narrative,
            snapshot: session.snapshot(),
            outcome,
        }
    }

    async fn narrate(
        &self,
        session: &mut Session,
        context: crate::ai::NarrativeContext,
    ) -> (String, CommandOutcome) {
        let narration = self.narrator.narrate(session.selection_mut(), context).await;

        if let Some(delta) = narration.delta {
            if let Err(err) = session.apply_delta(delta) {
                warn!(session = %session.id(), error = %err, "Discarding invalid stat change from narrator");
            }
        }

        let outcome = match narration.source {
            NarrationSource::Backend(backend) => CommandOutcome::Narrated { backend },
            NarrationSource::Fallback { reason } => CommandOutcome::Fallback { reason },
        };
        (narration.text, outcome)
    }
}

/// Resolve a deterministic command. Errors carry the player-facing message.
fn resolve(session: &mut Session, command: Command) -> Result<String, (String, Rejection)> {
    match command {
        Command::Go { direction } => match session.go(&direction) {
            Ok(moved) => {
                let description = session
                    .current_room()
                    .map(|room| room.description.clone())
                    .unwrap_or_default();
                Ok(format!("You move {moved}.\n\n{description}"))
            }
            Err(err) => Err((
                format!("You cannot go {} from here.", direction.trim().to_lowercase()),
                err.into(),
            )),
        },
        Command::Inventory => {
            let inventory = session.player().inventory();
            if inventory.is_empty() {
                Ok("You are not carrying anything.".to_string())
            } else {
                Ok(format!("You are carrying: {}.", inventory.join(", ")))
            }
        }
        Command::Stats => {
            let player = session.player();
            let class = player
                .character_class()
                .map_or("none chosen".to_string(), |class| class.to_string());
            Ok(format!(
                "Health: {}%\nEnergy: {}%\nLevel: {}\nExperience: {}\nClass: {class}",
                player.health(),
                player.energy(),
                player.level(),
                player.experience()
            ))
        }
        Command::Take { item } => match session.take(&item) {
            Ok(taken) => Ok(format!("You pick up the {taken}.")),
            Err(err) => Err((format!("There is no {} here.", item.trim()), err.into())),
        },
        Command::Drop { item } => match session.drop_item(&item) {
            Ok(dropped) => Ok(format!("You drop the {dropped}.")),
            Err(err) => Err((format!("You are not carrying {}.", item.trim()), err.into())),
        },
        Command::SelectClass(class) => {
            session.select_class(class);
            Ok(format!(
                "You have chosen the {class} class. Your journey begins..."
            ))
        }
        Command::Help => Ok(help_text()),
        Command::Narrative(_) => unreachable!("narrative commands are not resolved locally"),
    }
}
