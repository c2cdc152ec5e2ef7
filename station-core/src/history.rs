//! Conversation history between the player and the narrator.
//!
//! The history keeps every turn unless a storage cap is set, in which case
//! the oldest turns are evicted first. What the AI sees is a separate, much smaller window taken with
//! [`ConversationHistory::recent_exchanges`]; that window is a per-request
//! view and never shortens the stored history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Who spoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Narrator,
}

/// One entry in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn player(text: impl Into<String>) -> Self {
        Self {
            role: Role::Player,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn narrator(text: impl Into<String>) -> Self {
        Self {
            role: Role::Narrator,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Ordered conversation log, optionally FIFO-bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: VecDeque<Turn>,
    #[serde(default)]
    max_turns: Option<usize>,
}

impl ConversationHistory {
    /// An unbounded history.
    pub fn new() -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: None,
        }
    }

    /// Create with a storage cap (at least one turn).
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: Some(max_turns.max(1)),
        }
    }

    pub fn max_turns(&self) -> Option<usize> {
        self.max_turns
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        self.trim();
    }

    pub fn push_player(&mut self, text: impl Into<String>) {
        self.push(Turn::player(text));
    }

    pub fn push_narrator(&mut self, text: impl Into<String>) {
        self.push(Turn::narrator(text));
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }

    /// The most recent `count` turns, oldest first.
    pub fn recent(&self, count: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(count);
        self.turns.iter().skip(skip).cloned().collect()
    }

    /// The most recent `count` player/narrator exchanges (two turns each).
    pub fn recent_exchanges(&self, count: usize) -> Vec<Turn> {
        self.recent(count.saturating_mul(2))
    }

    fn trim(&mut self) {
        if let Some(max) = self.max_turns {
            while self.turns.len() > max {
                self.turns.pop_front();
            }
        }
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(pairs: usize) -> ConversationHistory {
        let mut history = ConversationHistory::new();
        for i in 0..pairs {
            history.push_player(format!("command {i}"));
            history.push_narrator(format!("reply {i}"));
        }
        history
    }

    #[test]
    fn test_recent_exchanges_drop_oldest_first() {
        let history = filled(12);
        let window = history.recent_exchanges(10);

        assert_eq!(window.len(), 20);
        assert_eq!(window[0].text, "command 2");
        assert_eq!(window[0].role, Role::Player);
        assert_eq!(window[19].text, "reply 11");
        assert_eq!(history.len(), 24);
    }

    #[test]
    fn test_recent_preserves_order() {
        let history = filled(3);
        let texts: Vec<_> = history.recent(3).into_iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["reply 1", "command 2", "reply 2"]);
    }

    #[test]
    fn test_window_larger_than_history() {
        let history = filled(2);
        assert_eq!(history.recent_exchanges(10).len(), 4);
        assert!(ConversationHistory::new().recent(5).is_empty());
    }

    #[test]
    fn test_storage_cap_evicts_fifo() {
        let mut history = ConversationHistory::with_max_turns(3);
        for i in 0..5 {
            history.push_player(format!("{i}"));
        }
        let texts: Vec<_> = history.turns().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["2", "3", "4"]);
    }

    #[test]
    fn test_zero_cap_keeps_one_turn() {
        let mut history = ConversationHistory::with_max_turns(0);
        history.push_player("a");
        history.push_narrator("b");
        assert_eq!(history.len(), 1);
        assert_eq!(history.last().unwrap().role, Role::Narrator);
    }

    #[test]
    fn test_unbounded_by_default() {
        let history = filled(300);
        assert_eq!(history.max_turns(), None);
        assert_eq!(history.len(), 600);
        assert_eq!(history.turns().next().unwrap().text, "command 0");
    }

    #[test]
    fn test_serde_round_trip_is_exact() {
        let history = filled(4);
        let json = serde_json::to_string(&history).unwrap();
        let back: ConversationHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
    }
}
