//! Conversation context
//!
//! A bounded window of recent turns plus the options shown last. The context is
//! handed to the intent parser by value, so parsing never observes a context
//! that changes underneath it.

use serde::Serialize;
use std::collections::VecDeque;

use crate::conductor::ShownOption;

/// Default number of turns kept
const DEFAULT_TURN_LIMIT: usize = 6;

/// Longest stored reply, in characters.
const MAX_REPLY_CHARS: usize = 400;

/// One user utterance and the reply it got.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationContext {
    turns: VecDeque<Turn>,
    turn_limit: usize,
    shown: Vec<ShownOption>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_TURN_LIMIT)
    }

    pub fn with_limit(turn_limit: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(turn_limit),
            turn_limit: turn_limit.max(1),
            shown: Vec::new(),
        }
    }

    /// Append a turn, evicting the oldest beyond the limit.
    pub fn push_turn(&mut self, user: impl Into<String>, assistant: impl AsRef<str>) {
        let assistant: String = assistant.as_ref().chars().take(MAX_REPLY_CHARS).collect();
        self.turns.push_back(Turn {
            user: user.into(),
            assistant,
        });
        while self.turns.len() > self.turn_limit {
            self.turns.pop_front();
        }
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn set_shown(&mut self, shown: Vec<ShownOption>) {
        self.shown = shown;
    }

    /// Options from the last ranking, in the order they were listed.
    pub fn shown(&self) -> &[ShownOption] {
        &self.shown
    }

    /// Resolve a zero-based back-reference ("the first option").
    pub fn shown_at(&self, index: usize) -> Option<&ShownOption> {
        self.shown.get(index)
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.shown.clear();
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new()
    }
}
