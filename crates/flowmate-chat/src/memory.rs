//! Bounded conversation history.

use std::collections::VecDeque;

use serde::Serialize;

/// Turns kept per session unless configured otherwise.
pub const DEFAULT_MAX_TURNS: usize = 5;

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

/// The most recent turns of one conversation, oldest first.
#[derive(Debug, Clone)]
pub struct ConversationBuffer {
    capacity: usize,
    turns: VecDeque<Turn>,
}

impl ConversationBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            turns: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a turn, evicting the oldest when full.
    pub fn append(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn {
            user: user.into(),
            assistant: assistant.into(),
        });
    }

    /// Render as `User: ..\nAssistant: ..` blocks joined by newlines.
    pub fn format(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("User: {}\nAssistant: {}", t.user, t.assistant))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }
}

impl Default for ConversationBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}
