//! Session context - the bounded conversation history shared by all plugins
//!
//! Turns are stored in user/assistant pairs, oldest first. The history never
//! holds more than `window` pairs; appending to a full history evicts the
//! oldest pair first, so a pair is never split.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{Message, Role};

/// Default number of user/assistant pairs kept
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        Message {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Bounded FIFO of user/assistant turn pairs
#[derive(Debug, Clone)]
pub struct SessionContext {
    turns: Vec<Turn>,
    window: usize,
}

impl SessionContext {
    /// Create an empty context holding at most `window` pairs
    pub fn new(window: usize) -> Self {
        debug!(%window, "SessionContext::new: called");
        Self {
            turns: Vec::with_capacity(window * 2),
            window,
        }
    }

    /// Record one user/assistant exchange, evicting the oldest pair when full
    pub fn append(&mut self, user_text: impl Into<String>, assistant_text: impl Into<String>) {
        if self.window == 0 {
            debug!("SessionContext::append: zero window, nothing kept");
            return;
        }
        if self.turns.len() >= self.window * 2 {
            debug!(len = self.turns.len(), "SessionContext::append: evicting oldest pair");
            self.turns.drain(..2);
        }
        self.turns.push(Turn::user(user_text));
        self.turns.push(Turn::assistant(assistant_text));
    }

    /// All turns, oldest first
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    /// Borrow all turns, oldest first
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Discard every turn
    pub fn clear(&mut self) {
        debug!(len = self.turns.len(), "SessionContext::clear: called");
        self.turns.clear();
    }

    /// Number of turns (always even)
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of user/assistant pairs
    pub fn pair_count(&self) -> usize {
        self.turns.len() / 2
    }

    /// Maximum number of pairs kept
    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}
