//! Conversation history for one session

use chrono::{DateTime, Utc};
use serde::Serialize;

// Re-export types from the shared types module
pub use crate::types::{Role, Turn};

/// Ordered, append-only list of turns.
///
/// Turns are never edited once pushed; the only other mutation is clearing
/// the whole history on reset.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: String,
    turns: Vec<Turn>,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the conversation was last updated
    pub updated_at: DateTime<Utc>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Create a new empty conversation
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn and return its index
    pub fn push(&mut self, turn: Turn) -> usize {
        self.turns.push(turn);
        self.updated_at = Utc::now();
        self.turns.len() - 1
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Get the last N turns for display
    pub fn last_n(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Get a summary of the conversation for display
    pub fn summary(&self) -> String {
        let user_count = self.turns.iter().filter(|t| t.role == Role::User).count();
        let assistant_count = self.turns.iter().filter(|t| t.role == Role::Assistant).count();

        format!(
            "Conversation {}: {} turns ({} user, {} assistant)",
            self.id,
            self.turns.len(),
            user_count,
            assistant_count
        )
    }

    /// Drop all turns (keeps the same ID)
    pub fn clear(&mut self) {
        self.turns.clear();
        self.updated_at = Utc::now();
    }
}
