//! Level list, unlocked frontier, and evaluation history

use std::collections::HashMap;

use crate::course::{Evaluation, Level};

/// Result of a completed-level advance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the given level index
    Advanced(usize),
    /// Already at the last level; the session is complete
    Completed,
}

/// Owns the ordered level list, the navigation frontier, and per-level
/// saved evaluations
///
/// Pure in-memory state: no I/O, no spawned work. The unlocked frontier
/// only advances on explicit completion, never on jump or review.
#[derive(Debug)]
pub struct ProgressTracker {
    levels: Vec<Level>,
    current: usize,
    unlocked: usize,
    history: HashMap<usize, Evaluation>,
}

impl ProgressTracker {
    /// Create a tracker positioned at the first level
    #[must_use]
    pub fn new(levels: Vec<Level>) -> Self {
        Self {
            levels,
            current: 0,
            unlocked: 0,
            history: HashMap::new(),
        }
    }

    /// Number of levels in the course
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether the course has no levels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Index of the level being displayed
    #[must_use]
    pub const fn current(&self) -> usize {
        self.current
    }

    /// Highest index ever made reachable
    #[must_use]
    pub const fn unlocked(&self) -> usize {
        self.unlocked
    }

    /// The level at `index`, if it exists
    #[must_use]
    pub fn level_at(&self, index: usize) -> Option<&Level> {
        self.levels.get(index)
    }

    /// The level being displayed
    ///
    /// # Panics
    ///
    /// Panics if the tracker was built with an empty level list; sessions
    /// reject empty courses at construction.
    #[must_use]
    pub fn level(&self) -> &Level {
        &self.levels[self.current]
    }

    /// Navigate to `index`
    ///
    /// Returns false (and changes nothing) if `index` is beyond the
    /// unlocked frontier or out of range.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index > self.unlocked || index >= self.levels.len() {
            tracing::debug!(index, unlocked = self.unlocked, "jump rejected");
            return false;
        }
        self.current = index;
        true
    }

    /// Complete the current level and move forward
    ///
    /// Extends the unlocked frontier when moving into new territory. At the
    /// last level, signals completion without moving.
    pub fn advance(&mut self) -> AdvanceOutcome {
        if self.current + 1 >= self.levels.len() {
            return AdvanceOutcome::Completed;
        }
        self.unlocked = self.unlocked.max(self.current + 1);
        self.current += 1;
        AdvanceOutcome::Advanced(self.current)
    }

    /// Store an evaluation for `index`, overwriting any prior attempt
    pub fn record(&mut self, index: usize, evaluation: Evaluation) {
        self.history.insert(index, evaluation);
    }

    /// The stored evaluation for `index`, if any
    #[must_use]
    pub fn result_for(&self, index: usize) -> Option<&Evaluation> {
        self.history.get(&index)
    }
}
