//! # Undo/Redo History
//!
//! Snapshot-based history of the model tree.
//!
//! ## Design
//!
//! - A deep copy of the model is pushed before every batch that applies
//!   operations
//! - Undo swaps the current model with the newest snapshot, moving the
//!   current model to the redo stack; redo is the mirror image
//! - New snapshots clear the redo stack
//! - The undo stack is bounded; the oldest snapshot is evicted first
//!
//! ## Example
//!
//! ```rust
//! use marrow_dom::Document;
//! use marrow_editor::History;
//!
//! let mut history = History::with_max_levels(10);
//! let mut model = Document::from_fragment("div", "<p>a</p>")?;
//!
//! history.push(model.clone());
//! model = Document::from_fragment("div", "<p>b</p>")?;
//!
//! assert!(history.undo(&mut model));
//! assert_eq!(model.to_html(), "<div><p>a</p></div>");
//! assert!(history.redo(&mut model));
//! assert_eq!(model.to_html(), "<div><p>b</p></div>");
//! # Ok::<(), marrow_dom::DomError>(())
//! ```

use marrow_dom::Document;
use std::collections::VecDeque;

/// Default number of undo levels
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

#[derive(Debug, Clone)]
pub struct History {
    /// Snapshots before each applied batch (most recent last)
    undo_stack: VecDeque<Document>,

    /// Models replaced by undo (most recent last)
    redo_stack: Vec<Document>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
}

impl History {
    /// History with the default depth
    pub fn new() -> Self {
        Self::with_max_levels(DEFAULT_HISTORY_DEPTH)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_levels,
        }
    }

    /// Record the model as it was before a batch
    pub fn push(&mut self, snapshot: Document) {
        self.undo_stack.push_back(snapshot);

        // Trim if exceeded max levels
        while self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.pop_front();
        }

        // New action invalidates the redo chain
        self.redo_stack.clear();
    }

    /// Take back the newest snapshot without touching the redo stack
    pub fn pop(&mut self) -> Option<Document> {
        self.undo_stack.pop_back()
    }

    /// Drop the `count` newest snapshots. Returns how many were dropped.
    pub fn discard(&mut self, count: usize) -> usize {
        let count = count.min(self.undo_stack.len());
        self.undo_stack.truncate(self.undo_stack.len() - count);
        count
    }

    /// Swap `current` with the newest snapshot
    pub fn undo(&mut self, current: &mut Document) -> bool {
        match self.undo_stack.pop_back() {
            Some(snapshot) => {
                let replaced = std::mem::replace(current, snapshot);
                self.redo_stack.push(replaced);
                true
            }
            None => false,
        }
    }

    /// Swap `current` with the most recently undone model
    pub fn redo(&mut self, current: &mut Document) -> bool {
        match self.redo_stack.pop() {
            Some(snapshot) => {
                let replaced = std::mem::replace(current, snapshot);
                self.undo_stack.push_back(replaced);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
