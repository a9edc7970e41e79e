//! Raw change records emitted by an observed [`crate::Document`].

use crate::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Class of a raw change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Character data of a text node changed
    Text,
    /// A node was inserted under `target`
    Add,
    /// A node was removed from `target`
    Remove,
}

/// One raw, uninterpreted change against a live tree.
///
/// `target` is the text node for [`ChangeKind::Text`] and the parent for
/// structural changes. `next_sibling` is the node the change happened in
/// front of, captured at the time of the change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub old_text: Option<String>,
}

impl ChangeRecord {
    pub fn text(target: NodeId, old_text: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Text,
            target,
            added: Vec::new(),
            removed: Vec::new(),
            next_sibling: None,
            old_text: Some(old_text.into()),
        }
    }

    pub fn added(parent: NodeId, node: NodeId, next_sibling: Option<NodeId>) -> Self {
        Self {
            kind: ChangeKind::Add,
            target: parent,
            added: vec![node],
            removed: Vec::new(),
            next_sibling,
            old_text: None,
        }
    }

    pub fn removed(parent: NodeId, node: NodeId, next_sibling: Option<NodeId>) -> Self {
        Self {
            kind: ChangeKind::Remove,
            target: parent,
            added: Vec::new(),
            removed: vec![node],
            next_sibling,
            old_text: None,
        }
    }
}

/// FIFO buffer of undelivered records
#[derive(Debug, Clone, Default)]
pub(crate) struct Recorder {
    pub(crate) observing: bool,
    pub(crate) pending: VecDeque<ChangeRecord>,
}

impl Recorder {
    pub(crate) fn push(&mut self, record: ChangeRecord) {
        if self.observing {
            self.pending.push_back(record);
        }
    }

    pub(crate) fn drain(&mut self) -> Vec<ChangeRecord> {
        self.pending.drain(..).collect()
    }
}
