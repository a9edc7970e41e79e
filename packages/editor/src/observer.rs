//! # Change Observer
//!
//! Collects raw change records from the live tree and drops the ones that
//! belong to nodes managed by widgets or renderers.
//!
//! ## Filtering
//!
//! - Text change: dropped if the text node is ignored for `Text`/`Any`
//! - Removal: dropped if the node or its former parent is ignored for
//!   `Remove`/`Any`
//! - Insertion: dropped if the node or its new parent is ignored for
//!   `Add`/`Any`
//!
//! The registry is scoped to one live tree; the engine clears it whenever
//! the live tree is re-rendered.

use marrow_dom::{ChangeKind, ChangeRecord, Document, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Change class a node is exempted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Add,
    Remove,
    Text,
    Any,
}

impl Trigger {
    fn covers(self, kind: ChangeKind) -> bool {
        matches!(
            (self, kind),
            (Trigger::Any, _)
                | (Trigger::Add, ChangeKind::Add)
                | (Trigger::Remove, ChangeKind::Remove)
                | (Trigger::Text, ChangeKind::Text)
        )
    }

    fn merge(self, other: Trigger) -> Trigger {
        if self == other {
            self
        } else {
            Trigger::Any
        }
    }
}

/// Per-node suppression of change classes
#[derive(Debug, Clone, Default)]
pub struct IgnoreRegistry {
    entries: HashMap<NodeId, Trigger>,
}

impl IgnoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exempt `nodes` (and optionally their subtrees) from `trigger`.
    ///
    /// Registering a node twice with different triggers widens it to `Any`.
    pub fn ignore(
        &mut self,
        doc: &Document,
        nodes: &[NodeId],
        trigger: Trigger,
        include_descendants: bool,
    ) {
        let mut stack: Vec<NodeId> = nodes.to_vec();
        while let Some(node) = stack.pop() {
            self.entries
                .entry(node)
                .and_modify(|existing| *existing = existing.merge(trigger))
                .or_insert(trigger);
            if include_descendants {
                stack.extend_from_slice(doc.children(node));
            }
        }
    }

    pub fn unignore(&mut self, node: NodeId) -> Option<Trigger> {
        self.entries.remove(&node)
    }

    pub fn trigger(&self, node: NodeId) -> Option<Trigger> {
        self.entries.get(&node).copied()
    }

    pub fn is_ignored(&self, node: NodeId, kind: ChangeKind) -> bool {
        self.trigger(node).is_some_and(|trigger| trigger.covers(kind))
    }

    /// Whether a record survives the registry
    pub fn admits(&self, record: &ChangeRecord) -> bool {
        match record.kind {
            ChangeKind::Text => !self.is_ignored(record.target, ChangeKind::Text),
            ChangeKind::Add | ChangeKind::Remove => {
                let nodes = if record.kind == ChangeKind::Add {
                    &record.added
                } else {
                    &record.removed
                };
                !self.is_ignored(record.target, record.kind)
                    && !nodes.iter().any(|&node| self.is_ignored(node, record.kind))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Live-tree binding the observer pulls change records from
pub trait ChangeSource {
    /// Start recording changes
    fn observe(&mut self);

    /// Records delivered so far, oldest first
    fn drain_pending_records(&mut self) -> Vec<ChangeRecord>;

    /// Stop recording, returning everything not yet delivered
    fn disconnect(&mut self) -> Vec<ChangeRecord>;
}

impl ChangeSource for Document {
    fn observe(&mut self) {
        Document::observe(self);
    }

    fn drain_pending_records(&mut self) -> Vec<ChangeRecord> {
        self.take_records()
    }

    fn disconnect(&mut self) -> Vec<ChangeRecord> {
        Document::disconnect(self)
    }
}

/// FIFO of admitted change records plus the ignore registry
#[derive(Debug, Default)]
pub struct ChangeObserver {
    queue: VecDeque<ChangeRecord>,
    ignores: IgnoreRegistry,
    observing: bool,
}

impl ChangeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, source: &mut impl ChangeSource) {
        source.observe();
        self.observing = true;
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Pull whatever the source has delivered so far into the queue
    pub fn poll(&mut self, source: &mut impl ChangeSource) -> usize {
        let records = source.drain_pending_records();
        self.enqueue(records)
    }

    /// Stop observing and return every admitted record, oldest first
    pub fn stop_observing(&mut self, source: &mut impl ChangeSource) -> Vec<ChangeRecord> {
        let records = source.disconnect();
        self.enqueue(records);
        self.observing = false;
        self.queue.drain(..).collect()
    }

    fn enqueue(&mut self, records: Vec<ChangeRecord>) -> usize {
        let before = self.queue.len();
        let ignores = &self.ignores;
        self.queue
            .extend(records.into_iter().filter(|record| ignores.admits(record)));
        self.queue.len() - before
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn ignores(&self) -> &IgnoreRegistry {
        &self.ignores
    }

    pub fn ignores_mut(&mut self) -> &mut IgnoreRegistry {
        &mut self.ignores
    }

    pub fn ignore(
        &mut self,
        doc: &Document,
        nodes: &[NodeId],
        trigger: Trigger,
        include_descendants: bool,
    ) {
        self.ignores.ignore(doc, nodes, trigger, include_descendants);
    }

    /// Swap in a registry built for a freshly rendered live tree
    pub fn replace_ignores(&mut self, ignores: IgnoreRegistry) {
        self.ignores = ignores;
    }
}
