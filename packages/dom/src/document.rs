//! # Document Tree
//!
//! Arena-backed element/text tree used both as the live editing surface and
//! as the detached model.
//!
//! Nodes are never freed: detaching a node leaves it in the arena so that it
//! can be re-inserted later (the editor's rollback relies on this). A
//! document is cheap to throw away and rebuild, which is what re-rendering
//! does.
//!
//! While observed, every mutation of a node connected to the root is
//! appended to a FIFO of [`ChangeRecord`]s.

use crate::node::{is_block_tag, NodeData, NodeKind, EDITABLE_ATTR, ID_ATTR, SYNTHETIC_ATTR};
use crate::record::{ChangeRecord, Recorder};
use crate::text::char_len;
use crate::{DomError, DomResult, NodeId, VNode};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    recorder: Recorder,
}

impl Document {
    /// Create an empty document whose root element has the given tag
    pub fn new(root_tag: &str) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            recorder: Recorder::default(),
        };
        doc.root = doc.alloc(NodeKind::Element {
            tag: root_tag.to_string(),
            attributes: BTreeMap::new(),
        });
        doc
    }

    /// Build a document from an owned tree. The root must be an element.
    pub fn from_vnode(root: &VNode) -> DomResult<Self> {
        if root.is_text() {
            return Err(DomError::NotAnElement);
        }
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            recorder: Recorder::default(),
        };
        doc.root = doc.import(root);
        Ok(doc)
    }

    /// Compact deep copy of the attached tree. Detached nodes are dropped
    /// and no change records carry over.
    pub fn snapshot(&self) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            recorder: Recorder::default(),
        };
        doc.root = doc.import(&self.export(self.root));
        doc
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(kind));
        id
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes ever allocated, attached or not
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.into(),
            attributes: BTreeMap::new(),
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    // ---- node data -------------------------------------------------------

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.data(id).kind, NodeKind::Text(_))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.data(id).kind, NodeKind::Element { .. })
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    /// Length in chars of a text node, 0 for elements
    pub fn text_len(&self, id: NodeId) -> usize {
        self.text(id).map(char_len).unwrap_or(0)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> Option<&BTreeMap<String, String>> {
        match &self.data(id).kind {
            NodeKind::Element { attributes, .. } => Some(attributes),
            NodeKind::Text(_) => None,
        }
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> DomResult<()> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => {
                attributes.insert(name.into(), value.into());
                Ok(())
            }
            NodeKind::Text(_) => Err(DomError::NotAnElement),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> DomResult<Option<String>> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => Ok(attributes.remove(name)),
            NodeKind::Text(_) => Err(DomError::NotAnElement),
        }
    }

    /// Replace the character data of a text node
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> DomResult<()> {
        let connected = self.is_connected(id);
        match &mut self.nodes[id.0].kind {
            NodeKind::Text(current) => {
                let text = text.into();
                if *current == text {
                    return Ok(());
                }
                let old = std::mem::replace(current, text);
                if connected {
                    self.recorder.push(ChangeRecord::text(id, old));
                }
                Ok(())
            }
            NodeKind::Element { .. } => Err(DomError::NotText),
        }
    }

    // ---- flags -----------------------------------------------------------

    /// Decorative node inserted by a widget, not authored content
    pub fn is_synthetic(&self, id: NodeId) -> bool {
        self.attribute(id, SYNTHETIC_ATTR).is_some()
    }

    pub fn stable_id(&self, id: NodeId) -> Option<&str> {
        self.attribute(id, ID_ATTR).filter(|value| !value.is_empty())
    }

    /// Editable unless the nearest ancestor-or-self with a
    /// `contenteditable` attribute says `false`
    pub fn is_editable(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            match self.attribute(node, EDITABLE_ATTR) {
                Some("false") => return false,
                Some(_) => return true,
                None => current = self.parent(node),
            }
        }
        true
    }

    pub fn is_block(&self, id: NodeId) -> bool {
        self.tag(id).is_some_and(is_block_tag)
    }

    /// Nearest paragraph-level ancestor-or-self, never the root
    pub fn closest_block(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return None;
            }
            if self.is_block(node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    // ---- navigation ------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.data(id).children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// Ancestors from the parent upwards
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// Whether the node is the root or hangs below it
    pub fn is_connected(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).any(|ancestor| ancestor == self.root)
    }

    /// Inclusive containment
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Pre-order walk of everything below `id`, `id` excluded
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: self.children(id).iter().rev().copied().collect(),
        }
    }

    /// Pre-order list of `id` and all its descendants
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        std::iter::once(id).chain(self.descendants(id)).collect()
    }

    /// Next node in document order
    pub fn next_in_order(&self, id: NodeId) -> Option<NodeId> {
        if let Some(child) = self.first_child(id) {
            return Some(child);
        }
        self.next_after(id)
    }

    /// Next node in document order that is not inside `id`
    pub fn next_after(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            if current == self.root {
                return None;
            }
            if let Some(sibling) = self.next_sibling(current) {
                return Some(sibling);
            }
            current = self.parent(current)?;
        }
    }

    /// Previous node in document order
    pub fn previous_in_order(&self, id: NodeId) -> Option<NodeId> {
        if id == self.root {
            return None;
        }
        if let Some(mut node) = self.previous_sibling(id) {
            while let Some(last) = self.last_child(node) {
                node = last;
            }
            return Some(node);
        }
        self.parent(id)
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.subtree(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Char offset of (`node`, `offset`) within the text of `container`
    pub fn text_offset(&self, container: NodeId, node: NodeId, offset: usize) -> Option<usize> {
        let mut total = 0;
        for current in self.subtree(container) {
            if current == node {
                return Some(total + offset);
            }
            total += self.text_len(current);
        }
        None
    }

    // ---- mutation --------------------------------------------------------

    /// Insert `child` under `parent` in front of `reference`, or at the end.
    ///
    /// An attached child is moved, which records a removal followed by an
    /// insertion.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        if !self.is_element(parent) {
            return Err(DomError::NotAnElement);
        }
        if child == self.root {
            return Err(DomError::RootImmovable);
        }
        if self.contains(child, parent) {
            return Err(DomError::CycleDetected);
        }

        let reference = if reference == Some(child) {
            self.next_sibling(child)
        } else {
            reference
        };
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild);
            }
        }

        self.detach(child);

        let index = match reference {
            Some(reference) => self
                .index_in_parent(reference)
                .unwrap_or_else(|| self.children(parent).len()),
            None => self.children(parent).len(),
        };
        self.nodes[parent.0].children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);

        if self.is_connected(parent) {
            self.recorder
                .push(ChangeRecord::added(parent, child, reference));
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        if self.parent(child) != Some(parent) {
            return Err(DomError::NotAChild);
        }
        self.detach(child);
        Ok(())
    }

    /// Detach a node from its parent. Returns whether it was attached.
    pub fn detach(&mut self, child: NodeId) -> bool {
        let Some(parent) = self.parent(child) else {
            return false;
        };
        let next = self.next_sibling(child);
        let connected = self.is_connected(parent);

        self.nodes[parent.0].children.retain(|&c| c != child);
        self.nodes[child.0].parent = None;

        if connected {
            self.recorder.push(ChangeRecord::removed(parent, child, next));
        }
        true
    }

    /// Put `replacements` where `node` is, then detach `node`
    pub fn replace_with(&mut self, node: NodeId, replacements: &[NodeId]) -> DomResult<()> {
        let parent = self.parent(node).ok_or(DomError::NotAChild)?;
        for &replacement in replacements.iter().filter(|&&r| r != node) {
            self.insert_before(parent, replacement, Some(node))?;
        }
        self.detach(node);
        Ok(())
    }

    /// Merge adjacent text nodes and drop empty ones throughout the subtree
    pub fn normalize(&mut self, id: NodeId) {
        let elements: Vec<NodeId> = self
            .subtree(id)
            .into_iter()
            .filter(|&node| self.is_element(node))
            .collect();

        for element in elements {
            let mut previous_text: Option<NodeId> = None;
            for child in self.children(element).to_vec() {
                let Some(text) = self.text(child).map(str::to_owned) else {
                    previous_text = None;
                    continue;
                };
                if text.is_empty() {
                    self.detach(child);
                    continue;
                }
                match previous_text {
                    Some(previous) => {
                        let mut merged = self.text(previous).unwrap_or_default().to_owned();
                        merged.push_str(&text);
                        if self.set_text(previous, merged).is_ok() {
                            self.detach(child);
                        }
                    }
                    None => previous_text = Some(child),
                }
            }
        }
    }

    // ---- value copies ----------------------------------------------------

    /// Deep-copy an owned tree into this arena as a detached subtree
    pub fn import(&mut self, vnode: &VNode) -> NodeId {
        match vnode {
            VNode::Text { content } => self.create_text(content.clone()),
            VNode::Element {
                tag,
                attributes,
                children,
            } => {
                let id = self.alloc(NodeKind::Element {
                    tag: tag.clone(),
                    attributes: attributes.clone(),
                });
                for child in children {
                    let child_id = self.import(child);
                    self.nodes[id.0].children.push(child_id);
                    self.nodes[child_id.0].parent = Some(id);
                }
                id
            }
        }
    }

    /// Deep-copy a subtree out of the arena
    pub fn export(&self, id: NodeId) -> VNode {
        match &self.data(id).kind {
            NodeKind::Text(text) => VNode::text(text.clone()),
            NodeKind::Element { tag, attributes } => VNode::Element {
                tag: tag.clone(),
                attributes: attributes.clone(),
                children: self
                    .children(id)
                    .iter()
                    .map(|&child| self.export(child))
                    .collect(),
            },
        }
    }

    // ---- change recording ------------------------------------------------

    /// Start recording changes of connected nodes
    pub fn observe(&mut self) {
        self.recorder.observing = true;
    }

    pub fn is_observing(&self) -> bool {
        self.recorder.observing
    }

    /// Records delivered so far, oldest first
    pub fn take_records(&mut self) -> Vec<ChangeRecord> {
        self.recorder.drain()
    }

    /// Stop recording and flush everything still pending
    pub fn disconnect(&mut self) -> Vec<ChangeRecord> {
        self.recorder.observing = false;
        self.recorder.drain()
    }
}

/// Iterator over a node's ancestors, nearest first
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

/// Non-recursive pre-order iterator over a subtree
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack.extend(self.doc.children(node).iter().rev());
        Some(node)
    }
}
