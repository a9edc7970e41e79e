//! # Tree Addressing
//!
//! Positional, identity-free node addresses.
//!
//! ```text
//! /                     the root
//! /p[2]/text()[1]       first text node of the second authored <p>
//! id("intro")/em[1]     first <em> under the element with id="intro"
//! /node()[3]/node()[1]  approximate: plain ordinals, nothing filtered
//! ```
//!
//! Tag segments count only same-tag siblings and, by default, skip
//! synthetic nodes so that decorations inserted by widgets never shift the
//! address of authored content. Text segments count sibling text nodes.
//!
//! Decoding a stale address yields `None`; callers treat that as a lost
//! position, never as a fatal error.

use marrow_dom::{Document, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressOptions {
    /// Leave synthetic nodes out of tag-segment counts
    pub skip_synthetic: bool,
}

impl Default for AddressOptions {
    fn default() -> Self {
        Self {
            skip_synthetic: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// The document root, always first
    Root,
    /// Element carrying a stable identifier, always first
    Id(String),
    /// n-th same-tag element child (1-based)
    Tag { name: String, index: usize },
    /// n-th text child (1-based)
    Text { index: usize },
    /// n-th child of any kind (1-based)
    Node { index: usize },
}

impl Segment {
    fn index(&self) -> Option<usize> {
        match self {
            Segment::Tag { index, .. } | Segment::Text { index } | Segment::Node { index } => {
                Some(*index)
            }
            Segment::Root | Segment::Id(_) => None,
        }
    }

    fn with_index(&self, new_index: usize) -> Segment {
        match self {
            Segment::Tag { name, .. } => Segment::Tag {
                name: name.clone(),
                index: new_index,
            },
            Segment::Text { .. } => Segment::Text { index: new_index },
            Segment::Node { .. } => Segment::Node { index: new_index },
            other => other.clone(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Root => f.write_str("/"),
            Segment::Id(id) => write!(f, "id(\"{}\")", id),
            Segment::Tag { name, index } => write!(f, "{}[{}]", name, index),
            Segment::Text { index } => write!(f, "text()[{}]", index),
            Segment::Node { index } => write!(f, "node()[{}]", index),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid address {address:?}: {reason}")]
pub struct AddressParseError {
    pub address: String,
    pub reason: &'static str,
}

/// Location of a node as a path of [`Segment`]s
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    segments: Vec<Segment>,
}

impl Address {
    pub fn root() -> Self {
        Self {
            segments: vec![Segment::Root],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.segments == [Segment::Root]
    }

    /// Built from generic ordinals, so more likely to land on the wrong node
    pub fn is_approximate(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Node { .. }))
    }

    pub fn child(&self, segment: Segment) -> Address {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Address { segments }
    }

    /// Address one level up, `None` at the first segment
    pub fn parent(&self) -> Option<Address> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Address {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Same depth, last ordinal shifted by `delta`
    pub fn sibling(&self, delta: isize) -> Option<Address> {
        let last = self.segments.last()?;
        let index = last.index()?.checked_add_signed(delta)?;
        if index == 0 {
            return None;
        }
        let mut segments = self.segments.clone();
        let position = segments.len() - 1;
        segments[position] = last.with_index(index);
        Some(Address { segments })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut previous: Option<&Segment> = None;
        for segment in &self.segments {
            if previous.is_some_and(|p| *p != Segment::Root) {
                f.write_str("/")?;
            }
            write!(f, "{}", segment)?;
            previous = Some(segment);
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = |reason| AddressParseError {
            address: s.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let rest = if let Some(rest) = s.strip_prefix('/') {
            segments.push(Segment::Root);
            rest
        } else if let Some(after) = s.strip_prefix("id(\"") {
            let end = after.find("\")").ok_or_else(|| error("unterminated id segment"))?;
            segments.push(Segment::Id(after[..end].to_string()));
            let rest = &after[end + 2..];
            if !rest.is_empty() && !rest.starts_with('/') {
                return Err(error("expected '/' after id segment"));
            }
            rest.trim_start_matches('/')
        } else {
            return Err(error("must start with '/' or id(\"...\")"));
        };

        for part in rest.split('/').filter(|part| !part.is_empty()) {
            segments.push(parse_segment(part).ok_or_else(|| error("malformed segment"))?);
        }
        Ok(Address { segments })
    }
}

fn parse_segment(part: &str) -> Option<Segment> {
    let open = part.rfind('[')?;
    let index: usize = part.strip_suffix(']')?.get(open + 1..)?.parse().ok()?;
    if index == 0 {
        return None;
    }
    match &part[..open] {
        "" => None,
        "text()" => Some(Segment::Text { index }),
        "node()" => Some(Segment::Node { index }),
        name => Some(Segment::Tag {
            name: name.to_string(),
            index,
        }),
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

fn counts_toward(doc: &Document, sibling: NodeId, tag: &str, options: AddressOptions) -> bool {
    doc.tag(sibling) == Some(tag) && !(options.skip_synthetic && doc.is_synthetic(sibling))
}

fn segment_for(doc: &Document, parent: NodeId, node: NodeId, options: AddressOptions) -> Segment {
    let siblings = doc.children(parent);
    let position = siblings.iter().position(|&s| s == node).unwrap_or(0);
    let preceding = &siblings[..position];

    match doc.tag(node) {
        None => Segment::Text {
            index: 1 + preceding.iter().filter(|&&s| doc.is_text(s)).count(),
        },
        Some(_) if options.skip_synthetic && doc.is_synthetic(node) => Segment::Node {
            index: position + 1,
        },
        Some(tag) => Segment::Tag {
            name: tag.to_string(),
            index: 1 + preceding
                .iter()
                .filter(|&&s| counts_toward(doc, s, tag, options))
                .count(),
        },
    }
}

/// Address of `node`, or `None` when it is not attached to the root
pub fn encode(doc: &Document, node: NodeId, options: AddressOptions) -> Option<Address> {
    let mut segments = Vec::new();
    let mut current = node;
    loop {
        if current == doc.root() {
            segments.push(Segment::Root);
            break;
        }
        if let Some(id) = doc.stable_id(current) {
            segments.push(Segment::Id(id.to_string()));
            break;
        }
        let parent = doc.parent(current)?;
        segments.push(segment_for(doc, parent, current, options));
        current = parent;
    }
    segments.reverse();

    // an id on a detached subtree is not a location
    if let Some(Segment::Id(_)) = segments.first() {
        if !doc.is_connected(node) {
            return None;
        }
    }
    Some(Address { segments })
}

/// Ordinal-only address built bottom-up, ignoring names, ids and flags
pub fn encode_approximate(doc: &Document, node: NodeId) -> Option<Address> {
    let mut segments = Vec::new();
    let mut current = node;
    while current != doc.root() {
        let index = doc.index_in_parent(current)?;
        segments.push(Segment::Node { index: index + 1 });
        current = doc.parent(current)?;
    }
    segments.push(Segment::Root);
    segments.reverse();
    Some(Address { segments })
}

fn find_by_id(doc: &Document, id: &str) -> Option<NodeId> {
    doc.subtree(doc.root())
        .into_iter()
        .find(|&node| doc.stable_id(node) == Some(id))
}

fn child_for(
    doc: &Document,
    parent: NodeId,
    segment: &Segment,
    options: AddressOptions,
) -> Option<NodeId> {
    let children = doc.children(parent).iter().copied();
    match segment {
        Segment::Text { index } => children.filter(|&c| doc.is_text(c)).nth(index.checked_sub(1)?),
        Segment::Node { index } => doc.children(parent).get(index.checked_sub(1)?).copied(),
        Segment::Tag { name, index } => children
            .filter(|&c| counts_toward(doc, c, name, options))
            .nth(index.checked_sub(1)?),
        Segment::Root | Segment::Id(_) => None,
    }
}

/// Resolve an address against `doc`
pub fn decode(doc: &Document, address: &Address, options: AddressOptions) -> Option<NodeId> {
    let (first, rest) = address.segments.split_first()?;
    let mut current = match first {
        Segment::Root => doc.root(),
        Segment::Id(id) => find_by_id(doc, id)?,
        _ => return None,
    };
    for segment in rest {
        current = child_for(doc, current, segment, options)?;
    }
    Some(current)
}
