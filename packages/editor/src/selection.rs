//! # Selection Capture & Restore
//!
//! Re-rendering throws away every live node, so the caret has to be
//! carried across as addresses and text offsets.
//!
//! ## Restore order
//!
//! 1. exact anchor address
//! 2. approximate (ordinal-only) address
//! 3. next, then previous sibling at the same depth; then one level up,
//!    repeated at most once per address segment
//! 4. the root
//!
//! The extent is only rebuilt when the exact anchor was found. A pending
//! [`CaretToken`] then gets a chance to move the caret; if its walk finds
//! nothing the computed position stands.

use crate::address::{decode, encode, encode_approximate, Address, AddressOptions};
use marrow_dom::{Document, NodeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A point in the live tree: char offset for text nodes, child index for
/// elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Position,
    pub focus: Position,
}

impl Selection {
    pub fn caret(node: NodeId, offset: usize) -> Self {
        let position = Position::new(node, offset);
        Self {
            anchor: position,
            focus: position,
        }
    }

    pub fn range(anchor: Position, focus: Position) -> Self {
        Self { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// Serialized selection, valid across re-renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionStatus {
    pub anchor_address: Address,
    pub starting_offset: usize,
    /// Selected length in chars, 0 for a caret
    pub selection_extent: usize,
    pub anchor_address_approx: Option<Address>,
}

/// Directional hint overriding where the caret lands after a render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaretToken {
    /// Start of the restored text node
    Zero,
    /// End of the nearest text before the caret's block
    PrevLine,
    /// Start of the nearest text after the caret's block
    NextLine,
    /// End of the previous text node inside the same block
    PrevElement,
    /// Start of the next text node
    NextElement,
    /// Stay if editable, otherwise the next editable text
    NextEditable,
}

// ---- capture -------------------------------------------------------------

fn first_text_from(live: &Document, start: NodeId) -> Option<NodeId> {
    let mut current = Some(start);
    while let Some(node) = current {
        if live.is_text(node) {
            return Some(node);
        }
        current = live.next_in_order(node);
    }
    None
}

fn last_text_through(live: &Document, node: NodeId) -> Option<NodeId> {
    // start from the deepest last descendant and walk backwards
    let mut current = node;
    while let Some(last) = live.last_child(current) {
        current = last;
    }
    let mut cursor = Some(current);
    while let Some(candidate) = cursor {
        if live.is_text(candidate) {
            return Some(candidate);
        }
        cursor = live.previous_in_order(candidate);
    }
    None
}

/// Move a position onto a text node where possible
fn text_point(live: &Document, position: Position) -> Position {
    if live.is_text(position.node) {
        return Position::new(position.node, position.offset.min(live.text_len(position.node)));
    }
    let children = live.children(position.node);
    let found = match children.get(position.offset) {
        Some(&child) => first_text_from(live, child).map(|text| Position::new(text, 0)),
        None => last_text_through(live, position.node)
            .map(|text| Position::new(text, live.text_len(text))),
    };
    found.unwrap_or(Position::new(position.node, 0))
}

fn global_offset(live: &Document, position: Position) -> usize {
    live.text_offset(live.root(), position.node, position.offset)
        .unwrap_or(0)
}

/// Serialize `selection`. `None` without a selection or for a range that
/// covers no text.
pub fn capture(
    live: &Document,
    selection: Option<&Selection>,
    options: AddressOptions,
) -> Option<SelectionStatus> {
    let selection = selection?;
    let anchor = text_point(live, selection.anchor);
    let focus = text_point(live, selection.focus);

    let (start, extent) = if selection.is_collapsed() {
        (anchor, 0)
    } else {
        let a = global_offset(live, anchor);
        let f = global_offset(live, focus);
        if a == f {
            debug!("Dropping non-collapsed selection of zero length");
            return None;
        }
        if a < f {
            (anchor, f - a)
        } else {
            (focus, a - f)
        }
    };

    Some(SelectionStatus {
        anchor_address: encode(live, start.node, options)?,
        starting_offset: start.offset,
        selection_extent: extent,
        anchor_address_approx: encode_approximate(live, start.node),
    })
}

// ---- restore -------------------------------------------------------------

fn locate(live: &Document, status: &SelectionStatus, options: AddressOptions) -> (NodeId, bool) {
    if let Some(node) = decode(live, &status.anchor_address, options) {
        return (node, true);
    }
    if let Some(node) = status
        .anchor_address_approx
        .as_ref()
        .and_then(|address| decode(live, address, options))
    {
        return (node, false);
    }

    let mut current = status.anchor_address.clone();
    for _ in 0..status.anchor_address.len() {
        for delta in [1, -1] {
            if let Some(node) = current
                .sibling(delta)
                .and_then(|address| decode(live, &address, options))
            {
                return (node, false);
            }
        }
        let Some(parent) = current.parent() else {
            break;
        };
        if let Some(node) = decode(live, &parent, options) {
            return (node, false);
        }
        current = parent;
    }
    (live.root(), false)
}

fn block_scope(live: &Document, node: NodeId) -> NodeId {
    live.closest_block(node).unwrap_or_else(|| live.root())
}

/// Offsets past the end of the landing node carry into the following text
/// nodes of the same block
fn settle(live: &Document, landing: NodeId, offset: usize) -> Position {
    if !live.is_text(landing) {
        return match first_text_from_within(live, landing, landing) {
            Some(text) => Position::new(text, 0),
            None => Position::new(landing, 0),
        };
    }

    let scope = block_scope(live, landing);
    let mut node = landing;
    let mut remaining = offset;
    loop {
        let len = live.text_len(node);
        if remaining <= len {
            return Position::new(node, remaining);
        }
        match next_text_within(live, node, scope) {
            Some(next) => {
                remaining -= len;
                node = next;
            }
            None => return Position::new(node, len),
        }
    }
}

fn first_text_from_within(live: &Document, start: NodeId, scope: NodeId) -> Option<NodeId> {
    first_text_from(live, start).filter(|&text| live.contains(scope, text))
}

fn next_text_within(live: &Document, node: NodeId, scope: NodeId) -> Option<NodeId> {
    let mut current = live.next_in_order(node);
    while let Some(candidate) = current {
        if !live.contains(scope, candidate) {
            return None;
        }
        if live.is_text(candidate) {
            return Some(candidate);
        }
        current = live.next_in_order(candidate);
    }
    None
}

fn inside_synthetic(live: &Document, node: NodeId) -> bool {
    live.is_synthetic(node) || live.ancestors(node).any(|a| live.is_synthetic(a))
}

/// Text node a caret may be placed in
fn acceptable(live: &Document, node: NodeId) -> bool {
    live.is_text(node)
        && live.text(node) != Some("\n")
        && live.is_editable(node)
        && !inside_synthetic(live, node)
}

fn walk_forward(live: &Document, from: NodeId, accept: impl Fn(NodeId) -> bool) -> Option<NodeId> {
    let mut current = live.next_in_order(from);
    while let Some(node) = current {
        if accept(node) {
            return Some(node);
        }
        current = live.next_in_order(node);
    }
    None
}

fn walk_backward(live: &Document, from: NodeId, accept: impl Fn(NodeId) -> bool) -> Option<NodeId> {
    let mut current = live.previous_in_order(from);
    while let Some(node) = current {
        if accept(node) {
            return Some(node);
        }
        current = live.previous_in_order(node);
    }
    None
}

fn into_editable(live: &Document, position: Position) -> Position {
    if live.is_editable(position.node) {
        return position;
    }
    let editable_text = |node| live.is_text(node) && live.is_editable(node);
    if let Some(node) = walk_forward(live, position.node, editable_text) {
        return Position::new(node, 0);
    }
    if let Some(node) = walk_backward(live, position.node, editable_text) {
        return Position::new(node, live.text_len(node));
    }
    position
}

fn extend(live: &Document, anchor: Position, extent: usize) -> Position {
    let mut node = anchor.node;
    let mut remaining = extent + anchor.offset;
    loop {
        let len = live.text_len(node);
        if remaining <= len {
            return Position::new(node, remaining);
        }
        match walk_forward(live, node, |n| live.is_text(n)) {
            Some(next) => {
                remaining -= len;
                node = next;
            }
            None => return Position::new(node, len),
        }
    }
}

fn empty_block(live: &Document, node: NodeId) -> bool {
    live.is_block(node)
        && live.is_editable(node)
        && !inside_synthetic(live, node)
        && !live.descendants(node).any(|d| live.is_text(d))
}

/// Where `token` moves a caret at `position`, if anywhere
pub fn resolve_token(live: &Document, position: Position, token: CaretToken) -> Option<Position> {
    let node = position.node;
    match token {
        CaretToken::Zero => Some(Position::new(node, 0)),

        CaretToken::NextEditable => {
            if acceptable(live, node) {
                Some(position)
            } else {
                walk_forward(live, node, |n| acceptable(live, n)).map(|n| Position::new(n, 0))
            }
        }

        CaretToken::NextElement => {
            walk_forward(live, node, |n| acceptable(live, n)).map(|n| Position::new(n, 0))
        }

        CaretToken::PrevElement => {
            let scope = block_scope(live, node);
            walk_backward(live, node, |n| acceptable(live, n))
                .filter(|&n| live.contains(scope, n))
                .map(|n| Position::new(n, live.text_len(n)))
        }

        CaretToken::NextLine => {
            let block = live.closest_block(node)?;
            let mut current = live.next_after(block);
            while let Some(candidate) = current {
                if acceptable(live, candidate) || empty_block(live, candidate) {
                    return Some(Position::new(candidate, 0));
                }
                current = live.next_in_order(candidate);
            }
            None
        }

        CaretToken::PrevLine => {
            let block = live.closest_block(node)?;
            walk_backward(live, block, |n| {
                !live.contains(n, block) && (acceptable(live, n) || empty_block(live, n))
            })
            .map(|n| Position::new(n, live.text_len(n)))
        }
    }
}

/// Place a captured selection in a freshly rendered `live` tree
pub fn restore(
    live: &Document,
    status: &SelectionStatus,
    token: Option<CaretToken>,
    options: AddressOptions,
) -> Selection {
    let (landing, exact) = locate(live, status, options);
    if !exact {
        debug!(address = %status.anchor_address, "Selection anchor moved, recovering nearby");
    }

    let anchor = into_editable(live, settle(live, landing, status.starting_offset));

    let mut selection = if exact && status.selection_extent > 0 && anchor.node == landing {
        Selection::range(anchor, extend(live, anchor, status.selection_extent))
    } else {
        Selection::caret(anchor.node, anchor.offset)
    };

    if let Some(token) = token {
        match resolve_token(live, anchor, token) {
            Some(position) => selection = Selection::caret(position.node, position.offset),
            None => debug!(?token, "Caret token found no target"),
        }
    }
    selection
}
