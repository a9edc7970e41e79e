//! # Rollback & Operation Builder
//!
//! Turns raw change records into operations addressed against the model,
//! undoing each change on the live tree as it goes.
//!
//! ## Design
//!
//! Records are consumed newest-first. Rolling back a change puts the live
//! tree in exactly the state it had right before that change, which is
//! the state its operation's addresses are computed against. Applying the
//! produced list last-to-first therefore replays the edits in their
//! original order against a model that matches each address.
//!
//! - Text: value restored; only the newest record per node emits
//! - Removal: node re-inserted; REMOVE carries a copy of the subtree
//! - Insertion: node detached; ADD carries a copy of the subtree
//!
//! Synthetic nodes, and anything changed inside them, are rolled back like
//! any other node but never produce operations of their own. Their removal still reaches any removal
//! listener registered for them.

use crate::address::{encode, Address, AddressOptions};
use crate::operation::Operation;
use marrow_dom::text::{leading_whitespace, trailing_whitespace};
use marrow_dom::{ChangeKind, ChangeRecord, Document, NodeId, VNode, ID_ATTR, SYNTHETIC_ATTR};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Re-parses edited text into structured nodes
pub trait TextTransform {
    /// `None` (or an empty list) means the text could not be transformed
    fn transform(&self, text: &str) -> Option<Vec<VNode>>;
}

impl<F> TextTransform for F
where
    F: Fn(&str) -> Option<Vec<VNode>>,
{
    fn transform(&self, text: &str) -> Option<Vec<VNode>> {
        self(text)
    }
}

/// What a removal listener gets to see
pub struct RemovalContext<'a> {
    /// Live tree with the removal already rolled back
    pub live: &'a Document,
    pub node: NodeId,
    /// Address of the node before it was removed
    pub address: &'a Address,
}

pub type RemovalListener = Box<dyn Fn(&RemovalContext<'_>) -> Vec<Operation>>;

/// Callbacks fired when the removal of a particular live node is rolled back
#[derive(Default)]
pub struct RemovalListeners {
    listeners: HashMap<NodeId, RemovalListener>,
}

impl RemovalListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_removal(
        &mut self,
        node: NodeId,
        listener: impl Fn(&RemovalContext<'_>) -> Vec<Operation> + 'static,
    ) {
        self.listeners.insert(node, Box::new(listener));
    }

    pub fn notify(&self, context: &RemovalContext<'_>) -> Vec<Operation> {
        self.listeners
            .get(&context.node)
            .map(|listener| listener(context))
            .unwrap_or_default()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.listeners.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl fmt::Debug for RemovalListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemovalListeners")
            .field("nodes", &self.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Result of one build pass. Both lists are in production order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltOperations {
    pub operations: Vec<Operation>,
    /// Operations returned by removal listeners
    pub derived: Vec<Operation>,
}

impl BuiltOperations {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.derived.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len() + self.derived.len()
    }
}

pub struct OperationBuilder {
    options: AddressOptions,
    transform: Option<Box<dyn TextTransform>>,
}

impl OperationBuilder {
    pub fn new(options: AddressOptions) -> Self {
        Self {
            options,
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: impl TextTransform + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn set_transform(&mut self, transform: Option<Box<dyn TextTransform>>) {
        self.transform = transform;
    }

    pub fn has_transform(&self) -> bool {
        self.transform.is_some()
    }

    pub fn options(&self) -> AddressOptions {
        self.options
    }

    /// Roll back `records` (oldest first, as delivered) on `live` and
    /// translate them into operations
    pub fn build(
        &self,
        live: &mut Document,
        records: Vec<ChangeRecord>,
        listeners: &RemovalListeners,
    ) -> BuiltOperations {
        let mut built = BuiltOperations::default();
        let mut seen_text: HashSet<NodeId> = HashSet::new();

        for record in records.iter().rev() {
            match record.kind {
                ChangeKind::Text => self.rollback_text(live, record, &mut seen_text, &mut built),
                ChangeKind::Remove => self.rollback_removal(live, record, listeners, &mut built),
                ChangeKind::Add => self.rollback_addition(live, record, &mut built),
            }
        }

        if !records.is_empty() {
            debug!(
                records = records.len(),
                operations = built.operations.len(),
                derived = built.derived.len(),
                "Built operations"
            );
        }
        built
    }

    fn rollback_text(
        &self,
        live: &mut Document,
        record: &ChangeRecord,
        seen_text: &mut HashSet<NodeId>,
        built: &mut BuiltOperations,
    ) {
        let node = record.target;
        let (Some(current), Some(old)) = (live.text(node).map(str::to_owned), &record.old_text)
        else {
            return;
        };
        if live.set_text(node, old.as_str()).is_err() {
            return;
        }
        if !seen_text.insert(node) {
            // superseded by a newer record for the same node
            return;
        }
        if within_synthetic(live, node) {
            return;
        }
        let Some(target) = encode(live, node, self.options) else {
            debug!("Text change on a detached node");
            return;
        };

        match &self.transform {
            None => built.operations.push(Operation::Text {
                target,
                text: Some(current),
                previous: Some(old.clone()),
            }),
            Some(transform) => {
                let produced = transform.transform(&current).unwrap_or_default();
                self.transformed_text(live, node, target, &current, old, produced, built);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn transformed_text(
        &self,
        live: &Document,
        node: NodeId,
        target: Address,
        text: &str,
        old: &str,
        produced: Vec<VNode>,
        built: &mut BuiltOperations,
    ) {
        if produced.is_empty() {
            if !text.is_empty() {
                warn!(target = %target, "Transform produced nothing, skipping change");
                return;
            }
            if let Some(parent) = live.parent(node).and_then(|p| encode(live, p, self.options)) {
                built.operations.push(Operation::Remove {
                    parent,
                    target,
                    node: Some(VNode::text(old)),
                });
            }
            return;
        }

        if let [VNode::Text { content }] = produced.as_slice() {
            built.operations.push(Operation::Text {
                target,
                text: Some(keep_boundary_whitespace(text, content)),
                previous: Some(old.to_string()),
            });
            return;
        }

        let block_output = produced.iter().any(VNode::is_block);
        let scope = if block_output {
            live.closest_block(node)
        } else {
            live.parent(node).filter(|&parent| parent != live.root())
        };

        let (scope, replacement) = match scope {
            Some(scope) if block_output => (scope, split_block(live, scope, node, produced)),
            Some(scope) => {
                let padded = pad_boundaries(text, produced);
                (scope, export_replacing(live, scope, node, &padded))
            }
            None if block_output => (node, produced),
            None => (node, pad_boundaries(text, produced)),
        };

        let Some(scope_parent) = live.parent(scope) else {
            return;
        };
        let (Some(parent), Some(scope_address)) = (
            encode(live, scope_parent, self.options),
            encode(live, scope, self.options),
        ) else {
            return;
        };
        let sibling = authored_sibling_after(live, scope)
            .and_then(|sibling| encode(live, sibling, self.options));

        debug!(scope = %scope_address, nodes = replacement.len(), "Replacing transformed scope");

        // REMOVE goes on the stack first so the ADD lands in front of the
        // scope's next sibling while the scope's own address is intact
        built.operations.push(Operation::Remove {
            parent: parent.clone(),
            target: scope_address,
            node: Some(export_authored(live, scope)),
        });
        built.operations.push(Operation::Add {
            parent,
            sibling,
            nodes: replacement,
        });
    }

    fn rollback_removal(
        &self,
        live: &mut Document,
        record: &ChangeRecord,
        listeners: &RemovalListeners,
        built: &mut BuiltOperations,
    ) {
        let parent = record.target;
        for &node in &record.removed {
            let reference = record
                .next_sibling
                .filter(|&sibling| live.parent(sibling) == Some(parent));
            if let Err(err) = live.insert_before(parent, node, reference) {
                warn!(error = %err, "Could not roll back removal");
                continue;
            }

            let (Some(parent_address), Some(address)) = (
                encode(live, parent, self.options),
                encode(live, node, self.options),
            ) else {
                continue;
            };

            if !within_synthetic(live, node) {
                built.operations.push(Operation::Remove {
                    parent: parent_address,
                    target: address.clone(),
                    node: Some(export_authored(live, node)),
                });
            }

            let context = RemovalContext {
                live,
                node,
                address: &address,
            };
            built.derived.extend(listeners.notify(&context));
        }
    }

    fn rollback_addition(&self, live: &mut Document, record: &ChangeRecord, built: &mut BuiltOperations) {
        let parent = record.target;
        for &node in &record.added {
            if live.parent(node) != Some(parent) {
                debug!("Added node moved since, skipping");
                continue;
            }
            let sibling = authored_sibling_after(live, node);
            live.detach(node);
            if live.is_synthetic(node) || within_synthetic(live, parent) {
                continue;
            }

            let Some(parent_address) = encode(live, parent, self.options) else {
                continue;
            };
            let sibling = sibling.and_then(|sibling| encode(live, sibling, self.options));
            built.operations.push(Operation::Add {
                parent: parent_address,
                sibling,
                nodes: vec![export_authored(live, node)],
            });
        }
    }
}

impl Default for OperationBuilder {
    fn default() -> Self {
        Self::new(AddressOptions::default())
    }
}

fn authored_sibling_after(live: &Document, node: NodeId) -> Option<NodeId> {
    let mut current = live.next_sibling(node);
    while let Some(sibling) = current {
        if !live.is_synthetic(sibling) {
            return Some(sibling);
        }
        current = live.next_sibling(sibling);
    }
    None
}

/// Whether `node` is a decoration or sits inside one
fn within_synthetic(live: &Document, node: NodeId) -> bool {
    live.is_synthetic(node) || live.ancestors(node).any(|ancestor| live.is_synthetic(ancestor))
}

fn is_synthetic_vnode(node: &VNode) -> bool {
    matches!(node, VNode::Element { attributes, .. } if attributes.contains_key(SYNTHETIC_ATTR))
}

fn strip_synthetic(node: &mut VNode) {
    if let VNode::Element { children, .. } = node {
        children.retain(|child| !is_synthetic_vnode(child));
        children.iter_mut().for_each(strip_synthetic);
    }
}

/// Copy of a subtree without the decorations widgets put into it
pub fn export_authored(live: &Document, node: NodeId) -> VNode {
    let mut vnode = live.export(node);
    strip_synthetic(&mut vnode);
    vnode
}

/// Copy of `scope` with `target` swapped for `replacement`
fn export_replacing(
    live: &Document,
    scope: NodeId,
    target: NodeId,
    replacement: &[VNode],
) -> Vec<VNode> {
    if scope == target {
        return replacement.to_vec();
    }
    if live.is_synthetic(scope) {
        return Vec::new();
    }
    match live.tag(scope) {
        None => vec![live.export(scope)],
        Some(tag) => {
            let children = live
                .children(scope)
                .iter()
                .flat_map(|&child| export_replacing(live, child, target, replacement))
                .collect();
            vec![VNode::Element {
                tag: tag.to_string(),
                attributes: live.attributes(scope).cloned().unwrap_or_default(),
                children,
            }]
        }
    }
}

fn shallow_with(live: &Document, node: NodeId, children: Vec<VNode>) -> Option<VNode> {
    if children.is_empty() {
        return None;
    }
    Some(VNode::Element {
        tag: live.tag(node)?.to_string(),
        attributes: live.attributes(node).cloned().unwrap_or_default(),
        children,
    })
}

/// Split `current` around `target`: copies of what precedes and follows it
fn split_around(live: &Document, current: NodeId, target: NodeId) -> (Option<VNode>, Option<VNode>) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut passed = false;

    for &child in live.children(current) {
        if child == target {
            passed = true;
        } else if live.contains(child, target) {
            let (left, right) = split_around(live, child, target);
            before.extend(left);
            after.extend(right);
            passed = true;
        } else if !live.is_synthetic(child) {
            if passed {
                after.push(live.export(child));
            } else {
                before.push(live.export(child));
            }
        }
    }

    let right = shallow_with(live, current, after).map(|mut copy| {
        if let VNode::Element { attributes, .. } = &mut copy {
            attributes.remove(ID_ATTR);
        }
        copy
    });
    (shallow_with(live, current, before), right)
}

/// Replacement for a block whose text produced block-level nodes: the block
/// is cut at the edited text so nothing block-level ends up inline
fn split_block(live: &Document, block: NodeId, target: NodeId, produced: Vec<VNode>) -> Vec<VNode> {
    let (left, right) = split_around(live, block, target);
    left.into_iter().chain(produced).chain(right).collect()
}

fn keep_boundary_whitespace(original: &str, produced: &str) -> String {
    if original.trim().is_empty() {
        return original.to_string();
    }
    format!(
        "{}{}{}",
        leading_whitespace(original),
        produced.trim(),
        trailing_whitespace(original)
    )
}

/// Restore whitespace the transform trimmed off the edges of its output
fn pad_boundaries(original: &str, mut produced: Vec<VNode>) -> Vec<VNode> {
    if original.trim().is_empty() {
        return produced;
    }

    if !leading_whitespace(original).is_empty() {
        match produced.first_mut() {
            Some(VNode::Text { content }) => {
                if !content.starts_with(char::is_whitespace) {
                    content.insert(0, ' ');
                }
            }
            Some(_) => produced.insert(0, VNode::text(" ")),
            None => {}
        }
    }

    if !trailing_whitespace(original).is_empty() {
        match produced.last_mut() {
            Some(VNode::Text { content }) => {
                if !content.ends_with(char::is_whitespace) {
                    content.push(' ');
                }
            }
            Some(_) => produced.push(VNode::text(" ")),
            None => {}
        }
    }
    produced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationKind;
    use std::cell::Cell;
    use std::rc::Rc;

    fn record_edits(doc: &mut Document, edit: impl FnOnce(&mut Document)) -> Vec<ChangeRecord> {
        doc.observe();
        edit(doc);
        doc.disconnect()
    }

    fn kinds(ops: &[Operation]) -> Vec<OperationKind> {
        ops.iter().map(Operation::kind).collect()
    }

    /// Wraps `*x*` in `<em>`, leaves other text alone
    fn emphasis(text: &str) -> Option<Vec<VNode>> {
        let trimmed = text.trim();
        let Some(start) = trimmed.find('*') else {
            return Some(vec![VNode::text(trimmed)]);
        };
        let rest = &trimmed[start + 1..];
        let end = rest.find('*')?;
        let mut nodes = Vec::new();
        if start > 0 {
            nodes.push(VNode::text(&trimmed[..start]));
        }
        nodes.push(VNode::element("em").with_child(VNode::text(&rest[..end])));
        if end + 1 < rest.len() {
            nodes.push(VNode::text(&rest[end + 1..]));
        }
        Some(nodes)
    }

    #[test]
    fn test_empty_queue_is_idempotent() {
        let mut live = Document::from_fragment("div", "<p>x</p>").unwrap();
        let built = OperationBuilder::default().build(&mut live, Vec::new(), &RemovalListeners::new());
        assert!(built.is_empty());
        assert_eq!(live.inner_html(live.root()), "<p>x</p>");
    }

    #[test]
    fn test_text_without_transform() {
        let mut live = Document::from_fragment("div", "<p>Hello</p>").unwrap();
        let p = live.children(live.root())[0];
        let text = live.children(p)[0];
        let records = record_edits(&mut live, |doc| {
            doc.set_text(text, "Hello!").unwrap();
        });

        let built = OperationBuilder::default().build(&mut live, records, &RemovalListeners::new());
        assert_eq!(
            built.operations,
            vec![Operation::Text {
                target: "/p[1]/text()[1]".parse().unwrap(),
                text: Some("Hello!".into()),
                previous: Some("Hello".into()),
            }]
        );
        assert_eq!(live.inner_html(live.root()), "<p>Hello</p>");
    }

    #[test]
    fn test_only_newest_text_record_emits() {
        let mut live = Document::from_fragment("div", "<p>a</p>").unwrap();
        let p = live.children(live.root())[0];
        let text = live.children(p)[0];
        let records = record_edits(&mut live, |doc| {
            for value in ["ab", "abc", "abcd"] {
                doc.set_text(text, value).unwrap();
            }
        });

        let built = OperationBuilder::default().build(&mut live, records, &RemovalListeners::new());
        assert_eq!(built.operations.len(), 1);
        match &built.operations[0] {
            Operation::Text { text, previous, .. } => {
                assert_eq!(text.as_deref(), Some("abcd"));
                assert_eq!(previous.as_deref(), Some("abc"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(live.text(text), Some("a"));
    }

    #[test]
    fn test_structural_rollback_restores_live_tree() {
        let mut live = Document::from_fragment("div", "<p>one</p><p>two</p><p>three</p>").unwrap();
        let before = live.to_html();
        let root = live.root();
        let second = live.children(root)[1];

        let records = record_edits(&mut live, |doc| {
            doc.detach(second);
            let fresh = doc.create_element("h2");
            let t = doc.create_text("new");
            doc.append_child(fresh, t).unwrap();
            let first = doc.children(root)[0];
            doc.insert_before(root, fresh, Some(first)).unwrap();
            doc.append_child(root, second).unwrap();
        });
        assert_eq!(records.len(), 3);

        let built = OperationBuilder::default().build(&mut live, records, &RemovalListeners::new());
        assert_eq!(live.to_html(), before);
        assert_eq!(
            kinds(&built.operations),
            vec![
                OperationKind::Add,
                OperationKind::Add,
                OperationKind::Remove
            ]
        );
    }

    #[test]
    fn test_add_sibling_skips_synthetic_nodes() {
        let mut live =
            Document::from_fragment("div", r#"<p>a</p><span data-generated="">*</span><p>b</p>"#)
                .unwrap();
        let root = live.root();
        let marker = live.children(root)[1];

        let records = record_edits(&mut live, |doc| {
            let fresh = doc.create_element("p");
            doc.insert_before(root, fresh, Some(marker)).unwrap();
        });
        let built = OperationBuilder::default().build(&mut live, records, &RemovalListeners::new());
        match &built.operations[0] {
            Operation::Add { sibling, .. } => {
                assert_eq!(sibling.as_ref().map(ToString::to_string).as_deref(), Some("/p[2]"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_synthetic_changes_roll_back_silently() {
        let mut live =
            Document::from_fragment("div", r#"<p>a</p><span data-generated="">*</span>"#).unwrap();
        let before = live.to_html();
        let root = live.root();
        let marker = live.children(root)[1];

        let records = record_edits(&mut live, |doc| {
            doc.detach(marker);
            let extra = doc.create_element("i");
            doc.set_attribute(extra, SYNTHETIC_ATTR, "").unwrap();
            doc.append_child(root, extra).unwrap();
        });
        let built = OperationBuilder::default().build(&mut live, records, &RemovalListeners::new());
        assert!(built.is_empty());
        assert_eq!(live.to_html(), before);
    }

    #[test]
    fn test_edits_inside_decorations_roll_back_silently() {
        let mut live = Document::from_fragment(
            "div",
            r#"<p>a<span data-generated="">#</span><em>b</em></p>"#,
        )
        .unwrap();
        let before = live.to_html();
        let p = live.children(live.root())[0];
        let marker = live.children(p)[1];
        let marker_text = live.children(marker)[0];

        let records = record_edits(&mut live, |doc| {
            doc.set_text(marker_text, "x").unwrap();
            let extra = doc.create_element("i");
            doc.append_child(marker, extra).unwrap();
            doc.detach(marker_text);
        });
        assert_eq!(records.len(), 3);

        let built = OperationBuilder::default().build(&mut live, records, &RemovalListeners::new());
        assert!(built.is_empty());
        assert_eq!(live.to_html(), before);
    }

    #[test]
    fn test_authored_edit_beside_decoration_still_emits() {
        let mut live = Document::from_fragment(
            "div",
            r#"<p>a<span data-generated="">#</span><em>b</em></p>"#,
        )
        .unwrap();
        let p = live.children(live.root())[0];
        let em = live.children(p)[2];
        let em_text = live.children(em)[0];

        let records = record_edits(&mut live, |doc| {
            doc.set_text(em_text, "bc").unwrap();
        });
        let built = OperationBuilder::default().build(&mut live, records, &RemovalListeners::new());
        match &built.operations[..] {
            [Operation::Text { target, .. }] => {
                assert_eq!(target.to_string(), "/p[1]/em[1]/text()[1]")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_removal_payload_is_deep_copy() {
        let mut live = Document::from_fragment("div", "<ul><li>a <b>b</b></li></ul>").unwrap();
        let ul = live.children(live.root())[0];
        let li = live.children(ul)[0];

        let records = record_edits(&mut live, |doc| {
            doc.detach(li);
        });
        let built = OperationBuilder::default().build(&mut live, records, &RemovalListeners::new());
        match &built.operations[0] {
            Operation::Remove { parent, target, node } => {
                assert_eq!(parent.to_string(), "/ul[1]");
                assert_eq!(target.to_string(), "/ul[1]/li[1]");
                assert_eq!(node.as_ref().map(VNode::to_html).as_deref(), Some("<li>a <b>b</b></li>"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_removal_listener_produces_derived_operations() {
        let mut live =
            Document::from_fragment("div", r#"<p>a<span data-generated="">#</span></p>"#).unwrap();
        let p = live.children(live.root())[0];
        let marker = live.children(p)[1];

        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let mut listeners = RemovalListeners::new();
        listeners.on_removal(marker, move |ctx| {
            seen.set(seen.get() + 1);
            assert_eq!(ctx.live.parent(ctx.node).map(|_| ()), Some(()));
            vec![Operation::Remove {
                parent: Address::root(),
                target: "/p[1]".parse().unwrap(),
                node: None,
            }]
        });

        let records = record_edits(&mut live, |doc| {
            doc.detach(marker);
        });
        let built = OperationBuilder::default().build(&mut live, records, &listeners);
        assert!(built.operations.is_empty());
        assert_eq!(kinds(&built.derived), vec![OperationKind::Remove]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_transform_single_text_keeps_boundary_whitespace() {
        let mut live = Document::from_fragment("div", "<p>a<b>x</b> tail </p>").unwrap();
        let p = live.children(live.root())[0];
        let text = live.children(p)[2];
        let records = record_edits(&mut live, |doc| {
            doc.set_text(text, " tails ").unwrap();
        });

        let builder = OperationBuilder::default().with_transform(emphasis);
        let built = builder.build(&mut live, records, &RemovalListeners::new());
        match &built.operations[..] {
            [Operation::Text { text, .. }] => assert_eq!(text.as_deref(), Some(" tails ")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_transform_inline_output_replaces_parent() {
        let mut live = Document::from_fragment("div", "<p>say hi now</p><p>z</p>").unwrap();
        let p = live.children(live.root())[0];
        let text = live.children(p)[0];
        let records = record_edits(&mut live, |doc| {
            doc.set_text(text, "say *hi* now").unwrap();
        });

        let builder = OperationBuilder::default().with_transform(emphasis);
        let built = builder.build(&mut live, records, &RemovalListeners::new());
        assert_eq!(kinds(&built.operations), vec![OperationKind::Remove, OperationKind::Add]);
        match &built.operations[1] {
            Operation::Add {
                parent,
                sibling,
                nodes,
            } => {
                assert!(parent.is_root());
                assert_eq!(sibling.as_ref().map(ToString::to_string).as_deref(), Some("/p[2]"));
                assert_eq!(fragment(nodes), "<p>say <em>hi</em> now</p>");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(live.text(text), Some("say hi now"));
    }

    #[test]
    fn test_transform_block_output_splits_block() {
        let mut live = Document::from_fragment("div", "<p><i>a</i>mid<i>b</i></p>").unwrap();
        let p = live.children(live.root())[0];
        let text = live.children(p)[1];
        let records = record_edits(&mut live, |doc| {
            doc.set_text(text, "# mid").unwrap();
        });

        let heading = |text: &str| -> Option<Vec<VNode>> {
            let title = text.strip_prefix("# ")?;
            Some(vec![VNode::element("h1").with_child(VNode::text(title))])
        };
        let builder = OperationBuilder::default().with_transform(heading);
        let built = builder.build(&mut live, records, &RemovalListeners::new());
        match &built.operations[..] {
            [Operation::Remove { target, .. }, Operation::Add { nodes, .. }] => {
                assert_eq!(target.to_string(), "/p[1]");
                assert_eq!(fragment(nodes), "<p><i>a</i></p><h1>mid</h1><p><i>b</i></p>");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_transform_split_keeps_id_on_the_left_part_only() {
        let mut live =
            Document::from_fragment("div", r#"<p id="k"><i>a</i>mid<i>b</i></p>"#).unwrap();
        let p = live.children(live.root())[0];
        let text = live.children(p)[1];
        let records = record_edits(&mut live, |doc| {
            doc.set_text(text, "# mid").unwrap();
        });

        let heading = |text: &str| -> Option<Vec<VNode>> {
            let title = text.strip_prefix("# ")?;
            Some(vec![VNode::element("h1").with_child(VNode::text(title))])
        };
        let builder = OperationBuilder::default().with_transform(heading);
        let built = builder.build(&mut live, records, &RemovalListeners::new());
        match &built.operations[..] {
            [Operation::Remove { target, .. }, Operation::Add { nodes, .. }] => {
                assert_eq!(target.to_string(), r#"id("k")"#);
                assert_eq!(
                    fragment(nodes),
                    r#"<p id="k"><i>a</i></p><h1>mid</h1><p><i>b</i></p>"#
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_transform_nothing_for_empty_text_removes_it() {
        let mut live = Document::from_fragment("div", "<p>a<b>b</b></p>").unwrap();
        let p = live.children(live.root())[0];
        let text = live.children(p)[0];
        let records = record_edits(&mut live, |doc| {
            doc.set_text(text, "").unwrap();
        });

        let builder = OperationBuilder::default().with_transform(|_: &str| -> Option<Vec<VNode>> { None });
        let built = builder.build(&mut live, records, &RemovalListeners::new());
        match &built.operations[..] {
            [Operation::Remove { target, .. }] => assert_eq!(target.to_string(), "/p[1]/text()[1]"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_transform_nothing_for_text_skips_change() {
        let mut live = Document::from_fragment("div", "<p>a</p>").unwrap();
        let p = live.children(live.root())[0];
        let text = live.children(p)[0];
        let records = record_edits(&mut live, |doc| {
            doc.set_text(text, "ab").unwrap();
        });

        let builder = OperationBuilder::default().with_transform(|_: &str| -> Option<Vec<VNode>> { None });
        let built = builder.build(&mut live, records, &RemovalListeners::new());
        assert!(built.is_empty());
        assert_eq!(live.text(text), Some("a"));
    }

    #[test]
    fn test_pad_boundaries() {
        let padded = pad_boundaries(" x ", vec![VNode::element("em")]);
        assert_eq!(padded.len(), 3);
        assert_eq!(padded[0], VNode::text(" "));
        assert_eq!(padded[2], VNode::text(" "));

        let padded = pad_boundaries(" a *b*", vec![VNode::text("a"), VNode::element("em")]);
        assert_eq!(padded[0], VNode::text(" a"));
        assert_eq!(padded.len(), 2);

        assert_eq!(keep_boundary_whitespace("  ", "x"), "  ");
        assert_eq!(keep_boundary_whitespace(" a\n", "a"), " a\n");
    }

    fn fragment(nodes: &[VNode]) -> String {
        marrow_dom::fragment_to_html(nodes)
    }
}
