//! # Operations
//!
//! Normalized, address-based instructions replayed against the model tree.
//!
//! ## Semantics
//!
//! ### TEXT
//! - Target must resolve to a text node
//! - Atomic replacement of the whole value, `None` clears it
//!
//! ### ADD
//! - Parent must resolve to an element
//! - A sibling that no longer resolves downgrades to an append
//! - `nodes` land in order, as one unit
//!
//! ### REMOVE
//! - Parent and target must both resolve, target must be a child of parent
//!
//! ### REPLACE / ATTR
//! - Target must resolve; ATTR needs an element
//!
//! Addresses are computed against the tree state right before the change
//! they describe, which is why a batch is applied last-produced-first.

use crate::address::{decode, Address, AddressOptions};
use crate::errors::OperationError;
use marrow_dom::{Document, NodeId, VNode};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Operation {
    /// Replace the value of a text node
    Text {
        target: Address,
        text: Option<String>,
        /// Value before the edit, kept for diagnostics
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<String>,
    },

    /// Insert nodes under `parent`, before `sibling` or at the end
    Add {
        parent: Address,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sibling: Option<Address>,
        nodes: Vec<VNode>,
    },

    /// Detach `target` from `parent`
    Remove {
        parent: Address,
        target: Address,
        /// Copy of the removed subtree
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node: Option<VNode>,
    },

    /// Substitute `target` with `nodes` in place
    Replace { target: Address, nodes: Vec<VNode> },

    /// Set (or, with `None`, remove) one attribute
    Attr {
        target: Address,
        name: String,
        value: Option<String>,
    },
}

/// Discriminant of an [`Operation`], mostly for logs and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Text,
    Add,
    Remove,
    Replace,
    Attr,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Text { .. } => OperationKind::Text,
            Operation::Add { .. } => OperationKind::Add,
            Operation::Remove { .. } => OperationKind::Remove,
            Operation::Replace { .. } => OperationKind::Replace,
            Operation::Attr { .. } => OperationKind::Attr,
        }
    }

    /// Address the operation is primarily about
    pub fn address(&self) -> &Address {
        match self {
            Operation::Text { target, .. }
            | Operation::Remove { target, .. }
            | Operation::Replace { target, .. }
            | Operation::Attr { target, .. } => target,
            Operation::Add { parent, .. } => parent,
        }
    }

    /// Apply to the model tree
    pub fn apply(&self, model: &mut Document, options: AddressOptions) -> Result<(), OperationError> {
        match self {
            Operation::Text { target, text, .. } => {
                Self::apply_text(model, options, target, text.as_deref().unwrap_or(""))
            }

            Operation::Add {
                parent,
                sibling,
                nodes,
            } => Self::apply_add(model, options, parent, sibling.as_ref(), nodes),

            Operation::Remove { parent, target, .. } => {
                Self::apply_remove(model, options, parent, target)
            }

            Operation::Replace { target, nodes } => {
                Self::apply_replace(model, options, target, nodes)
            }

            Operation::Attr {
                target,
                name,
                value,
            } => Self::apply_attr(model, options, target, name, value.as_deref()),
        }
    }

    fn resolve(
        model: &Document,
        options: AddressOptions,
        address: &Address,
    ) -> Result<NodeId, OperationError> {
        decode(model, address, options).ok_or_else(|| OperationError::TargetNotFound(address.clone()))
    }

    fn apply_text(
        model: &mut Document,
        options: AddressOptions,
        target: &Address,
        text: &str,
    ) -> Result<(), OperationError> {
        let node = Self::resolve(model, options, target)?;
        if !model.is_text(node) {
            return Err(OperationError::NotText(target.clone()));
        }
        model.set_text(node, text)?;
        Ok(())
    }

    fn apply_add(
        model: &mut Document,
        options: AddressOptions,
        parent: &Address,
        sibling: Option<&Address>,
        nodes: &[VNode],
    ) -> Result<(), OperationError> {
        let parent_node = decode(model, parent, options)
            .ok_or_else(|| OperationError::ParentNotFound(parent.clone()))?;
        if !model.is_element(parent_node) {
            return Err(OperationError::NotAnElement(parent.clone()));
        }

        let reference = match sibling {
            Some(address) => {
                let found = decode(model, address, options)
                    .filter(|&node| model.parent(node) == Some(parent_node));
                if found.is_none() {
                    debug!(sibling = %address, "Sibling not found, appending");
                }
                found
            }
            None => None,
        };

        for vnode in nodes {
            let node = model.import(vnode);
            model.insert_before(parent_node, node, reference)?;
        }
        Ok(())
    }

    fn apply_remove(
        model: &mut Document,
        options: AddressOptions,
        parent: &Address,
        target: &Address,
    ) -> Result<(), OperationError> {
        if target.is_approximate() {
            debug!(target = %target, "Removing through an approximate address");
        }
        let parent_node = decode(model, parent, options)
            .ok_or_else(|| OperationError::ParentNotFound(parent.clone()))?;
        let node = Self::resolve(model, options, target)?;
        model.remove_child(parent_node, node)?;
        Ok(())
    }

    fn apply_replace(
        model: &mut Document,
        options: AddressOptions,
        target: &Address,
        nodes: &[VNode],
    ) -> Result<(), OperationError> {
        let node = Self::resolve(model, options, target)?;
        let replacements: Vec<NodeId> = nodes.iter().map(|vnode| model.import(vnode)).collect();
        model.replace_with(node, &replacements)?;
        Ok(())
    }

    fn apply_attr(
        model: &mut Document,
        options: AddressOptions,
        target: &Address,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), OperationError> {
        let node = Self::resolve(model, options, target)?;
        if !model.is_element(node) {
            return Err(OperationError::NotAnElement(target.clone()));
        }
        match value {
            Some(value) => model.set_attribute(node, name, value)?,
            None => {
                model.remove_attribute(node, name)?;
            }
        }
        Ok(())
    }
}

/// Apply a group last-produced-first, stopping at the first failure
pub fn apply_stack(
    model: &mut Document,
    mut operations: Vec<Operation>,
    options: AddressOptions,
) -> Result<usize, OperationError> {
    let mut applied = 0;
    while let Some(operation) = operations.pop() {
        operation.apply(model, options)?;
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn model() -> Document {
        Document::from_fragment("div", "<p>Hello</p><p>World</p>").unwrap()
    }

    #[test]
    fn test_text_operation() {
        let mut doc = model();
        let op = Operation::Text {
            target: addr("/p[1]/text()[1]"),
            text: Some("Hello!".to_string()),
            previous: Some("Hello".to_string()),
        };
        op.apply(&mut doc, AddressOptions::default()).unwrap();
        assert_eq!(doc.inner_html(doc.root()), "<p>Hello!</p><p>World</p>");

        let clear = Operation::Text {
            target: addr("/p[2]/text()[1]"),
            text: None,
            previous: None,
        };
        clear.apply(&mut doc, AddressOptions::default()).unwrap();
        assert_eq!(doc.inner_html(doc.root()), "<p>Hello!</p><p></p>");
    }

    #[test]
    fn test_text_on_element_fails() {
        let mut doc = model();
        let op = Operation::Text {
            target: addr("/p[1]"),
            text: Some("x".to_string()),
            previous: None,
        };
        assert_eq!(
            op.apply(&mut doc, AddressOptions::default()),
            Err(OperationError::NotText(addr("/p[1]")))
        );
    }

    #[test]
    fn test_add_before_sibling_and_fallback_append() {
        let mut doc = model();
        let opts = AddressOptions::default();
        Operation::Add {
            parent: Address::root(),
            sibling: Some(addr("/p[2]")),
            nodes: vec![VNode::element("h1").with_child(VNode::text("T"))],
        }
        .apply(&mut doc, opts)
        .unwrap();
        assert_eq!(doc.inner_html(doc.root()), "<p>Hello</p><h1>T</h1><p>World</p>");

        Operation::Add {
            parent: Address::root(),
            sibling: Some(addr("/p[9]")),
            nodes: vec![VNode::element("hr"), VNode::element("p")],
        }
        .apply(&mut doc, opts)
        .unwrap();
        assert_eq!(
            doc.inner_html(doc.root()),
            "<p>Hello</p><h1>T</h1><p>World</p><hr><p></p>"
        );
    }

    #[test]
    fn test_add_missing_parent_fails() {
        let mut doc = model();
        let op = Operation::Add {
            parent: addr("/ul[1]"),
            sibling: None,
            nodes: vec![VNode::element("li")],
        };
        assert_eq!(
            op.apply(&mut doc, AddressOptions::default()),
            Err(OperationError::ParentNotFound(addr("/ul[1]")))
        );
    }

    #[test]
    fn test_remove_replace_attr() {
        let mut doc = model();
        let opts = AddressOptions::default();

        Operation::Attr {
            target: addr("/p[2]"),
            name: "class".into(),
            value: Some("lead".into()),
        }
        .apply(&mut doc, opts)
        .unwrap();
        Operation::Replace {
            target: addr("/p[1]"),
            nodes: vec![VNode::element("h2").with_child(VNode::text("Hi"))],
        }
        .apply(&mut doc, opts)
        .unwrap();
        assert_eq!(
            doc.inner_html(doc.root()),
            r#"<h2>Hi</h2><p class="lead">World</p>"#
        );

        Operation::Remove {
            parent: Address::root(),
            target: addr("/h2[1]"),
            node: None,
        }
        .apply(&mut doc, opts)
        .unwrap();
        assert_eq!(doc.inner_html(doc.root()), r#"<p class="lead">World</p>"#);
    }

    #[test]
    fn test_stack_order_add_then_remove_sibling() {
        // produced in reverse chronological order: the REMOVE of Y was
        // recorded after X was added in front of it
        let mut doc = Document::from_fragment("div", "<p>Y</p>").unwrap();
        let ops = vec![
            Operation::Remove {
                parent: Address::root(),
                target: addr("/p[2]"),
                node: None,
            },
            Operation::Add {
                parent: Address::root(),
                sibling: Some(addr("/p[1]")),
                nodes: vec![VNode::element("p").with_child(VNode::text("X"))],
            },
        ];
        let applied = apply_stack(&mut doc, ops, AddressOptions::default()).unwrap();
        assert_eq!(applied, 2);
        assert_eq!(doc.inner_html(doc.root()), "<p>X</p>");
    }

    #[test]
    fn test_serialized_shape() {
        let op = Operation::Text {
            target: addr("/p[1]/text()[1]"),
            text: Some("Hello!".into()),
            previous: None,
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "TEXT", "target": "/p[1]/text()[1]", "text": "Hello!"})
        );
        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
