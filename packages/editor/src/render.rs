//! Rendering the model into a fresh live tree
//!
//! The engine calls its [`Renderer`] after every batch and after undo/redo.
//! A renderer that decorates the live tree registers its decorations
//! through the [`RenderContext`] so their changes never reach the model.

use crate::builder::{RemovalContext, RemovalListeners};
use crate::observer::{IgnoreRegistry, Trigger};
use crate::operation::Operation;
use marrow_dom::{Document, NodeId};

/// Registries scoped to the live tree being produced
pub struct RenderContext<'a> {
    pub ignores: &'a mut IgnoreRegistry,
    pub listeners: &'a mut RemovalListeners,
}

impl RenderContext<'_> {
    pub fn ignore(
        &mut self,
        live: &Document,
        nodes: &[NodeId],
        trigger: Trigger,
        include_descendants: bool,
    ) {
        self.ignores.ignore(live, nodes, trigger, include_descendants);
    }

    pub fn on_removal(
        &mut self,
        node: NodeId,
        listener: impl Fn(&RemovalContext<'_>) -> Vec<Operation> + 'static,
    ) {
        self.listeners.on_removal(node, listener);
    }
}

pub trait Renderer {
    /// Produce a new live tree for `model`
    fn render(&mut self, model: &Document, context: &mut RenderContext<'_>) -> Document;
}

/// Live tree identical to the model
#[derive(Debug, Clone, Copy, Default)]
pub struct MirrorRenderer;

impl Renderer for MirrorRenderer {
    fn render(&mut self, model: &Document, _context: &mut RenderContext<'_>) -> Document {
        model.snapshot()
    }
}

impl<F> Renderer for F
where
    F: FnMut(&Document, &mut RenderContext<'_>) -> Document,
{
    fn render(&mut self, model: &Document, context: &mut RenderContext<'_>) -> Document {
        self(model, context)
    }
}
