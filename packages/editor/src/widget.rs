//! # Widget Contract
//!
//! Editable units (tables, code blocks, embeds, ...) may take over the
//! editing keys while they are active. The engine consults the top of the
//! activation stack first and only falls back to its generic line logic
//! when the widget reports the key as unhandled.
//!
//! ## Hooks
//!
//! - `enter`: before the generic block split
//! - `backspace_override` / `delete_override`: before any generic deletion
//! - `backspace_joining` / `delete_joining`: only when the generic logic is
//!   about to join two blocks

use crate::editor::Editor;
use marrow_dom::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Editing keys with engine-level behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    Enter,
    Backspace,
    Delete,
}

/// Capabilities a widget exposes while active. Every hook defaults to
/// "not handled".
pub trait EditableWidget {
    fn name(&self) -> &str {
        "widget"
    }

    /// Live node the widget owns, for copy/paste scoping
    fn root(&self) -> Option<NodeId> {
        None
    }

    fn enter(&mut self, _editor: &mut Editor) -> bool {
        false
    }

    fn backspace_override(&mut self, _editor: &mut Editor) -> bool {
        false
    }

    fn delete_override(&mut self, _editor: &mut Editor) -> bool {
        false
    }

    fn backspace_joining(&mut self, _editor: &mut Editor) -> bool {
        false
    }

    fn delete_joining(&mut self, _editor: &mut Editor) -> bool {
        false
    }
}

/// Stable handle of an activated widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetHandle(u64);

/// Activation stack, top last
#[derive(Default)]
pub struct WidgetStack {
    entries: Vec<(WidgetHandle, Box<dyn EditableWidget>)>,
    next_handle: u64,
    /// Handles currently lent out by `take_top`
    lent: Vec<WidgetHandle>,
    /// Lent handles deactivated while lent
    retired: HashSet<WidgetHandle>,
}

impl WidgetStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self, widget: Box<dyn EditableWidget>) -> WidgetHandle {
        let handle = WidgetHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push((handle, widget));
        handle
    }

    /// Returns whether the handle was active
    pub fn deactivate(&mut self, handle: WidgetHandle) -> bool {
        if let Some(index) = self.entries.iter().position(|(h, _)| *h == handle) {
            self.entries.remove(index);
            return true;
        }
        if self.lent.contains(&handle) {
            return self.retired.insert(handle);
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.lent.len() - self.retired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn top(&self) -> Option<&dyn EditableWidget> {
        self.entries.last().map(|(_, widget)| widget.as_ref())
    }

    pub fn top_handle(&self) -> Option<WidgetHandle> {
        self.entries.last().map(|(handle, _)| *handle)
    }

    /// Remove the top widget so it can be called with the editor borrowed
    pub(crate) fn take_top(&mut self) -> Option<(WidgetHandle, Box<dyn EditableWidget>)> {
        let (handle, widget) = self.entries.pop()?;
        self.lent.push(handle);
        Some((handle, widget))
    }

    /// Put a widget taken with `take_top` back, unless it was deactivated
    /// in the meantime
    pub(crate) fn restore(&mut self, handle: WidgetHandle, widget: Box<dyn EditableWidget>) {
        self.lent.retain(|h| *h != handle);
        if self.retired.remove(&handle) {
            return;
        }
        // keep it below widgets activated while it was lent
        let index = self
            .entries
            .iter()
            .position(|(h, _)| *h > handle)
            .unwrap_or(self.entries.len());
        self.entries.insert(index, (handle, widget));
    }
}

impl fmt::Debug for WidgetStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(handle, widget)| (handle, widget.name())))
            .finish()
    }
}
