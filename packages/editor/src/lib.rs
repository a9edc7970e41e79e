//! # Marrow Editor
//!
//! Editing engine that keeps a detached model tree in step with the live
//! tree a user types into.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ live tree: user edits, widget decorations   │
//! └─────────────────────────────────────────────┘
//!                     ↓ change records
//! ┌─────────────────────────────────────────────┐
//! │ editor: rollback → operations → model       │
//! │  - Address nodes by structural path         │
//! │  - Skip ignored and synthetic changes       │
//! │  - Snapshot history for undo/redo           │
//! └─────────────────────────────────────────────┘
//!                     ↓ render
//! ┌─────────────────────────────────────────────┐
//! │ live tree rebuilt, selection restored       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Model is source of truth**: the live tree is rebuilt from it after
//!    every batch
//! 2. **Operations are addressed by path**: no node identity crosses from
//!    the live tree into the model
//! 3. **Batches are atomic**: a failing operation leaves the model at the
//!    snapshot taken before the batch
//!
//! ## Usage
//!
//! ```rust
//! use marrow_editor::{Editor, EditorConfig, Selection};
//!
//! let mut editor = Editor::from_markup("<p>Hello</p>", EditorConfig::default())?;
//! let p = editor.live().children(editor.live().root())[0];
//! let text = editor.live().children(p)[0];
//!
//! editor.set_selection(Some(Selection::caret(text, 5)));
//! editor.insert_text("!");
//! editor.sync();
//!
//! assert_eq!(editor.model_html(), "<p>Hello!</p>");
//! assert!(editor.undo());
//! assert_eq!(editor.model_html(), "<p>Hello</p>");
//! # Ok::<(), marrow_editor::EditorError>(())
//! ```

pub mod address;
mod builder;
mod config;
mod editing;
mod editor;
mod errors;
mod history;
pub mod observer;
mod operation;
mod render;
mod schedule;
pub mod selection;
mod widget;

pub use address::{Address, AddressOptions, AddressParseError, Segment};
pub use builder::{
    export_authored, BuiltOperations, OperationBuilder, RemovalContext, RemovalListener,
    RemovalListeners, TextTransform,
};
pub use config::{EditorConfig, DEFAULT_CONFIG_NAME};
pub use editor::Editor;
pub use errors::{EditorError, OperationError};
pub use history::{History, DEFAULT_HISTORY_DEPTH};
pub use observer::{ChangeObserver, ChangeSource, IgnoreRegistry, Trigger};
pub use operation::{apply_stack, Operation, OperationKind};
pub use render::{MirrorRenderer, RenderContext, Renderer};
pub use schedule::Debouncer;
pub use selection::{CaretToken, Position, Selection, SelectionStatus};
pub use widget::{EditableWidget, Key, WidgetHandle, WidgetStack};

// Re-export the tree types for convenience
pub use marrow_dom::{Document, NodeId, VNode};
