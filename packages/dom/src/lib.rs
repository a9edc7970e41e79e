//! # Marrow DOM
//!
//! In-memory document tree shared by the live editing surface and the
//! detached model of the Marrow editor.
//!
//! ## Pieces
//!
//! - [`Document`]: arena of element and text nodes with a DOM-like
//!   mutation API and built-in change recording
//! - [`VNode`]: owned value copy of a subtree, used wherever a payload must
//!   outlive the tree it came from
//! - [`parse_fragment`] / [`Document::to_html`]: markup codec
//! - [`ChangeRecord`]: raw text/add/remove record of an observed mutation
//!
//! ```rust
//! use marrow_dom::Document;
//!
//! let mut doc = Document::from_fragment("div", "<p>Hello</p>")?;
//! let p = doc.children(doc.root())[0];
//! let text = doc.children(p)[0];
//!
//! doc.observe();
//! doc.set_text(text, "Hello!")?;
//! assert_eq!(doc.disconnect().len(), 1);
//! assert_eq!(doc.to_html(), "<div><p>Hello!</p></div>");
//! # Ok::<(), marrow_dom::DomError>(())
//! ```

mod document;
mod error;
mod lexer;
mod markup;
mod node;
mod record;
pub mod text;

pub use document::{Ancestors, Descendants, Document};
pub use error::{DomError, DomResult};
pub use markup::{fragment_to_html, parse_fragment};
pub use node::{
    is_block_tag, is_void_tag, NodeId, VNode, BLOCK_TAGS, EDITABLE_ATTR, ID_ATTR, SYNTHETIC_ATTR,
    VOID_TAGS,
};
pub use record::{ChangeKind, ChangeRecord};
