//! Error types for the document tree

use thiserror::Error;

pub type DomResult<T> = Result<T, DomError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error("Markup error at {pos}: {message}")]
    Markup { pos: usize, message: String },

    #[error("Node is not an element")]
    NotAnElement,

    #[error("Node is not text")]
    NotText,

    #[error("Reference node is not a child of the parent")]
    NotAChild,

    #[error("Insertion would create a cycle")]
    CycleDetected,

    #[error("The document root cannot be moved")]
    RootImmovable,
}

impl DomError {
    pub fn markup(pos: usize, message: impl Into<String>) -> Self {
        Self::Markup {
            pos,
            message: message.into(),
        }
    }
}
