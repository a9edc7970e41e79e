//! Error types for the editor

use crate::address::Address;
use marrow_dom::DomError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Markup error: {0}")]
    Markup(#[from] DomError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),
}

/// Failure while replaying an operation against the model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("Target not found: {0}")]
    TargetNotFound(Address),

    #[error("Parent not found: {0}")]
    ParentNotFound(Address),

    #[error("Node at {0} is not text")]
    NotText(Address),

    #[error("Node at {0} is not an element")]
    NotAnElement(Address),

    #[error(transparent)]
    Dom(#[from] DomError),
}
