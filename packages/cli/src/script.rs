//! Replay script format
//!
//! A script is a JSON list of steps, either bare or under a `steps` key:
//!
//! ```json
//! [
//!   { "step": "select", "address": "/p[1]/text()[1]", "offset": 5 },
//!   { "step": "type", "text": "!" },
//!   { "step": "sync" },
//!   { "step": "key", "key": "enter" }
//! ]
//! ```

use anyhow::{Context, Result};
use marrow_editor::{Address, CaretToken, Key, Operation, Trigger};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A live-tree position given by address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub address: Address,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum Step {
    /// Place the caret, or a range when `focus` is given
    Select {
        address: Address,
        #[serde(default)]
        offset: usize,
        #[serde(default)]
        focus: Option<Point>,
    },
    /// Type at the caret without syncing
    Type { text: String },
    Key { key: Key },
    Sync,
    Undo,
    Redo,
    Token { token: CaretToken },
    Ignore {
        address: Address,
        #[serde(default = "any_trigger")]
        trigger: Trigger,
        #[serde(default)]
        descendants: bool,
    },
    Enqueue { operations: Vec<Operation> },
}

fn any_trigger() -> Trigger {
    Trigger::Any
}

impl Step {
    /// Whether the step can change the model
    pub fn mutates(&self) -> bool {
        !matches!(
            self,
            Step::Select { .. } | Step::Type { .. } | Step::Token { .. } | Step::Ignore { .. }
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Select {
                address,
                offset,
                focus: None,
            } => write!(f, "select {address}:{offset}"),
            Step::Select {
                address,
                offset,
                focus: Some(focus),
            } => write!(f, "select {address}:{offset}..{}:{}", focus.address, focus.offset),
            Step::Type { text } => write!(f, "type {text:?}"),
            Step::Key { key } => write!(f, "key {key:?}"),
            Step::Sync => write!(f, "sync"),
            Step::Undo => write!(f, "undo"),
            Step::Redo => write!(f, "redo"),
            Step::Token { token } => write!(f, "token {token:?}"),
            Step::Ignore {
                address, trigger, ..
            } => write!(f, "ignore {address} ({trigger:?})"),
            Step::Enqueue { operations } => write!(f, "enqueue {} operations", operations.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub steps: Vec<Step>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptFile {
    Bare(Vec<Step>),
    Wrapped { steps: Vec<Step> },
}

impl Script {
    pub fn parse(source: &str) -> Result<Self> {
        let file: ScriptFile = serde_json::from_str(source).context("Invalid replay script")?;
        let steps = match file {
            ScriptFile::Bare(steps) | ScriptFile::Wrapped { steps } => steps,
        };
        Ok(Self { steps })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read script {}", path.display()))?;
        Self::parse(&source)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
