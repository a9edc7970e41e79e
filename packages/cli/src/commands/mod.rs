pub mod addresses;
pub mod replay;

pub use addresses::{addresses, AddressesArgs};
pub use replay::{replay, ReplayArgs};

use anyhow::{Context, Result};
use marrow_editor::EditorConfig;
use std::path::Path;

/// Explicit config file, or `marrow.config.json` next to the document
fn load_config(document: &Path, explicit: Option<&Path>) -> Result<EditorConfig> {
    let config = match explicit {
        Some(path) => EditorConfig::from_path(path)
            .with_context(|| format!("Cannot load config {}", path.display()))?,
        None => EditorConfig::load(document.parent().unwrap_or_else(|| Path::new(".")))?,
    };
    Ok(config)
}

fn read_document(document: &Path) -> Result<String> {
    std::fs::read_to_string(document)
        .with_context(|| format!("Cannot read document {}", document.display()))
}
