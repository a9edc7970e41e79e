use super::{load_config, read_document};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use marrow_dom::{Document, NodeId};
use marrow_editor::address::{encode, encode_approximate};
use marrow_editor::{Address, AddressOptions};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct AddressesArgs {
    /// Markup document to load
    pub document: PathBuf,

    /// Config file (defaults to marrow.config.json next to the document)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressEntry {
    pub address: Option<Address>,
    pub approximate: Option<Address>,
    pub node: String,
}

pub fn addresses(args: AddressesArgs) -> Result<()> {
    let config = load_config(&args.document, args.config.as_deref())?;
    let markup = read_document(&args.document)?;
    let doc = Document::from_fragment(&config.root_tag, &markup)?;
    let entries = list_addresses(&doc, config.address_options());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        let exact = entry
            .address
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        let approximate = entry
            .approximate
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        println!(
            "{:<32} {:<24} {}",
            exact.bright_white(),
            approximate.dimmed(),
            entry.node
        );
    }
    Ok(())
}

/// Every node below the root in document order
pub fn list_addresses(doc: &Document, options: AddressOptions) -> Vec<AddressEntry> {
    doc.descendants(doc.root())
        .map(|node| AddressEntry {
            address: encode(doc, node, options),
            approximate: encode_approximate(doc, node),
            node: describe(doc, node),
        })
        .collect()
}

fn describe(doc: &Document, node: NodeId) -> String {
    match doc.tag(node) {
        Some(tag) if doc.is_synthetic(node) => format!("<{tag}> (synthetic)"),
        Some(tag) => format!("<{tag}>"),
        None => {
            let text = doc.text(node).unwrap_or_default();
            let preview: String = text.chars().take(24).collect();
            if preview.len() < text.len() {
                format!("{preview:?}…")
            } else {
                format!("{preview:?}")
            }
        }
    }
}
