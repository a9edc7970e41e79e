//! Markup parsing and serialization
//!
//! Covers the subset of HTML the editor renders: elements with quoted or
//! bare attributes, void elements, and text with the basic entities.
//! Whitespace is preserved verbatim.

use crate::lexer::{ContentToken, TagToken};
use crate::node::is_void_tag;
use crate::{Document, DomError, DomResult, NodeId, VNode};
use logos::{Lexer, Logos};
use std::collections::BTreeMap;

struct OpenElement {
    tag: String,
    attributes: BTreeMap<String, String>,
    children: Vec<VNode>,
    start: usize,
}

impl OpenElement {
    fn close(self) -> VNode {
        VNode::Element {
            tag: self.tag,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

/// Parse markup into a list of top-level nodes
pub fn parse_fragment(markup: &str) -> DomResult<Vec<VNode>> {
    let mut roots: Vec<VNode> = Vec::new();
    let mut open: Vec<OpenElement> = Vec::new();
    let mut lex = ContentToken::lexer(markup);

    while let Some(token) = lex.next() {
        let start = lex.span().start;
        let token = token.map_err(|_| DomError::markup(start, "Unexpected character"))?;

        match token {
            ContentToken::Text(raw) => {
                push_node(&mut roots, &mut open, VNode::text(decode_entities(raw)));
            }

            ContentToken::TagOpen(tag) => {
                let mut tag_lex = lex.morph::<TagToken>();
                let (attributes, self_closing) = parse_attributes(&mut tag_lex)?;
                lex = tag_lex.morph::<ContentToken>();

                let tag = tag.to_ascii_lowercase();
                if self_closing || is_void_tag(&tag) {
                    let node = VNode::Element {
                        tag,
                        attributes,
                        children: Vec::new(),
                    };
                    push_node(&mut roots, &mut open, node);
                } else {
                    open.push(OpenElement {
                        tag,
                        attributes,
                        children: Vec::new(),
                        start,
                    });
                }
            }

            ContentToken::TagClose(name) => {
                let name = name.to_ascii_lowercase();
                if is_void_tag(&name) {
                    continue;
                }
                let element = open
                    .pop()
                    .ok_or_else(|| DomError::markup(start, format!("Unmatched </{}>", name)))?;
                if element.tag != name {
                    return Err(DomError::markup(
                        start,
                        format!("Expected </{}>, found </{}>", element.tag, name),
                    ));
                }
                push_node(&mut roots, &mut open, element.close());
            }
        }
    }

    if let Some(element) = open.pop() {
        return Err(DomError::markup(
            element.start,
            format!("Unclosed <{}>", element.tag),
        ));
    }

    Ok(roots)
}

fn push_node(roots: &mut Vec<VNode>, open: &mut [OpenElement], node: VNode) {
    match open.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn parse_attributes<'src>(
    lex: &mut Lexer<'src, TagToken<'src>>,
) -> DomResult<(BTreeMap<String, String>, bool)> {
    let mut attributes = BTreeMap::new();
    let mut pending_name: Option<String> = None;
    let mut expecting_value = false;

    while let Some(token) = lex.next() {
        let pos = lex.span().start;
        let token = token.map_err(|_| DomError::markup(pos, "Unexpected character in tag"))?;

        match token {
            TagToken::Name(name) if expecting_value => {
                // bare value: a=b
                if let Some(key) = pending_name.take() {
                    attributes.insert(key, name.to_string());
                }
                expecting_value = false;
            }
            TagToken::Name(name) => {
                if let Some(key) = pending_name.replace(name.to_ascii_lowercase()) {
                    attributes.insert(key, String::new());
                }
            }
            TagToken::Equals => {
                if pending_name.is_none() {
                    return Err(DomError::markup(pos, "Attribute value without a name"));
                }
                expecting_value = true;
            }
            TagToken::Quoted(value) => {
                let key = pending_name
                    .take()
                    .filter(|_| expecting_value)
                    .ok_or_else(|| DomError::markup(pos, "Quoted value without a name"))?;
                attributes.insert(key, decode_entities(value));
                expecting_value = false;
            }
            TagToken::End | TagToken::SelfClose => {
                if expecting_value {
                    return Err(DomError::markup(pos, "Missing attribute value"));
                }
                if let Some(key) = pending_name.take() {
                    attributes.insert(key, String::new());
                }
                return Ok((attributes, matches!(token, TagToken::SelfClose)));
            }
        }
    }

    Err(DomError::markup(lex.span().end, "Unterminated tag"))
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn write_start_tag(tag: &str, attributes: &BTreeMap<String, String>, out: &mut String) {
    out.push('<');
    out.push_str(tag);
    for (name, value) in attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attribute(value, out);
        out.push('"');
    }
    out.push('>');
}

fn write_vnode(node: &VNode, out: &mut String) {
    match node {
        VNode::Text { content } => escape_text(content, out),
        VNode::Element {
            tag,
            attributes,
            children,
        } => {
            write_start_tag(tag, attributes, out);
            if is_void_tag(tag) {
                return;
            }
            for child in children {
                write_vnode(child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

impl VNode {
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_vnode(self, &mut out);
        out
    }
}

/// Serialize a list of nodes back to markup
pub fn fragment_to_html(nodes: &[VNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_vnode(node, &mut out);
    }
    out
}

impl Document {
    /// Parse markup with exactly one top-level element, which becomes the root
    pub fn parse(markup: &str) -> DomResult<Self> {
        let mut nodes = parse_fragment(markup)?;
        nodes.retain(|node| !matches!(node, VNode::Text { content } if content.trim().is_empty()));
        match nodes.as_slice() {
            [root] => Document::from_vnode(root),
            _ => Err(DomError::markup(
                0,
                format!("Expected one root element, found {}", nodes.len()),
            )),
        }
    }

    /// Create a document with a `root_tag` root whose children are parsed
    /// from `markup`
    pub fn from_fragment(root_tag: &str, markup: &str) -> DomResult<Self> {
        let mut doc = Document::new(root_tag);
        let root = doc.root();
        for node in parse_fragment(markup)? {
            let id = doc.import(&node);
            doc.append_child(root, id)?;
        }
        Ok(doc)
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        self.export(id).to_html()
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            write_vnode(&self.export(child), &mut out);
        }
        out
    }

    /// Markup of the whole document, root included
    pub fn to_html(&self) -> String {
        self.outer_html(self.root())
    }
}
