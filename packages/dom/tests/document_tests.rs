//! Tree mutations as the editor drives them
//!
//! This tests:
//! - Markup in, markup out after edits
//! - Record order and payloads across mixed mutations
//! - Value copies moving subtrees between documents

use anyhow::Result;
use marrow_dom::{ChangeKind, Document, VNode};

#[test]
fn test_edit_session_records_in_order() -> Result<()> {
    let mut doc = Document::from_fragment("div", "<p>one</p><p>two</p>")?;
    let root = doc.root();
    let first = doc.children(root)[0];
    let second = doc.children(root)[1];
    let text = doc.children(first)[0];

    doc.observe();
    doc.set_text(text, "uno")?;
    let fresh = doc.create_element("p");
    let fresh_text = doc.create_text("three");
    doc.append_child(fresh, fresh_text)?;
    doc.insert_before(root, fresh, Some(second))?;
    doc.detach(second);

    let records = doc.disconnect();
    let kinds: Vec<ChangeKind> = records.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Text, ChangeKind::Add, ChangeKind::Remove]);

    assert_eq!(records[0].old_text.as_deref(), Some("one"));
    assert_eq!(records[1].added, vec![fresh]);
    assert_eq!(records[1].next_sibling, Some(second));
    assert_eq!(records[2].removed, vec![second]);
    assert_eq!(records[2].next_sibling, None);

    assert_eq!(doc.inner_html(root), "<p>uno</p><p>three</p>");
    assert!(!doc.is_observing());
    Ok(())
}

#[test]
fn test_moving_a_node_records_remove_then_add() -> Result<()> {
    let mut doc = Document::from_fragment("div", "<p>a</p><p>b</p>")?;
    let root = doc.root();
    let first = doc.children(root)[0];

    doc.observe();
    doc.append_child(root, first)?;
    let kinds: Vec<ChangeKind> = doc.take_records().iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Remove, ChangeKind::Add]);
    assert_eq!(doc.inner_html(root), "<p>b</p><p>a</p>");
    Ok(())
}

#[test]
fn test_copying_between_documents() -> Result<()> {
    let source = Document::from_fragment("div", r#"<ul><li class="done">x</li><li>y</li></ul>"#)?;
    let list = source.children(source.root())[0];
    let copy: VNode = source.export(list);

    let mut target = Document::from_fragment("div", "<p>before</p>")?;
    let root = target.root();
    let imported = target.import(&copy);
    target.append_child(root, imported)?;

    assert_eq!(
        target.inner_html(root),
        r#"<p>before</p><ul><li class="done">x</li><li>y</li></ul>"#
    );
    assert!(target.is_block(imported));
    assert_eq!(target.text_content(imported), "xy");
    Ok(())
}

#[test]
fn test_text_offsets_span_inline_children() -> Result<()> {
    let doc = Document::from_fragment("div", "<p>ab<em>cd</em>ef</p>")?;
    let p = doc.children(doc.root())[0];
    let em = doc.children(p)[1];
    let inner = doc.children(em)[0];
    let tail = doc.children(p)[2];

    assert_eq!(doc.text_offset(p, inner, 1), Some(3));
    assert_eq!(doc.text_offset(p, tail, 0), Some(4));
    assert_eq!(doc.closest_block(inner), Some(p));
    Ok(())
}

#[test]
fn test_malformed_markup_is_rejected() {
    assert!(Document::from_fragment("div", "<p><b>x</p>").is_err());
    assert!(Document::from_fragment("div", "<p>x").is_err());
}
