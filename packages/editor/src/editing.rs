//! Generic key handling and text input
//!
//! What happens when no active widget claims a key. All edits go straight
//! into the live tree and reach the model through the regular sync path,
//! exactly like edits made by the user agent itself.

use crate::editor::Editor;
use crate::selection::{CaretToken, Position, Selection};
use crate::widget::Key;
use marrow_dom::text::{byte_index, char_len};
use marrow_dom::{Document, NodeId};
use tracing::debug;

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

impl Editor {
    /// Handle an editing key. Returns whether anything handled it.
    pub fn handle_key(&mut self, key: Key) -> bool {
        if self.is_locked() {
            return false;
        }

        let claimed = match key {
            Key::Enter => self.with_top_widget(|widget, editor| widget.enter(editor)),
            Key::Backspace => {
                self.with_top_widget(|widget, editor| widget.backspace_override(editor))
            }
            Key::Delete => self.with_top_widget(|widget, editor| widget.delete_override(editor)),
        };
        if claimed {
            return true;
        }

        match key {
            Key::Enter => self.split_block(),
            Key::Backspace => self.delete_backward(),
            Key::Delete => self.delete_forward(),
        }
    }

    /// Type `text` at the caret, replacing a selection inside one text node.
    /// Not synced.
    pub fn insert_text(&mut self, text: &str) -> bool {
        if self.is_locked() || text.is_empty() {
            return false;
        }
        let Some(caret) = self.collapse_selection() else {
            return false;
        };

        let live = self.live_mut();
        let position = if live.is_text(caret.node) {
            if !splice(live, caret.node, caret.offset, caret.offset, text) {
                return false;
            }
            Position::new(caret.node, caret.offset + char_len(text))
        } else {
            let reference = live.children(caret.node).get(caret.offset).copied();
            let node = live.create_text(text);
            if live.insert_before(caret.node, node, reference).is_err() {
                return false;
            }
            Position::new(node, char_len(text))
        };
        self.set_selection(Some(Selection::caret(position.node, position.offset)));
        true
    }

    /// Delete a selection confined to one text node; otherwise collapse to
    /// the anchor. Returns the resulting caret.
    fn collapse_selection(&mut self) -> Option<Position> {
        let selection = self.selection()?;
        if selection.is_collapsed() {
            return Some(selection.anchor);
        }
        let (anchor, focus) = (selection.anchor, selection.focus);
        if anchor.node == focus.node && self.live().is_text(anchor.node) {
            let start = anchor.offset.min(focus.offset);
            let end = anchor.offset.max(focus.offset);
            splice(self.live_mut(), anchor.node, start, end, "");
            self.set_selection(Some(Selection::caret(anchor.node, start)));
            return Some(Position::new(anchor.node, start));
        }
        debug!("Collapsing a selection that spans several nodes");
        self.set_selection(Some(Selection::caret(anchor.node, anchor.offset)));
        Some(anchor)
    }

    fn delete_selected_range(&mut self) -> bool {
        match self.selection() {
            Some(selection) if !selection.is_collapsed() => {
                self.collapse_selection();
                self.sync();
                true
            }
            _ => false,
        }
    }

    // ---- Enter -----------------------------------------------------------

    /// Split the caret's block in two at the caret
    fn split_block(&mut self) -> bool {
        let Some(caret) = self.collapse_selection() else {
            return false;
        };
        let live = self.live_mut();
        let Some(block) = live.closest_block(caret.node) else {
            return false;
        };
        let Some(parent) = live.parent(block) else {
            return false;
        };
        let tag = match live.tag(block) {
            Some(tag) if HEADINGS.contains(&tag) => "p".to_string(),
            Some(tag) => tag.to_string(),
            None => return false,
        };
        let fresh = live.create_element(tag);

        // pieces that belong right after `current` inside its parent
        let (mut carry, mut current) = if live.is_text(caret.node) {
            let text = live.text(caret.node).unwrap_or_default().to_string();
            let split = byte_index(&text, caret.offset);
            let (head, tail) = text.split_at(split);
            let mut carry = Vec::new();
            if !tail.is_empty() {
                carry.push(live.create_text(tail));
            }
            if live.set_text(caret.node, head).is_err() {
                return false;
            }
            (carry, caret.node)
        } else {
            let moved: Vec<NodeId> = live.children(caret.node).iter().skip(caret.offset).copied().collect();
            for &node in &moved {
                live.detach(node);
            }
            if caret.node == block {
                (moved, block)
            } else {
                let wrapper = shallow_clone(live, caret.node);
                append_all(live, wrapper, &moved);
                (vec![wrapper], caret.node)
            }
        };

        while current != block {
            let Some(up) = live.parent(current) else {
                break;
            };
            let following: Vec<NodeId> = following_siblings(live, current);
            for &node in &following {
                live.detach(node);
            }
            carry.extend(following);
            if up == block {
                break;
            }
            let wrapper = shallow_clone(live, up);
            append_all(live, wrapper, &carry);
            carry = vec![wrapper];
            current = up;
        }

        append_all(live, fresh, &carry);
        let next = live.next_sibling(block);
        if live.insert_before(parent, fresh, next).is_err() {
            return false;
        }

        let (node, offset) = if live.is_text(caret.node) {
            (caret.node, live.text_len(caret.node))
        } else {
            (caret.node, caret.offset)
        };
        self.set_selection(Some(Selection::caret(node, offset)));
        self.set_caret_token(CaretToken::NextLine);
        self.sync();
        true
    }

    // ---- Backspace / Delete ----------------------------------------------

    fn delete_backward(&mut self) -> bool {
        if self.delete_selected_range() {
            return true;
        }
        let Some(caret) = self.collapse_selection() else {
            return false;
        };
        let live = self.live();

        if live.is_text(caret.node) && caret.offset > 0 {
            splice(self.live_mut(), caret.node, caret.offset - 1, caret.offset, "");
            self.set_selection(Some(Selection::caret(caret.node, caret.offset - 1)));
            self.sync();
            return true;
        }

        let Some(block) = live.closest_block(caret.node) else {
            return false;
        };
        if let Some(previous) = text_before_within(live, caret.node, block) {
            let len = live.text_len(previous);
            if len > 0 {
                splice(self.live_mut(), previous, len - 1, len, "");
                self.set_selection(Some(Selection::caret(previous, len - 1)));
                self.sync();
                return true;
            }
        }

        // at the start of the block: join it into the previous one
        if self.with_top_widget(|widget, editor| widget.backspace_joining(editor)) {
            return true;
        }
        let live = self.live();
        let Some(target) = block_sibling(live, block, Direction::Backward).map(|b| innermost_last(live, b))
        else {
            return false;
        };
        let caret = end_of(live, target);
        join_into(self.live_mut(), target, block);
        self.set_selection(Some(Selection::caret(caret.node, caret.offset)));
        self.sync();
        true
    }

    fn delete_forward(&mut self) -> bool {
        if self.delete_selected_range() {
            return true;
        }
        let Some(caret) = self.collapse_selection() else {
            return false;
        };
        let live = self.live();

        if live.is_text(caret.node) && caret.offset < live.text_len(caret.node) {
            splice(self.live_mut(), caret.node, caret.offset, caret.offset + 1, "");
            self.sync();
            return true;
        }

        let Some(block) = live.closest_block(caret.node) else {
            return false;
        };
        if let Some(next) = text_after_within(live, caret.node, block) {
            if live.text_len(next) > 0 {
                splice(self.live_mut(), next, 0, 1, "");
                self.sync();
                return true;
            }
        }

        // at the end of the block: pull the next one in
        if self.with_top_widget(|widget, editor| widget.delete_joining(editor)) {
            return true;
        }
        let live = self.live();
        let Some(source) = block_sibling(live, block, Direction::Forward).map(|b| innermost_first(live, b))
        else {
            return false;
        };
        join_into(self.live_mut(), block, source);
        self.sync();
        true
    }
}

/// Replace chars `start..end` of a text node with `insert`
fn splice(live: &mut Document, node: NodeId, start: usize, end: usize, insert: &str) -> bool {
    let Some(text) = live.text(node) else {
        return false;
    };
    let mut value = text.to_string();
    let (start, end) = (byte_index(&value, start), byte_index(&value, end));
    value.replace_range(start..end, insert);
    live.set_text(node, value).is_ok()
}

fn shallow_clone(live: &mut Document, node: NodeId) -> NodeId {
    let tag = live.tag(node).unwrap_or("span").to_string();
    let attributes = live.attributes(node).cloned().unwrap_or_default();
    let clone = live.create_element(tag);
    for (name, value) in attributes {
        // a stable id must stay unique
        if name != marrow_dom::ID_ATTR {
            let _ = live.set_attribute(clone, name, value);
        }
    }
    clone
}

fn append_all(live: &mut Document, parent: NodeId, nodes: &[NodeId]) {
    for &node in nodes {
        let _ = live.append_child(parent, node);
    }
}

fn following_siblings(live: &Document, node: NodeId) -> Vec<NodeId> {
    let Some(parent) = live.parent(node) else {
        return Vec::new();
    };
    let index = live.index_in_parent(node).unwrap_or(0);
    live.children(parent)[index + 1..].to_vec()
}

fn text_before_within(live: &Document, node: NodeId, scope: NodeId) -> Option<NodeId> {
    let mut current = live.previous_in_order(node);
    while let Some(candidate) = current {
        if !live.contains(scope, candidate) || candidate == scope {
            return None;
        }
        if live.is_text(candidate) {
            return Some(candidate);
        }
        current = live.previous_in_order(candidate);
    }
    None
}

fn text_after_within(live: &Document, node: NodeId, scope: NodeId) -> Option<NodeId> {
    let mut current = live.next_in_order(node);
    while let Some(candidate) = current {
        if !live.contains(scope, candidate) {
            return None;
        }
        if live.is_text(candidate) {
            return Some(candidate);
        }
        current = live.next_in_order(candidate);
    }
    None
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Nearest authored block sibling of `block`
fn block_sibling(live: &Document, block: NodeId, direction: Direction) -> Option<NodeId> {
    let step = |node| match direction {
        Direction::Forward => live.next_sibling(node),
        Direction::Backward => live.previous_sibling(node),
    };
    let mut current = step(block);
    while let Some(node) = current {
        if live.is_block(node) && !live.is_synthetic(node) && live.is_editable(node) {
            return Some(node);
        }
        current = step(node);
    }
    None
}

/// Last block nested at the end of `block` (the last item of a list)
fn innermost_last(live: &Document, block: NodeId) -> NodeId {
    let mut current = block;
    while let Some(last) = live.last_child(current).filter(|&c| live.is_block(c)) {
        current = last;
    }
    current
}

fn innermost_first(live: &Document, block: NodeId) -> NodeId {
    let mut current = block;
    while let Some(first) = live.first_child(current).filter(|&c| live.is_block(c)) {
        current = first;
    }
    current
}

fn end_of(live: &Document, block: NodeId) -> Position {
    let mut node = block;
    while let Some(last) = live.last_child(node) {
        node = last;
    }
    if live.is_text(node) {
        Position::new(node, live.text_len(node))
    } else {
        Position::new(block, live.children(block).len())
    }
}

/// Move the children of `source` to the end of `target` and drop `source`
fn join_into(live: &mut Document, target: NodeId, source: NodeId) {
    for child in live.children(source).to_vec() {
        let _ = live.append_child(target, child);
    }
    live.detach(source);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::decode;
    use crate::config::EditorConfig;
    use crate::widget::EditableWidget;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn editor(markup: &str) -> Editor {
        Editor::from_markup(markup, EditorConfig::default()).unwrap()
    }

    fn place(editor: &mut Editor, path: &str, offset: usize) {
        let node = decode(editor.live(), &path.parse().unwrap(), editor.address_options()).unwrap();
        editor.set_selection(Some(Selection::caret(node, offset)));
    }

    fn caret_text(editor: &Editor) -> (String, usize) {
        let selection = editor.selection().unwrap();
        let text = editor.live().text(selection.anchor.node).unwrap_or_default().to_string();
        (text, selection.anchor.offset)
    }

    #[test]
    fn test_insert_text_at_caret() {
        let mut editor = editor("<p>Hllo</p>");
        place(&mut editor, "/p[1]/text()[1]", 1);
        assert!(editor.insert_text("e"));
        assert_eq!(editor.live_html(), "<p>Hello</p>");
        assert_eq!(editor.model_html(), "<p>Hllo</p>");
        assert_eq!(caret_text(&editor), ("Hello".to_string(), 2));

        assert!(editor.sync());
        assert_eq!(editor.model_html(), "<p>Hello</p>");
        assert_eq!(caret_text(&editor), ("Hello".to_string(), 2));
    }

    #[test]
    fn test_insert_replaces_selection() {
        let mut editor = editor("<p>Hello world</p>");
        let text = decode(editor.live(), &"/p[1]/text()[1]".parse().unwrap(), editor.address_options()).unwrap();
        editor.set_selection(Some(Selection::range(Position::new(text, 11), Position::new(text, 6))));
        editor.insert_text("there");
        editor.sync();
        assert_eq!(editor.model_html(), "<p>Hello there</p>");
    }

    #[test]
    fn test_insert_into_empty_block() {
        let mut editor = editor("<p></p>");
        let p = editor.live().children(editor.live().root())[0];
        editor.set_selection(Some(Selection::caret(p, 0)));
        editor.insert_text("x");
        editor.sync();
        assert_eq!(editor.model_html(), "<p>x</p>");
    }

    #[test]
    fn test_enter_moves_inline_tail() {
        let mut editor = editor("<h2>ab<em>cd</em>ef</h2><p>z</p>");
        place(&mut editor, "/h2[1]/em[1]/text()[1]", 1);
        assert!(editor.handle_key(Key::Enter));
        assert_eq!(
            editor.model_html(),
            "<h2>ab<em>c</em></h2><p><em>d</em>ef</p><p>z</p>"
        );
        assert_eq!(caret_text(&editor), ("d".to_string(), 0));
    }

    #[test]
    fn test_enter_at_end_creates_empty_block() {
        let mut editor = editor("<p>ab</p>");
        place(&mut editor, "/p[1]/text()[1]", 2);
        editor.handle_key(Key::Enter);
        assert_eq!(editor.model_html(), "<p>ab</p><p></p>");
        let selection = editor.selection().unwrap();
        assert_eq!(editor.live().tag(selection.anchor.node), Some("p"));
        assert_eq!(editor.live().index_in_parent(selection.anchor.node), Some(1));
    }

    #[test]
    fn test_backspace_deletes_char_then_joins() {
        let mut editor = editor("<p>ab</p><p>cd</p>");
        place(&mut editor, "/p[2]/text()[1]", 1);
        editor.handle_key(Key::Backspace);
        assert_eq!(editor.model_html(), "<p>ab</p><p>d</p>");

        editor.handle_key(Key::Backspace);
        assert_eq!(editor.model_html(), "<p>abd</p>");
        assert_eq!(caret_text(&editor), ("abd".to_string(), 2));
        assert_eq!(editor.history().undo_levels(), 2);
    }

    #[test]
    fn test_backspace_crosses_inline_boundary() {
        let mut editor = editor("<p><b>ab</b>cd</p>");
        place(&mut editor, "/p[1]/text()[1]", 0);
        editor.handle_key(Key::Backspace);
        assert_eq!(editor.model_html(), "<p><b>a</b>cd</p>");
    }

    #[test]
    fn test_backspace_at_document_start_does_nothing() {
        let mut editor = editor("<p>ab</p>");
        place(&mut editor, "/p[1]/text()[1]", 0);
        assert!(!editor.handle_key(Key::Backspace));
        assert_eq!(editor.history().undo_levels(), 0);
    }

    #[test]
    fn test_delete_char_then_join_list_item() {
        let mut editor = editor("<p>ab</p><ul><li>cd</li><li>e</li></ul>");
        place(&mut editor, "/p[1]/text()[1]", 1);
        editor.handle_key(Key::Delete);
        assert_eq!(editor.model_html(), "<p>a</p><ul><li>cd</li><li>e</li></ul>");

        editor.handle_key(Key::Delete);
        assert_eq!(editor.model_html(), "<p>acd</p><ul><li>e</li></ul>");
    }

    struct Recorder {
        calls: Rc<RefCell<Vec<&'static str>>>,
        claim_enter: bool,
    }

    impl EditableWidget for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn enter(&mut self, editor: &mut Editor) -> bool {
            self.calls.borrow_mut().push("enter");
            if self.claim_enter {
                editor.set_caret_token(CaretToken::Zero);
            }
            self.claim_enter
        }

        fn backspace_joining(&mut self, _editor: &mut Editor) -> bool {
            self.calls.borrow_mut().push("backspace_joining");
            true
        }
    }

    #[test]
    fn test_widget_hooks_take_precedence() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut editor = editor("<p>ab</p><p>cd</p>");
        let handle = editor.activate_widget(Box::new(Recorder {
            calls: Rc::clone(&calls),
            claim_enter: true,
        }));

        place(&mut editor, "/p[1]/text()[1]", 1);
        assert!(editor.handle_key(Key::Enter));
        assert_eq!(editor.model_html(), "<p>ab</p><p>cd</p>");
        assert_eq!(editor.caret_token(), Some(CaretToken::Zero));

        // joining hook only fires at a block boundary
        place(&mut editor, "/p[2]/text()[1]", 0);
        assert!(editor.handle_key(Key::Backspace));
        assert_eq!(editor.model_html(), "<p>ab</p><p>cd</p>");
        assert_eq!(*calls.borrow(), vec!["enter", "backspace_joining"]);

        assert!(editor.deactivate_widget(handle));
        place(&mut editor, "/p[1]/text()[1]", 1);
        editor.handle_key(Key::Enter);
        assert_eq!(editor.model_html(), "<p>a</p><p>b</p><p>cd</p>");
    }

    #[test]
    fn test_unclaimed_widget_key_falls_through() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut editor = editor("<p>ab</p>");
        editor.activate_widget(Box::new(Recorder {
            calls: Rc::clone(&calls),
            claim_enter: false,
        }));
        place(&mut editor, "/p[1]/text()[1]", 1);
        editor.handle_key(Key::Enter);
        assert_eq!(editor.model_html(), "<p>a</p><p>b</p>");
        assert_eq!(*calls.borrow(), vec!["enter"]);
    }
}
