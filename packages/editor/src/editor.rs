//! # Editing Engine
//!
//! One `Editor` per editing surface. It owns the live tree the user types
//! into, the detached model tree, and everything that reconciles the two.
//!
//! ## Cycle
//!
//! ```text
//! edit live → records → rollback + build → push snapshot → apply → render → restore selection
//! ```
//!
//! The engine is locked from the moment observation stops until the
//! selection is restored, and `sync`, `undo`, `redo` and enqueue-triggered
//! syncs are refused while locked.

use crate::address::AddressOptions;
use crate::builder::{OperationBuilder, RemovalContext, RemovalListeners, TextTransform};
use crate::config::EditorConfig;
use crate::errors::EditorError;
use crate::history::History;
use crate::observer::{ChangeObserver, Trigger};
use crate::operation::{apply_stack, Operation};
use crate::render::{MirrorRenderer, RenderContext, Renderer};
use crate::schedule::Debouncer;
use crate::selection::{capture, restore, CaretToken, Selection, SelectionStatus};
use crate::widget::{EditableWidget, WidgetHandle, WidgetStack};
use marrow_dom::{Document, NodeId};
use std::time::Instant;
use tracing::{debug, error, warn};

pub struct Editor {
    config: EditorConfig,
    options: AddressOptions,

    /// Surface the user edits
    live: Document,

    /// Source of truth, only touched by operations and history swaps
    model: Document,

    observer: ChangeObserver,
    listeners: RemovalListeners,
    builder: OperationBuilder,
    history: History,
    renderer: Box<dyn Renderer>,

    /// Operations submitted directly, applied after observed ones
    enqueued: Vec<Operation>,

    selection: Option<Selection>,
    saved_status: Option<SelectionStatus>,
    caret_token: Option<CaretToken>,

    pub(crate) widgets: WidgetStack,
    debouncer: Debouncer,
    locked: bool,

    /// Current version number (increments on each model change)
    version: u64,

    /// Operations of the last batch, in application order
    last_batch: Vec<Operation>,
}

impl Editor {
    /// Engine over `model` with the default configuration
    pub fn new(model: Document) -> Self {
        Self::with_config(model, EditorConfig::default())
    }

    pub fn with_config(model: Document, config: EditorConfig) -> Self {
        let options = config.address_options();
        let mut editor = Self {
            options,
            live: Document::new(&config.root_tag),
            model,
            observer: ChangeObserver::new(),
            listeners: RemovalListeners::new(),
            builder: OperationBuilder::new(options),
            history: History::with_max_levels(config.history_depth),
            renderer: Box::new(MirrorRenderer),
            enqueued: Vec::new(),
            selection: None,
            saved_status: None,
            caret_token: None,
            widgets: WidgetStack::new(),
            debouncer: Debouncer::new(config.sync_debounce()),
            locked: false,
            version: 0,
            last_batch: Vec::new(),
            config,
        };
        editor.render();
        editor.observer.observe(&mut editor.live);
        editor
    }

    /// Engine over a model parsed from a markup fragment
    pub fn from_markup(markup: &str, config: EditorConfig) -> Result<Self, EditorError> {
        let model = Document::from_fragment(&config.root_tag, markup)?;
        Ok(Self::with_config(model, config))
    }

    /// Swap the renderer and re-render the live tree with it
    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.set_renderer(Box::new(renderer));
        self
    }

    pub fn with_transform(mut self, transform: impl TextTransform + 'static) -> Self {
        self.builder.set_transform(Some(Box::new(transform)));
        self
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.renderer = renderer;
        self.observer.stop_observing(&mut self.live);
        self.render();
        self.observer.observe(&mut self.live);
    }

    pub fn set_transform(&mut self, transform: Option<Box<dyn TextTransform>>) {
        self.builder.set_transform(transform);
    }

    // ---- accessors -------------------------------------------------------

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn address_options(&self) -> AddressOptions {
        self.options
    }

    pub fn live(&self) -> &Document {
        &self.live
    }

    /// The live tree for direct edits; they are picked up by the next sync
    pub fn live_mut(&mut self) -> &mut Document {
        &mut self.live
    }

    pub fn model(&self) -> &Document {
        &self.model
    }

    /// Markup of the model's content, root excluded
    pub fn model_html(&self) -> String {
        self.model.inner_html(self.model.root())
    }

    pub fn live_html(&self) -> String {
        self.live.inner_html(self.live.root())
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn last_operations(&self) -> &[Operation] {
        &self.last_batch
    }

    // ---- sync ------------------------------------------------------------

    /// Reconcile pending live edits into the model.
    ///
    /// Returns `false` when refused (locked) or when the batch was aborted.
    pub fn sync(&mut self) -> bool {
        if self.locked {
            debug!("Sync refused while locked");
            return false;
        }
        self.locked = true;
        self.debouncer.cancel();

        let records = self.observer.stop_observing(&mut self.live);
        let status = self
            .saved_status
            .take()
            .or_else(|| capture(&self.live, self.selection.as_ref(), self.options));

        let built = self.builder.build(&mut self.live, records, &self.listeners);
        let enqueued = std::mem::take(&mut self.enqueued);

        if built.is_empty() && enqueued.is_empty() {
            self.last_batch.clear();
            self.finish_cycle(status);
            return true;
        }

        self.last_batch = built
            .operations
            .iter()
            .rev()
            .chain(built.derived.iter().rev())
            .chain(enqueued.iter().rev())
            .cloned()
            .collect();

        self.history.push(self.model.snapshot());

        let result = apply_stack(&mut self.model, built.operations, self.options)
            .and_then(|observed| {
                let derived = apply_stack(&mut self.model, built.derived, self.options)?;
                let direct = apply_stack(&mut self.model, enqueued, self.options)?;
                Ok(observed + derived + direct)
            });

        let success = match result {
            Ok(count) => {
                let root = self.model.root();
                self.model.normalize(root);
                // drop nodes the batch detached or merged away
                self.model = self.model.snapshot();
                self.version += 1;
                debug!(operations = count, version = self.version, "Batch applied");
                true
            }
            Err(err) => {
                error!(error = %err, "Batch aborted, model left at previous snapshot");
                if let Some(previous) = self.history.pop() {
                    self.model = previous;
                }
                false
            }
        };

        self.render();
        self.finish_cycle(status);
        success
    }

    /// Submit operations outside the observer path. Syncs right away when
    /// unlocked, otherwise they wait for the next cycle.
    pub fn enqueue(&mut self, operations: impl IntoIterator<Item = Operation>) -> bool {
        self.enqueued.extend(operations);
        if self.locked {
            return false;
        }
        self.sync()
    }

    pub fn request_sync(&mut self, now: Instant) {
        self.debouncer.request(now);
    }

    /// Run a requested sync once its quiet period is over
    pub fn tick(&mut self, now: Instant) -> Option<bool> {
        if self.locked || !self.debouncer.take_due(now) {
            return None;
        }
        Some(self.sync())
    }

    fn has_pending_changes(&mut self) -> bool {
        self.observer.poll(&mut self.live);
        self.observer.pending() > 0 || !self.enqueued.is_empty()
    }

    fn render(&mut self) {
        self.observer.ignores_mut().clear();
        self.listeners.clear();
        let mut context = RenderContext {
            ignores: self.observer.ignores_mut(),
            listeners: &mut self.listeners,
        };
        self.live = self.renderer.render(&self.model, &mut context);
        self.selection = None;
    }

    fn finish_cycle(&mut self, status: Option<SelectionStatus>) {
        let token = self.caret_token.take();
        self.selection = status.map(|status| restore(&self.live, &status, token, self.options));
        self.locked = false;
        self.observer.observe(&mut self.live);
    }

    // ---- history ---------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        self.step_history(History::undo)
    }

    pub fn redo(&mut self) -> bool {
        self.step_history(History::redo)
    }

    fn step_history(&mut self, step: fn(&mut History, &mut Document) -> bool) -> bool {
        if self.locked {
            return false;
        }
        if self.has_pending_changes() && !self.sync() {
            warn!("Pending edits could not be synced, history left as is");
            return false;
        }

        self.locked = true;
        self.observer.stop_observing(&mut self.live);
        let status = self
            .saved_status
            .take()
            .or_else(|| capture(&self.live, self.selection.as_ref(), self.options));

        let stepped = step(&mut self.history, &mut self.model);
        if stepped {
            self.version += 1;
            self.last_batch.clear();
            self.render();
        }
        self.finish_cycle(status);
        stepped
    }

    /// Drop the newest `count` undo snapshots
    pub fn discard_history(&mut self, count: usize) -> usize {
        self.history.discard(count)
    }

    // ---- collaborators ---------------------------------------------------

    /// Exempt live nodes from becoming operations until the next render
    pub fn ignore(&mut self, nodes: &[NodeId], trigger: Trigger, include_descendants: bool) {
        self.observer
            .ignore(&self.live, nodes, trigger, include_descendants);
    }

    /// Run `listener` when the removal of live `node` is rolled back; the
    /// operations it returns join the batch. Cleared on every render.
    pub fn on_removal(
        &mut self,
        node: NodeId,
        listener: impl Fn(&RemovalContext<'_>) -> Vec<Operation> + 'static,
    ) {
        self.listeners.on_removal(node, listener);
    }

    pub fn set_caret_token(&mut self, token: CaretToken) {
        self.caret_token = Some(token);
    }

    pub fn caret_token(&self) -> Option<CaretToken> {
        self.caret_token
    }

    pub fn activate_widget(&mut self, widget: Box<dyn EditableWidget>) -> WidgetHandle {
        self.widgets.activate(widget)
    }

    pub fn deactivate_widget(&mut self, handle: WidgetHandle) -> bool {
        self.widgets.deactivate(handle)
    }

    /// Root of the active widget, for copy/paste scoping
    pub fn widget_root(&self) -> Option<NodeId> {
        self.widgets.top().and_then(|widget| widget.root())
    }

    /// Call a hook of the top widget with the editor lent to it
    pub(crate) fn with_top_widget(
        &mut self,
        hook: impl FnOnce(&mut dyn EditableWidget, &mut Editor) -> bool,
    ) -> bool {
        let Some((handle, mut widget)) = self.widgets.take_top() else {
            return false;
        };
        let handled = hook(widget.as_mut(), self);
        self.widgets.restore(handle, widget);
        handled
    }

    // ---- selection -------------------------------------------------------

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    pub fn capture_selection(&self) -> Option<SelectionStatus> {
        capture(&self.live, self.selection.as_ref(), self.options)
    }

    /// Capture now; the next restore uses this instead of capturing again
    pub fn save_selection(&mut self) {
        self.saved_status = self.capture_selection();
    }

    /// Place a captured selection in the current live tree, consuming any
    /// pending caret token
    pub fn restore_selection(&mut self, status: &SelectionStatus) -> Selection {
        let token = self.caret_token.take();
        let selection = restore(&self.live, status, token, self.options);
        self.selection = Some(selection);
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::decode;
    use crate::operation::OperationKind;

    fn editor(markup: &str) -> Editor {
        Editor::from_markup(markup, EditorConfig::default()).unwrap()
    }

    fn node(editor: &Editor, path: &str) -> NodeId {
        decode(editor.live(), &path.parse().unwrap(), editor.address_options()).unwrap()
    }

    #[test]
    fn test_initial_render_mirrors_model() {
        let editor = editor("<p>Hello</p>");
        assert_eq!(editor.live_html(), "<p>Hello</p>");
        assert_eq!(editor.model_html(), "<p>Hello</p>");
        assert!(!editor.is_locked());
        assert!(editor.live().is_observing());
    }

    #[test]
    fn test_sync_without_changes() {
        let mut editor = editor("<p>Hello</p>");
        assert!(editor.sync());
        assert_eq!(editor.version(), 0);
        assert_eq!(editor.history().undo_levels(), 0);
        assert!(editor.last_operations().is_empty());
    }

    #[test]
    fn test_text_edit_reaches_model() {
        let mut editor = editor("<p>Hello</p>");
        let text = node(&editor, "/p[1]/text()[1]");
        editor.live_mut().set_text(text, "Hello!").unwrap();

        assert!(editor.sync());
        assert_eq!(editor.model_html(), "<p>Hello!</p>");
        assert_eq!(editor.live_html(), "<p>Hello!</p>");
        assert_eq!(editor.version(), 1);
        assert_eq!(editor.history().undo_levels(), 1);
    }

    #[test]
    fn test_failed_batch_leaves_model_untouched() {
        let mut editor = editor("<p>Hello</p>");
        let bad = Operation::Text {
            target: "/p[4]/text()[1]".parse().unwrap(),
            text: Some("x".into()),
            previous: None,
        };
        let good = Operation::Attr {
            target: "/p[1]".parse().unwrap(),
            name: "class".into(),
            value: Some("x".into()),
        };
        // popped last-to-first: `good` applies, then `bad` aborts
        assert!(!editor.enqueue(vec![bad, good]));
        assert_eq!(editor.model_html(), "<p>Hello</p>");
        assert_eq!(editor.history().undo_levels(), 0);
        assert_eq!(editor.version(), 0);
        assert!(!editor.is_locked());
    }

    #[test]
    fn test_model_arena_stays_compact() {
        let mut editor = editor("<p>x</p>");
        for round in 0..50 {
            let replacement = marrow_dom::VNode::element("p")
                .with_child(marrow_dom::VNode::text(format!("x{round}")));
            assert!(editor.enqueue(vec![Operation::Replace {
                target: "/p[1]".parse().unwrap(),
                nodes: vec![replacement],
            }]));
            assert_eq!(editor.model().node_count(), 3);
        }
        assert_eq!(editor.model_html(), "<p>x49</p>");
    }

    #[test]
    fn test_undo_refused_when_pending_edits_abort() {
        let mut editor = editor("<p>a</p>");
        let text = node(&editor, "/p[1]/text()[1]");
        editor.live_mut().set_text(text, "ab").unwrap();
        assert!(editor.sync());

        // queued as if submitted during a cycle
        editor.enqueued.push(Operation::Text {
            target: "/p[7]/text()[1]".parse().unwrap(),
            text: Some("x".into()),
            previous: None,
        });
        assert!(!editor.undo());
        assert_eq!(editor.model_html(), "<p>ab</p>");
        assert_eq!(editor.history().undo_levels(), 1);
        assert!(!editor.is_locked());
    }

    #[test]
    fn test_enqueued_operations_apply_last_first() {
        let mut editor = editor("<p>a</p>");
        let ops = vec![
            Operation::Attr {
                target: "/h1[1]".parse().unwrap(),
                name: "id".into(),
                value: Some("top".into()),
            },
            Operation::Replace {
                target: "/p[1]".parse().unwrap(),
                nodes: vec![marrow_dom::VNode::element("h1")],
            },
        ];
        assert!(editor.enqueue(ops));
        assert_eq!(editor.model_html(), r#"<h1 id="top"></h1>"#);
        let kinds: Vec<_> = editor.last_operations().iter().map(Operation::kind).collect();
        assert_eq!(kinds, vec![OperationKind::Replace, OperationKind::Attr]);
    }

    #[test]
    fn test_tick_runs_debounced_sync() {
        let mut editor = editor("<p>a</p>");
        let text = node(&editor, "/p[1]/text()[1]");
        editor.live_mut().set_text(text, "ab").unwrap();

        let start = Instant::now();
        editor.request_sync(start);
        assert_eq!(editor.tick(start), None);
        assert_eq!(editor.tick(start + editor.config().sync_debounce()), Some(true));
        assert_eq!(editor.model_html(), "<p>ab</p>");
        assert_eq!(editor.tick(start + editor.config().sync_debounce() * 2), None);
    }

    #[test]
    fn test_selection_survives_sync() {
        let mut editor = editor("<p>Hello</p>");
        let text = node(&editor, "/p[1]/text()[1]");
        editor.live_mut().set_text(text, "Hello!").unwrap();
        editor.set_selection(Some(Selection::caret(text, 6)));

        editor.sync();
        let selection = editor.selection().unwrap();
        assert_eq!(selection.anchor.node, node(&editor, "/p[1]/text()[1]"));
        assert_eq!(selection.anchor.offset, 6);
    }
}
