//! The action context handlers receive: shared, owned handles onto the tree
//! and focus ring plus the small set of host callbacks (stop, clipboard,
//! invalidate) a handler needs without reaching into the render loop
//! directly.
//!
//! `ActionContext` holds no borrows: everything is `Rc`/`Rc<RefCell<_>>`, so
//! it is `Clone` and safe to move into a handler's returned future, which may
//! still be unresolved when the next synchronous dispatch wants its own
//! context.

use std::cell::RefCell;
use std::rc::Rc;

use tokio_util::sync::CancellationToken;

use crate::{FocusRing, NodeId, Tree};

type StopFn = Rc<dyn Fn()>;
type ClipboardFn = Rc<dyn Fn(&str)>;
type InvalidateFn = Rc<dyn Fn()>;

#[derive(Clone)]
pub struct ActionContext {
    tree: Rc<RefCell<Tree>>,
    focus_ring: Rc<RefCell<FocusRing>>,
    current_node: Option<NodeId>,
    mouse_position: Option<(u16, u16)>,
    stop: Option<StopFn>,
    clipboard: Option<ClipboardFn>,
    invalidate: Option<InvalidateFn>,
    cancellation: CancellationToken,
}

impl ActionContext {
    pub fn new(tree: Rc<RefCell<Tree>>, focus_ring: Rc<RefCell<FocusRing>>) -> Self {
        Self {
            tree,
            focus_ring,
            current_node: None,
            mouse_position: None,
            stop: None,
            clipboard: None,
            invalidate: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_stop(mut self, stop: StopFn) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn with_clipboard(mut self, clipboard: ClipboardFn) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    pub fn with_invalidate(mut self, invalidate: InvalidateFn) -> Self {
        self.invalidate = Some(invalidate);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns a context identical to this one except scoped to `node` (the
    /// binding owner) and, for mouse-derived dispatches, the event's
    /// coordinates. The router sets these before invoking a handler.
    pub fn scoped(&self, node: Option<NodeId>, mouse_position: Option<(u16, u16)>) -> Self {
        Self {
            current_node: node,
            mouse_position,
            ..self.clone()
        }
    }

    pub fn current_node(&self) -> Option<NodeId> {
        self.current_node
    }

    pub fn mouse_position(&self) -> Option<(u16, u16)> {
        self.mouse_position
    }

    pub fn tree(&self) -> &Rc<RefCell<Tree>> {
        &self.tree
    }

    pub fn focus_ring(&self) -> &Rc<RefCell<FocusRing>> {
        &self.focus_ring
    }

    pub fn focus_next(&self) -> bool {
        self.focus_ring.borrow().focus_next(&mut self.tree.borrow_mut())
    }

    pub fn focus_previous(&self) -> bool {
        self.focus_ring.borrow().focus_previous(&mut self.tree.borrow_mut())
    }

    pub fn focus(&self, node: NodeId) -> bool {
        self.focus_ring.borrow().focus(&mut self.tree.borrow_mut(), node)
    }

    /// Requests the render loop stop after the current frame.
    pub fn stop(&self) {
        if let Some(stop) = &self.stop {
            stop();
        }
    }

    /// Writes `text` to the system clipboard (OSC 52 under the terminal
    /// backend). A no-op if no clipboard sink was wired.
    pub fn set_clipboard(&self, text: &str) {
        if let Some(clipboard) = &self.clipboard {
            clipboard(text);
        }
    }

    /// Wakes the render loop for an out-of-band redraw without waiting for
    /// the next input event.
    pub fn request_render(&self) {
        if let Some(invalidate) = &self.invalidate {
            invalidate();
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Walks from the current node up to the root, returning the first
    /// ancestor (inclusive) that hosts popups.
    pub fn popup_host_ancestor(&self) -> Option<NodeId> {
        self.ancestor_with(Tree::has_popup_host)
    }

    pub fn notification_host_ancestor(&self) -> Option<NodeId> {
        self.ancestor_with(Tree::has_notification_host)
    }

    pub fn window_host_ancestor(&self) -> Option<NodeId> {
        self.ancestor_with(Tree::has_window_host)
    }

    fn ancestor_with(&self, predicate: impl Fn(&Tree, NodeId) -> bool) -> Option<NodeId> {
        let tree = self.tree.borrow();
        let mut cur = self.current_node;
        while let Some(id) = cur {
            if predicate(&tree, id) {
                return Some(id);
            }
            cur = tree.parent(id);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Desc, Layout, NotificationHost, Widget};
    use core_grid::{Grid, Rect};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    struct Leaf;
    impl Widget for Leaf {
        fn is_focusable(&self) -> bool {
            true
        }
        fn render(&self, _grid: &mut Grid, _bounds: Rect) {}
    }

    struct Host;
    impl Widget for Host {
        fn layout(&self) -> Option<Layout> {
            Some(Layout::ZStack)
        }
        fn render(&self, _grid: &mut Grid, _bounds: Rect) {}
        fn as_notification_host(&self) -> Option<&dyn NotificationHost> {
            Some(self)
        }
    }
    impl NotificationHost for Host {}

    fn wired_context() -> (ActionContext, NodeId) {
        let mut tree = Tree::new();
        let root = tree.reconcile(Desc::new(Host).with_children(vec![Desc::new(Leaf)]));
        let leaf = tree.children(root)[0];
        let mut ring = FocusRing::new();
        ring.rebuild(&tree);
        let ctx = ActionContext::new(Rc::new(RefCell::new(tree)), Rc::new(RefCell::new(ring)));
        (ctx.scoped(Some(leaf), None), leaf)
    }

    #[test]
    fn focus_next_mutates_shared_tree() {
        let (ctx, leaf) = wired_context();
        assert!(ctx.focus_next());
        assert_eq!(ctx.tree().borrow().focused(), Some(leaf));
    }

    #[test]
    fn stop_callback_fires() {
        let (ctx, _leaf) = wired_context();
        let stopped = Rc::new(Cell::new(false));
        let stopped_clone = stopped.clone();
        let ctx = ctx.with_stop(Rc::new(move || stopped_clone.set(true)));
        ctx.stop();
        assert!(stopped.get());
    }

    #[test]
    fn notification_host_ancestor_found_by_walking_up() {
        let (ctx, _leaf) = wired_context();
        let found = ctx.notification_host_ancestor();
        assert!(found.is_some());
        assert!(ctx.tree().borrow().has_notification_host(found.unwrap()));
    }

    #[test]
    fn clone_shares_underlying_tree_handle() {
        let (ctx, leaf) = wired_context();
        let clone = ctx.clone();
        clone.focus(leaf);
        assert_eq!(ctx.tree().borrow().focused(), Some(leaf));
    }
}
