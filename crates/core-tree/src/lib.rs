//! The node arena, reconciliation, and focus ring that sit between the
//! binding model and the render loop.
//!
//! A frame is described declaratively as a [`Desc`] tree; [`Tree::reconcile`]
//! diffs it against the previous frame's arena, reusing matched nodes (and
//! their focus state) in place. [`NodeId`] is a generational index: once a
//! node is freed its slot may be reused, so a stale id never resolves to the
//! wrong node.

pub mod context;
pub mod focus;
pub mod layout;

pub use context::ActionContext;
pub use focus::FocusRing;
pub use layout::Layout;

use core_bindings::BindingBuilder;
use core_events::InputEvent;
use core_grid::{Grid, Rect};

/// Outcome of a node's `handle_input`: whether it consumed the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Handled,
    NotHandled,
}

/// Capability marker: a node that can host transient popup content above its
/// own bounds. Queried by walking ancestors rather than downcasting a
/// concrete type.
pub trait PopupHost {}

/// Capability marker: a node that can surface a transient notification.
pub trait NotificationHost {}

/// Capability marker: a node that owns a window/terminal-title identity.
pub trait WindowHost {}

/// The behavior a tree node contributes. `render`/`handle_input` are the
/// only methods every node needs; the rest default to "not applicable."
pub trait Widget {
    /// Whether this node can receive focus and so belongs in the focus ring.
    fn is_focusable(&self) -> bool {
        false
    }

    /// `Some(policy)` makes this node a container: its children's bounds are
    /// computed from `policy` during the layout pass. `None` means this node
    /// has no layout opinion about its children (typically because it has
    /// none).
    fn layout(&self) -> Option<Layout> {
        None
    }

    /// Declares this node's key/character/mouse/drag bindings for the
    /// current frame. Called once per frame before routing.
    fn build_bindings(&self, _node: NodeId, _builder: &mut BindingBuilder<ActionContext>) {}

    /// Delivers an input event already routed to this node.
    fn handle_input(&mut self, _event: &InputEvent) -> Handled {
        Handled::NotHandled
    }

    /// Paints this node's own content into `grid` within `bounds`. Children
    /// render separately, after their parent, so a parent's background never
    /// overwrites a child already drawn.
    fn render(&self, grid: &mut Grid, bounds: Rect);

    /// The rectangle mouse hit-testing uses for this node, derived from its
    /// laid-out `bounds`. Defaults to `bounds` itself; a node may return a
    /// stricter rectangle (e.g. a splitter exposing only its divider).
    fn hit_bounds(&self, bounds: Rect) -> Rect {
        bounds
    }

    /// Notifies a container which of its immediate children now holds focus
    /// (or none), so it can track things like "last-focused child" without
    /// re-deriving it from the ring each frame.
    fn sync_focus_index(&mut self, _focused_child: Option<NodeId>) {}

    fn as_popup_host(&self) -> Option<&dyn PopupHost> {
        None
    }

    fn as_notification_host(&self) -> Option<&dyn NotificationHost> {
        None
    }

    fn as_window_host(&self) -> Option<&dyn WindowHost> {
        None
    }
}

/// Generational arena index. Equality requires both the slot index and the
/// generation to match, so an id surviving past its node's removal cannot be
/// mistaken for whatever later reused that slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Opaque diagnostic identity for use as a `core_bindings::NodeRef`.
    /// Carries no guarantee beyond uniqueness among currently-live nodes.
    pub fn to_node_ref(self) -> core_bindings::NodeRef {
        ((self.index as u64) << 32) | self.generation as u64
    }
}

/// A declarative description of one frame's worth of a node (and its
/// subtree), handed to [`Tree::reconcile`].
pub struct Desc {
    key: Option<u64>,
    widget: Box<dyn Widget>,
    children: Vec<Desc>,
}

impl Desc {
    pub fn new(widget: impl Widget + 'static) -> Self {
        Self {
            key: None,
            widget: Box::new(widget),
            children: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: u64) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_children(mut self, children: Vec<Desc>) -> Self {
        self.children = children;
        self
    }
}

struct Entry {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    key: Option<u64>,
    bounds: Rect,
    hit_bounds: Rect,
    is_focused: bool,
    widget: Box<dyn Widget>,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Owns the whole node arena: structure, bounds, and current focus.
/// Structural mutation happens only inside [`Tree::reconcile`]; layout,
/// rendering, and input delivery all read the structure reconciliation
/// already built (focus is the one field routing may narrowly write).
pub struct Tree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: Option<NodeId>,
    focused: Option<NodeId>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            focused: None,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    fn alloc(&mut self, parent: Option<NodeId>, key: Option<u64>, widget: Box<dyn Widget>) -> NodeId {
        let entry = Entry {
            parent,
            children: Vec::new(),
            key,
            bounds: Rect::new(0, 0, 0, 0),
            hit_bounds: Rect::new(0, 0, 0, 0),
            is_focused: false,
            widget,
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.entry = Some(entry);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, entry: Some(entry) });
            NodeId { index, generation: 0 }
        }
    }

    fn free_node(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation {
                slot.entry = None;
                self.free.push(id.index);
            }
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let children = self.get(id).map(|e| e.children.clone()).unwrap_or_default();
        for child in children {
            self.free_subtree(child);
        }
        if self.focused == Some(id) {
            self.focused = None;
        }
        self.free_node(id);
    }

    fn get(&self, id: NodeId) -> Option<&Entry> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Entry> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|e| e.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    pub fn is_focused(&self, id: NodeId) -> bool {
        self.get(id).map(|e| e.is_focused).unwrap_or(false)
    }

    pub fn bounds(&self, id: NodeId) -> Rect {
        self.get(id).map(|e| e.bounds).unwrap_or(Rect::new(0, 0, 0, 0))
    }

    pub fn is_focusable(&self, id: NodeId) -> bool {
        self.get(id).map(|e| e.widget.is_focusable()).unwrap_or(false)
    }

    /// Mutable access to a node's widget, for `handle_input`.
    pub fn widget_mut(&mut self, id: NodeId) -> Option<&mut dyn Widget> {
        self.get_mut(id).map(|e| e.widget.as_mut())
    }

    pub fn build_bindings(&self, id: NodeId, builder: &mut BindingBuilder<ActionContext>) {
        if let Some(entry) = self.get(id) {
            entry.widget.build_bindings(id, builder);
        }
    }

    /// Reconciles `desc` against the current tree (or builds a fresh one if
    /// empty), matching children by key first, then by position among the
    /// remaining unmatched siblings. Unmatched previous nodes (and their
    /// subtrees) are freed.
    pub fn reconcile(&mut self, desc: Desc) -> NodeId {
        let mut pool = match self.root {
            Some(root) => vec![root],
            None => Vec::new(),
        };
        let new_root = self.reconcile_node(&mut pool, None, desc);
        for leftover in pool {
            self.free_subtree(leftover);
        }
        self.root = Some(new_root);
        new_root
    }

    fn reconcile_node(&mut self, pool: &mut Vec<NodeId>, parent: Option<NodeId>, desc: Desc) -> NodeId {
        let matched = match desc.key {
            Some(key) => pool.iter().position(|&id| self.get(id).and_then(|e| e.key) == Some(key)),
            None => pool.iter().position(|&id| self.get(id).map(|e| e.key.is_none()).unwrap_or(false)),
        };

        match matched {
            Some(idx) => {
                let id = pool.remove(idx);
                let mut child_pool = self
                    .get_mut(id)
                    .map(|e| std::mem::take(&mut e.children))
                    .unwrap_or_default();
                if let Some(entry) = self.get_mut(id) {
                    entry.widget = desc.widget;
                    entry.key = desc.key;
                    entry.parent = parent;
                }
                let new_children: Vec<NodeId> = desc
                    .children
                    .into_iter()
                    .map(|child| self.reconcile_node(&mut child_pool, Some(id), child))
                    .collect();
                for leftover in child_pool {
                    self.free_subtree(leftover);
                }
                if let Some(entry) = self.get_mut(id) {
                    entry.children = new_children;
                }
                id
            }
            None => {
                let id = self.alloc(parent, desc.key, desc.widget);
                let mut empty_pool = Vec::new();
                let new_children: Vec<NodeId> = desc
                    .children
                    .into_iter()
                    .map(|child| self.reconcile_node(&mut empty_pool, Some(id), child))
                    .collect();
                if let Some(entry) = self.get_mut(id) {
                    entry.children = new_children;
                }
                id
            }
        }
    }

    /// Assigns bounds top-down from `bounds`, recursing through each
    /// container's layout policy. Leaves (no policy) keep the bounds their
    /// parent gave them and lay out nothing further.
    pub fn layout(&mut self, bounds: Rect) {
        if let Some(root) = self.root {
            self.layout_node(root, bounds);
        }
    }

    fn layout_node(&mut self, id: NodeId, bounds: Rect) {
        if let Some(entry) = self.get_mut(id) {
            entry.bounds = bounds;
            entry.hit_bounds = entry.widget.hit_bounds(bounds);
        }
        let children = self.get(id).map(|e| e.children.clone()).unwrap_or_default();
        let policy = self.get(id).and_then(|e| e.widget.layout());
        if let Some(policy) = policy {
            let child_bounds = layout::compute_child_bounds(&policy, bounds, children.len());
            for (child, cb) in children.iter().zip(child_bounds) {
                self.layout_node(*child, cb);
            }
        }
    }

    /// Paints the whole tree, parent first then children, into `grid`.
    pub fn render(&self, grid: &mut Grid) {
        if let Some(root) = self.root {
            self.render_node(root, grid);
        }
    }

    fn render_node(&self, id: NodeId, grid: &mut Grid) {
        let Some(entry) = self.get(id) else { return };
        entry.widget.render(grid, entry.bounds);
        for &child in &entry.children {
            self.render_node(child, grid);
        }
    }

    /// DFS render-order enumeration of `from`'s subtree (including `from`
    /// itself) restricted to nodes reporting `is_focusable() == true`.
    pub fn focusable_descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_focusable(from, &mut out);
        out
    }

    fn collect_focusable(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(entry) = self.get(id) else { return };
        if entry.widget.is_focusable() {
            out.push(id);
        }
        for &child in &entry.children {
            self.collect_focusable(child, out);
        }
    }

    pub fn hit_bounds(&self, id: NodeId) -> Rect {
        self.get(id).map(|e| e.hit_bounds).unwrap_or(Rect::new(0, 0, 0, 0))
    }

    pub fn has_popup_host(&self, id: NodeId) -> bool {
        self.get(id).map(|e| e.widget.as_popup_host().is_some()).unwrap_or(false)
    }

    pub fn has_notification_host(&self, id: NodeId) -> bool {
        self.get(id).map(|e| e.widget.as_notification_host().is_some()).unwrap_or(false)
    }

    pub fn has_window_host(&self, id: NodeId) -> bool {
        self.get(id).map(|e| e.widget.as_window_host().is_some()).unwrap_or(false)
    }

    /// Moves focus to `new` (or clears it), then walks ancestors from `new`
    /// up to the root invoking `sync_focus_index` on each with the id of the
    /// child through which focus descends.
    pub fn set_focus(&mut self, new: Option<NodeId>) {
        if let Some(prev) = self.focused {
            if let Some(e) = self.get_mut(prev) {
                e.is_focused = false;
            }
        }
        self.focused = new;
        tracing::trace!(target: "tree.focus", ?new, "focus_changed");
        let Some(leaf) = new else { return };
        if let Some(e) = self.get_mut(leaf) {
            e.is_focused = true;
        }
        let mut child = leaf;
        let mut parent = self.parent(leaf);
        while let Some(p) = parent {
            if let Some(entry) = self.get_mut(p) {
                entry.widget.sync_focus_index(Some(child));
            }
            child = p;
            parent = self.parent(p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Leaf {
        focusable: bool,
        label: &'static str,
    }

    impl Widget for Leaf {
        fn is_focusable(&self) -> bool {
            self.focusable
        }

        fn render(&self, grid: &mut Grid, bounds: Rect) {
            grid.write_text(bounds.x, bounds.y, self.label, core_grid::Style::default());
        }
    }

    struct Stacked;

    impl Widget for Stacked {
        fn layout(&self) -> Option<Layout> {
            Some(Layout::Stack { direction: layout::Direction::Vertical })
        }

        fn render(&self, _grid: &mut Grid, _bounds: Rect) {}
    }

    fn leaf(label: &'static str, focusable: bool) -> Desc {
        Desc::new(Leaf { focusable, label })
    }

    #[test]
    fn reconcile_builds_fresh_tree_with_stable_ids_across_frames() {
        let mut tree = Tree::new();
        let root_id = tree.reconcile(
            Desc::new(Stacked).with_children(vec![leaf("a", true), leaf("b", true)]),
        );
        assert_eq!(tree.children(root_id).len(), 2);
        let first_child = tree.children(root_id)[0];

        let root_id2 = tree.reconcile(
            Desc::new(Stacked).with_children(vec![leaf("a2", true), leaf("b2", true)]),
        );
        assert_eq!(root_id, root_id2);
        assert_eq!(tree.children(root_id2)[0], first_child);
    }

    #[test]
    fn reconcile_frees_removed_subtrees() {
        let mut tree = Tree::new();
        tree.reconcile(Desc::new(Stacked).with_children(vec![leaf("a", true), leaf("b", true)]));
        let root = tree.reconcile(Desc::new(Stacked).with_children(vec![leaf("a", true)]));
        assert_eq!(tree.children(root).len(), 1);
    }

    #[test]
    fn keyed_children_retain_identity_despite_reordering() {
        let mut tree = Tree::new();
        let root = tree.reconcile(Desc::new(Stacked).with_children(vec![
            leaf("a", true).with_key(1),
            leaf("b", true).with_key(2),
        ]));
        let a_id = tree.children(root)[0];
        let b_id = tree.children(root)[1];

        let root2 = tree.reconcile(Desc::new(Stacked).with_children(vec![
            leaf("b2", true).with_key(2),
            leaf("a2", true).with_key(1),
        ]));
        assert_eq!(tree.children(root2)[0], b_id);
        assert_eq!(tree.children(root2)[1], a_id);
    }

    #[test]
    fn focusable_descendants_skips_non_focusable_nodes() {
        let mut tree = Tree::new();
        let root = tree.reconcile(Desc::new(Stacked).with_children(vec![
            leaf("a", true),
            leaf("b", false),
            leaf("c", true),
        ]));
        let focusable = tree.focusable_descendants(root);
        assert_eq!(focusable.len(), 2);
    }

    #[test]
    fn set_focus_walks_ancestors() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Tracker(Rc<RefCell<Option<NodeId>>>);
        impl Widget for Tracker {
            fn layout(&self) -> Option<Layout> {
                Some(Layout::Stack { direction: layout::Direction::Vertical })
            }
            fn render(&self, _grid: &mut Grid, _bounds: Rect) {}
            fn sync_focus_index(&mut self, focused_child: Option<NodeId>) {
                *self.0.borrow_mut() = focused_child;
            }
        }

        let last_focused = Rc::new(RefCell::new(None));
        let mut tree = Tree::new();
        let root = tree.reconcile(
            Desc::new(Tracker(last_focused.clone())).with_children(vec![leaf("a", true)]),
        );
        let child = tree.children(root)[0];
        tree.set_focus(Some(child));
        assert_eq!(*last_focused.borrow(), Some(child));
        assert!(tree.is_focused(child));
    }

    #[test]
    fn stale_node_id_does_not_resolve_after_removal() {
        let mut tree = Tree::new();
        let root = tree.reconcile(Desc::new(Stacked).with_children(vec![leaf("a", true)]));
        let stale = tree.children(root)[0];
        tree.reconcile(Desc::new(Stacked).with_children(vec![]));
        assert!(tree.get(stale).is_none());
    }

    #[test]
    fn layout_assigns_full_bounds_to_root_and_splits_to_children() {
        let mut tree = Tree::new();
        let root = tree.reconcile(Desc::new(Stacked).with_children(vec![leaf("a", true), leaf("b", true)]));
        tree.layout(Rect::new(0, 0, 10, 10));
        assert_eq!(tree.bounds(root), Rect::new(0, 0, 10, 10));
        let children = tree.children(root).to_vec();
        assert_eq!(tree.bounds(children[0]).h + tree.bounds(children[1]).h, 10);
    }

    struct Divider;

    impl Widget for Divider {
        fn render(&self, _grid: &mut Grid, _bounds: Rect) {}

        fn hit_bounds(&self, bounds: Rect) -> Rect {
            Rect::new(bounds.x, bounds.y, 1, bounds.h)
        }
    }

    #[test]
    fn widget_can_narrow_its_hit_bounds_below_its_layout_bounds() {
        let mut tree = Tree::new();
        let root = tree.reconcile(Desc::new(Divider));
        tree.layout(Rect::new(0, 0, 10, 5));
        assert_eq!(tree.bounds(root), Rect::new(0, 0, 10, 5));
        assert_eq!(tree.hit_bounds(root), Rect::new(0, 0, 1, 5));
    }
}
