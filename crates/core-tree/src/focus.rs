//! The focus ring: a cached, render-ordered list of focusable nodes plus the
//! traversal operations (`next`/`previous`/hit-testing) layered over it.
//! [`Tree`] owns which single node is focused; the ring only decides which
//! node that should become.

use crate::{NodeId, Tree};

/// Render-ordered cache of focusable nodes, rebuilt once per frame after
/// reconciliation. Membership (not focus itself) lives here; `Tree` is the
/// source of truth for which member, if any, currently holds focus.
#[derive(Debug, Default)]
pub struct FocusRing {
    members: Vec<NodeId>,
}

impl FocusRing {
    pub fn new() -> Self {
        Self { members: Vec::new() }
    }

    /// Recomputes membership from the tree's current root. Call after every
    /// reconciliation, before layout or routing.
    pub fn rebuild(&mut self, tree: &Tree) {
        self.members = match tree.root() {
            Some(root) => tree.focusable_descendants(root),
            None => Vec::new(),
        };
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.members.contains(&node)
    }

    /// Advances focus to the next member after the current one, wrapping
    /// around. Focuses the first member if nothing was focused or the
    /// previously focused node dropped out of the ring. Returns `false` if
    /// the ring is empty.
    pub fn focus_next(&self, tree: &mut Tree) -> bool {
        self.step(tree, 1)
    }

    /// As `focus_next`, but backwards.
    pub fn focus_previous(&self, tree: &mut Tree) -> bool {
        self.step(tree, -1)
    }

    fn step(&self, tree: &mut Tree, delta: isize) -> bool {
        if self.members.is_empty() {
            return false;
        }
        let len = self.members.len() as isize;
        let current = tree.focused().and_then(|f| self.members.iter().position(|&m| m == f));
        let next_idx = match current {
            Some(i) => ((i as isize + delta).rem_euclid(len)) as usize,
            None => 0,
        };
        tree.set_focus(Some(self.members[next_idx]));
        true
    }

    /// Focuses `node` directly. Returns `false` (and does nothing) if `node`
    /// is not a current ring member.
    pub fn focus(&self, tree: &mut Tree, node: NodeId) -> bool {
        if !self.members.contains(&node) {
            return false;
        }
        tree.set_focus(Some(node));
        true
    }

    /// Focuses the first member satisfying `predicate`. Returns `false` if
    /// none does.
    pub fn focus_where(&self, tree: &mut Tree, predicate: impl Fn(NodeId, &Tree) -> bool) -> bool {
        let found = self.members.iter().copied().find(|&id| predicate(id, tree));
        match found {
            Some(id) => {
                tree.set_focus(Some(id));
                true
            }
            None => false,
        }
    }

    /// Guarantees some member holds focus when the ring is non-empty:
    /// focuses the first member if the currently-focused node (if any) is
    /// not a ring member. Returns `true` if focus changed.
    pub fn ensure_focus(&self, tree: &mut Tree) -> bool {
        let already_valid = tree.focused().map(|f| self.contains(f)).unwrap_or(false);
        if already_valid {
            return false;
        }
        match self.members.first() {
            Some(&first) => {
                tree.set_focus(Some(first));
                true
            }
            None => {
                tree.set_focus(None);
                false
            }
        }
    }

    /// Topmost member (last in render order) whose hit bounds contain
    /// `(x, y)`.
    pub fn hit_test(&self, tree: &Tree, x: u16, y: u16) -> Option<NodeId> {
        self.members
            .iter()
            .rev()
            .copied()
            .find(|&id| tree.hit_bounds(id).contains(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Desc, Handled, Layout, Widget};
    use core_events::InputEvent;
    use core_grid::{Grid, Rect};
    use pretty_assertions::assert_eq;

    struct Leaf(bool);
    impl Widget for Leaf {
        fn is_focusable(&self) -> bool {
            self.0
        }
        fn render(&self, _grid: &mut Grid, _bounds: Rect) {}
        fn handle_input(&mut self, _event: &InputEvent) -> Handled {
            Handled::NotHandled
        }
    }

    struct Stack;
    impl Widget for Stack {
        fn layout(&self) -> Option<Layout> {
            Some(Layout::Stack { direction: crate::layout::Direction::Vertical })
        }
        fn render(&self, _grid: &mut Grid, _bounds: Rect) {}
    }

    fn three_leaf_tree() -> (Tree, FocusRing, Vec<NodeId>) {
        let mut tree = Tree::new();
        let root = tree.reconcile(Desc::new(Stack).with_children(vec![
            Desc::new(Leaf(true)),
            Desc::new(Leaf(true)),
            Desc::new(Leaf(true)),
        ]));
        let mut ring = FocusRing::new();
        ring.rebuild(&tree);
        let members = tree.children(root).to_vec();
        (tree, ring, members)
    }

    #[test]
    fn focus_next_wraps_around() {
        let (mut tree, ring, members) = three_leaf_tree();
        ring.focus(&mut tree, members[2]);
        assert!(ring.focus_next(&mut tree));
        assert_eq!(tree.focused(), Some(members[0]));
    }

    #[test]
    fn focus_previous_wraps_around() {
        let (mut tree, ring, members) = three_leaf_tree();
        ring.focus(&mut tree, members[0]);
        assert!(ring.focus_previous(&mut tree));
        assert_eq!(tree.focused(), Some(members[2]));
    }

    #[test]
    fn focus_next_with_nothing_focused_picks_first() {
        let (mut tree, ring, members) = three_leaf_tree();
        assert!(ring.focus_next(&mut tree));
        assert_eq!(tree.focused(), Some(members[0]));
    }

    #[test]
    fn focus_rejects_non_member_nodes() {
        let (mut tree, ring, _members) = three_leaf_tree();
        let mut other = Tree::new();
        let foreign = other.reconcile(Desc::new(Leaf(true)));
        assert!(!ring.focus(&mut tree, foreign));
        assert_eq!(tree.focused(), None);
    }

    #[test]
    fn ensure_focus_recovers_when_focused_node_left_the_ring() {
        let (mut tree, mut ring, members) = three_leaf_tree();
        ring.focus(&mut tree, members[1]);
        // Reconcile away node 1; ring stays stale until rebuilt.
        let root = tree.reconcile(Desc::new(Stack).with_children(vec![Desc::new(Leaf(true))]));
        ring.rebuild(&tree);
        assert!(ring.ensure_focus(&mut tree));
        assert_eq!(tree.focused(), Some(tree.children(root)[0]));
    }

    struct ZContainer;
    impl Widget for ZContainer {
        fn layout(&self) -> Option<Layout> {
            Some(Layout::ZStack)
        }
        fn render(&self, _grid: &mut Grid, _bounds: Rect) {}
    }

    #[test]
    fn hit_test_prefers_topmost_member() {
        let mut tree = Tree::new();
        let root = tree.reconcile(Desc::new(ZContainer).with_children(vec![
            Desc::new(Leaf(true)),
            Desc::new(Leaf(true)),
        ]));
        tree.layout(Rect::new(0, 0, 10, 10));
        let mut ring = FocusRing::new();
        ring.rebuild(&tree);
        let members = tree.children(root).to_vec();
        let hit = ring.hit_test(&tree, 1, 1);
        assert_eq!(hit, Some(members[1]));
    }
}
