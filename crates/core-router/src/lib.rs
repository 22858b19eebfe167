//! Key and mouse routing: the priority order that decides which binding (if
//! any) wins a given input event, and the small state machine that tracks a
//! pending multi-step chord across events.
//!
//! The router never polls a handler's returned future itself; it hands the
//! future back to its caller (the render loop) to spawn on the local task
//! set, since this crate has no opinion on how suspension is scheduled.

use std::rc::Rc;

use core_bindings::{
    Binding, BindingBuilder, ChordTrie, HandlerFuture, NodeRef, OnDragEnd, OnDragMove,
};
use core_events::{Key, KeyEvent, KeyStep, MouseAction, MouseEvent};
use core_tree::{ActionContext, FocusRing, Handled, InputEvent, NodeId, Tree};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("global bindings on nodes {first:?} and {second:?} share the first key step {step}")]
    GlobalBindingConflict {
        first: NodeRef,
        second: NodeRef,
        step: KeyStep,
    },
}

/// Outcome of a single `route_key`/`route_mouse` call.
pub enum RouteOutcome {
    /// The event was consumed. `future`, if present, is a handler's returned
    /// future that must be polled to completion by the caller (typically via
    /// `tokio::task::spawn_local`).
    Handled { future: Option<HandlerFuture> },
    NotHandled,
}

impl RouteOutcome {
    fn handled() -> Self {
        RouteOutcome::Handled { future: None }
    }

    fn handled_with(future: HandlerFuture) -> Self {
        RouteOutcome::Handled { future: Some(future) }
    }

    pub fn is_handled(&self) -> bool {
        matches!(self, RouteOutcome::Handled { .. })
    }
}

/// Idle vs. pending-chord, raised on every transition so a UI can show a
/// "pending chord" indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    MidChord,
}

struct ChordState {
    anchor_path: Vec<NodeId>,
    layer_index: usize,
    steps: Vec<KeyStep>,
}

struct DragCapture {
    on_move: OnDragMove<ActionContext>,
    on_end: OnDragEnd<ActionContext>,
    last: (u16, u16),
}

/// Per-app router state: at most one pending chord, at most one captured
/// drag. Both are exclusively owned by the loop driving `route_key` /
/// `route_mouse`.
pub struct Router {
    chord: Option<ChordState>,
    drag: Option<DragCapture>,
    on_phase_changed: Option<Rc<dyn Fn(Phase)>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            chord: None,
            drag: None,
            on_phase_changed: None,
        }
    }

    pub fn on_phase_changed(mut self, callback: Rc<dyn Fn(Phase)>) -> Self {
        self.on_phase_changed = Some(callback);
        self
    }

    pub fn phase(&self) -> Phase {
        if self.chord.is_some() { Phase::MidChord } else { Phase::Idle }
    }

    fn enter_chord(&mut self, anchor_path: Vec<NodeId>, layer_index: usize, first: KeyStep) {
        self.chord = Some(ChordState { anchor_path, layer_index, steps: vec![first] });
        self.signal(Phase::MidChord);
    }

    fn reset(&mut self) {
        if self.chord.take().is_some() {
            self.signal(Phase::Idle);
        }
    }

    fn signal(&self, phase: Phase) {
        if let Some(cb) = &self.on_phase_changed {
            cb(phase);
        }
        tracing::trace!(target: "router.chord", ?phase, "phase_changed");
    }

    /// Depth-first (here: parent-walk) path from root to `focused`, or the
    /// root-to-leftmost-child chain if nothing is focused.
    fn build_path(tree: &Tree, focused: Option<NodeId>) -> Vec<NodeId> {
        match focused {
            Some(leaf) => {
                let mut path = Vec::new();
                let mut cur = Some(leaf);
                while let Some(id) = cur {
                    path.push(id);
                    cur = tree.parent(id);
                }
                path.reverse();
                path
            }
            None => {
                let mut path = Vec::new();
                let Some(root) = tree.root() else { return path };
                let mut cur = root;
                loop {
                    path.push(cur);
                    match tree.children(cur).first() {
                        Some(&child) => cur = child,
                        None => break,
                    }
                }
                path
            }
        }
    }

    fn node_bindings(tree: &Tree, node: NodeId) -> BindingBuilder<ActionContext> {
        let mut builder = BindingBuilder::new();
        tree.build_bindings(node, &mut builder);
        builder
    }

    /// Walks the whole tree collecting `is_global` key bindings, failing if
    /// two different nodes declare the same first step.
    fn collect_globals(tree: &Tree) -> Result<Vec<Binding<ActionContext>>, RouterError> {
        let mut globals = Vec::new();
        let mut seen: Vec<(KeyStep, NodeRef)> = Vec::new();
        if let Some(root) = tree.root() {
            Self::collect_globals_rec(tree, root, &mut globals, &mut seen)?;
        }
        Ok(globals)
    }

    fn collect_globals_rec(
        tree: &Tree,
        node: NodeId,
        out: &mut Vec<Binding<ActionContext>>,
        seen: &mut Vec<(KeyStep, NodeRef)>,
    ) -> Result<(), RouterError> {
        let (keys, _, _, _) = Self::node_bindings(tree, node).into_parts();
        for binding in keys {
            if binding.is_global {
                let step = binding.first_step();
                let owner = binding.owner.unwrap_or_else(|| node.to_node_ref());
                if let Some((_, other)) = seen.iter().find(|(s, _)| *s == step) {
                    return Err(RouterError::GlobalBindingConflict {
                        first: *other,
                        second: owner,
                        step,
                    });
                }
                seen.push((step, owner));
                out.push(binding);
            }
        }
        for &child in tree.children(node) {
            Self::collect_globals_rec(tree, child, out, seen)?;
        }
        Ok(())
    }

    /// Routes one key event through the global pass, chord continuation (if
    /// mid-chord), the focused-first layered lookup, and finally the bubble
    /// fallback. See the module-level algorithm this mirrors.
    pub fn route_key(
        &mut self,
        tree: &mut Tree,
        event: &KeyEvent,
        ctx: &ActionContext,
    ) -> Result<RouteOutcome, RouterError> {
        let globals = Self::collect_globals(tree)?;
        let global_trie = ChordTrie::build(globals);
        let global_lookup = global_trie.lookup_event(global_trie.root(), event);
        if global_lookup.matched() {
            if global_lookup.is_leaf {
                let future = Self::fire(&global_trie, global_lookup.node.unwrap(), None, ctx);
                self.reset();
                return Ok(RouteOutcome::handled_with(future));
            }
            if global_lookup.has_children {
                return Ok(RouteOutcome::handled());
            }
        }

        let path = Self::build_path(tree, tree.focused());

        if matches!(event.key, Key::Escape) && self.chord.is_some() {
            self.reset();
            return Ok(RouteOutcome::handled());
        }
        if let Some(chord) = &self.chord {
            if chord.anchor_path != path {
                self.reset();
            }
        }

        if self.chord.is_some() {
            return Ok(self.continue_chord(tree, event, ctx));
        }

        for i in (0..path.len()).rev() {
            let node = path[i];
            let (keys, characters, _, _) = Self::node_bindings(tree, node).into_parts();
            let trie = ChordTrie::build(keys);
            let lookup = trie.lookup_event(trie.root(), event);
            if lookup.matched() {
                if lookup.is_leaf {
                    let future = Self::fire(&trie, lookup.node.unwrap(), Some(node), ctx);
                    self.reset();
                    return Ok(RouteOutcome::handled_with(future));
                }
                if lookup.has_children {
                    self.enter_chord(path.clone(), i, event.step());
                    return Ok(RouteOutcome::handled());
                }
            }
            if i == path.len() - 1 {
                if let Some(binding) = characters.iter().find(|c| c.matches(&event.text)) {
                    let handler = binding.handler.clone();
                    let future = handler(ctx.scoped(Some(node), None), event.text.clone());
                    return Ok(RouteOutcome::handled_with(future));
                }
            }
        }

        for &node in path.iter().rev() {
            let input = InputEvent::Key(event.clone());
            let handled = tree
                .widget_mut(node)
                .map(|w| w.handle_input(&input))
                .unwrap_or(Handled::NotHandled);
            if handled == Handled::Handled {
                return Ok(RouteOutcome::handled());
            }
        }
        Ok(RouteOutcome::NotHandled)
    }

    /// Continuation of a pending chord (§4.5 step 5): rebuilds the anchor
    /// node's trie fresh (bindings are not assumed stable across events),
    /// replays the steps accumulated since the chord began, and applies the
    /// new key. A replay that no longer matches (the node's bindings shifted
    /// under the chord) is treated the same as a fresh no-match.
    fn continue_chord(&mut self, tree: &Tree, event: &KeyEvent, ctx: &ActionContext) -> RouteOutcome {
        let chord = self.chord.as_ref().expect("mid-chord");
        let anchor_node = chord.anchor_path[chord.layer_index];
        let (keys, _, _, _) = Self::node_bindings(tree, anchor_node).into_parts();
        let trie = ChordTrie::build(keys);

        let mut cur = trie.root();
        for step in &chord.steps {
            match trie.lookup(cur, *step).node {
                Some(next) => cur = next,
                None => {
                    self.reset();
                    return RouteOutcome::handled();
                }
            }
        }

        let lookup = trie.lookup_event(cur, event);
        if lookup.matched() {
            if lookup.is_leaf {
                let future = Self::fire(&trie, lookup.node.unwrap(), Some(anchor_node), ctx);
                self.reset();
                return RouteOutcome::handled_with(future);
            }
            if lookup.has_children {
                let new_step = event.step();
                if let Some(chord) = &mut self.chord {
                    chord.steps.push(new_step);
                }
                self.signal(Phase::MidChord);
                return RouteOutcome::handled();
            }
        }

        // No edge for this key. If the node we stalled at holds its own
        // action, that's the disambiguation: fire it now.
        let stalled_action = trie.has_action(cur).then(|| Self::fire(&trie, cur, Some(anchor_node), ctx));
        self.reset();
        match stalled_action {
            Some(future) => RouteOutcome::handled_with(future),
            None => RouteOutcome::handled(),
        }
    }

    fn fire(
        trie: &ChordTrie<ActionContext>,
        node: core_bindings::ChordNode,
        owner: Option<NodeId>,
        ctx: &ActionContext,
    ) -> HandlerFuture {
        let binding = trie.action(node).expect("caller verified has_action");
        let handler = binding.handler.clone();
        handler(ctx.scoped(owner, None))
    }

    /// Mouse routing: drag capture takes priority over everything else;
    /// otherwise hit-tests via the focus ring (mouse-down may change focus),
    /// then bubbles drag/mouse bindings from the hit node up to the root.
    pub fn route_mouse(
        &mut self,
        tree: &mut Tree,
        focus_ring: &FocusRing,
        event: MouseEvent,
        ctx: &ActionContext,
    ) -> RouteOutcome {
        if let Some(capture) = &mut self.drag {
            match event.action {
                MouseAction::Drag => {
                    let dx = event.x as i32 - capture.last.0 as i32;
                    let dy = event.y as i32 - capture.last.1 as i32;
                    capture.last = (event.x, event.y);
                    (capture.on_move)(ctx.clone(), dx, dy);
                    return RouteOutcome::handled();
                }
                MouseAction::Up => {
                    (capture.on_end)(ctx.clone());
                    self.drag = None;
                    return RouteOutcome::handled();
                }
                _ => {}
            }
        }

        let hit = focus_ring.hit_test(tree, event.x, event.y);
        if event.action == MouseAction::Down {
            if let Some(node) = hit {
                focus_ring.focus(tree, node);
            }
        }

        let mut cur = hit;
        while let Some(node) = cur {
            let (_, _, mice, drags) = Self::node_bindings(tree, node).into_parts();

            if event.action == MouseAction::Down {
                if let Some(drag_binding) = drags.iter().find(|d| d.matches(event.button, event.mods)) {
                    let factory = drag_binding.factory.clone();
                    if let Some((on_move, on_end)) =
                        factory(ctx.scoped(Some(node), Some((event.x, event.y))), event.x, event.y)
                    {
                        self.drag = Some(DragCapture { on_move, on_end, last: (event.x, event.y) });
                        return RouteOutcome::handled();
                    }
                }
            }

            if let Some(binding) = mice.iter().find(|m| m.matches(&event)) {
                let handler = binding.handler.clone();
                let future = handler(ctx.scoped(Some(node), Some((event.x, event.y))), event);
                return RouteOutcome::handled_with(future);
            }

            cur = tree.parent(node);
        }
        RouteOutcome::NotHandled
    }
}
