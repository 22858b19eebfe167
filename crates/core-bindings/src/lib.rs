//! Value types for key, character, mouse, and drag bindings, plus the
//! `ChordTrie` prefix tree used to resolve multi-step key chords.
//!
//! Binding handlers are generic over an application-supplied context type
//! `Ctx` (the router's action context) so this crate never depends on the
//! node tree: a node's owning identity is carried only as an opaque
//! [`NodeRef`], not a live reference.
//!
//! Resolution depends only on the trie and the key sequence fed to it; the
//! trie itself is pure and holds no pending state across lookups (that
//! state lives in the router).

use smallvec::SmallVec;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

pub use core_events::{Key, KeyEvent, KeyStep, Modifiers, MouseAction, MouseButton, MouseEvent};

/// Opaque, non-owning reference to the node that declared a binding. Used
/// only for diagnostics (e.g. naming the two owners of a global conflict);
/// dereferencing it is the node tree's responsibility, not this crate's.
pub type NodeRef = u64;

/// A handler's return type: a single-threaded boxed future, matching the
/// cooperative, single-task scheduling model the router runs under.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()>>>;

/// Handlers take `Ctx` by value rather than `&mut Ctx`: the router dispatches
/// at most one winning handler per event and the returned future may suspend
/// across frames, so `Ctx` must be an owned, cheaply-cloned handle (an
/// `ActionContext` wraps its shared state in `Rc`/`RefCell`) rather than a
/// borrow tied to the synchronous call that produced the future.
pub type Handler<Ctx> = Rc<dyn Fn(Ctx) -> HandlerFuture>;
pub type CharHandler<Ctx> = Rc<dyn Fn(Ctx, String) -> HandlerFuture>;
pub type MouseHandler<Ctx> = Rc<dyn Fn(Ctx, MouseEvent) -> HandlerFuture>;

/// Drag callbacks fire once per pixel of pointer movement; kept synchronous
/// rather than future-returning so a drag in progress never has to wait on a
/// previous step's suspension.
pub type OnDragMove<Ctx> = Rc<dyn Fn(Ctx, i32, i32)>;
pub type OnDragEnd<Ctx> = Rc<dyn Fn(Ctx)>;
/// `None` signals drag rejection from the factory.
pub type DragHandler<Ctx> = Option<(OnDragMove<Ctx>, OnDragEnd<Ctx>)>;
pub type DragFactory<Ctx> = Rc<dyn Fn(Ctx, u16, u16) -> DragHandler<Ctx>>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("a binding's key steps may not require both Shift and Control")]
    MutuallyExclusiveModifiers,
    #[error("a binding must declare at least one key step")]
    EmptyStepSequence,
}

/// A key (possibly multi-step chord) binding.
pub struct Binding<Ctx> {
    pub steps: SmallVec<[KeyStep; 2]>,
    pub handler: Handler<Ctx>,
    pub description: Option<String>,
    pub is_global: bool,
    pub owner: Option<NodeRef>,
}

impl<Ctx> Binding<Ctx> {
    pub fn new(
        steps: impl IntoIterator<Item = KeyStep>,
        handler: Handler<Ctx>,
    ) -> Result<Self, BindingError> {
        let steps: SmallVec<[KeyStep; 2]> = steps.into_iter().collect();
        if steps.is_empty() {
            return Err(BindingError::EmptyStepSequence);
        }
        if steps.iter().any(|s| !s.mods.is_valid_requirement()) {
            return Err(BindingError::MutuallyExclusiveModifiers);
        }
        Ok(Self {
            steps,
            handler,
            description: None,
            is_global: false,
            owner: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn global(mut self) -> Self {
        self.is_global = true;
        self
    }

    pub fn owned_by(mut self, owner: NodeRef) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn first_step(&self) -> KeyStep {
        self.steps[0]
    }
}

/// A predicate on a text string plus a handler. Used for "any printable
/// character" input; linear-scanned, first match wins, only at the
/// focused node.
pub struct CharacterBinding<Ctx> {
    pub predicate: Rc<dyn Fn(&str) -> bool>,
    pub handler: CharHandler<Ctx>,
}

impl<Ctx> CharacterBinding<Ctx> {
    pub fn new(predicate: Rc<dyn Fn(&str) -> bool>, handler: CharHandler<Ctx>) -> Self {
        Self { predicate, handler }
    }

    pub fn matches(&self, text: &str) -> bool {
        (self.predicate)(text)
    }
}

/// Matches a mouse event whose click_count is >= `min_click_count`.
pub struct MouseBinding<Ctx> {
    pub button: MouseButton,
    pub action: MouseAction,
    pub mods: Modifiers,
    pub min_click_count: u8,
    pub handler: MouseHandler<Ctx>,
}

impl<Ctx> MouseBinding<Ctx> {
    pub fn new(
        button: MouseButton,
        action: MouseAction,
        mods: Modifiers,
        min_click_count: u8,
        handler: MouseHandler<Ctx>,
    ) -> Self {
        Self {
            button,
            action,
            mods,
            min_click_count: min_click_count.max(1),
            handler,
        }
    }

    pub fn matches(&self, event: &MouseEvent) -> bool {
        event.button == self.button
            && event.action == self.action
            && event.mods == self.mods
            && event.click_count >= self.min_click_count
    }
}

/// A drag initiator. `factory` runs at mouse-down; an empty return declines
/// the drag.
pub struct DragBinding<Ctx> {
    pub button: MouseButton,
    pub mods: Modifiers,
    pub factory: DragFactory<Ctx>,
}

impl<Ctx> DragBinding<Ctx> {
    pub fn new(button: MouseButton, mods: Modifiers, factory: DragFactory<Ctx>) -> Self {
        Self {
            button,
            mods,
            factory,
        }
    }

    pub fn matches(&self, button: MouseButton, mods: Modifiers) -> bool {
        self.button == button && self.mods == mods
    }
}

/// Collects bindings declared by a node during one `build_bindings` call.
pub struct BindingBuilder<Ctx> {
    keys: Vec<Binding<Ctx>>,
    characters: Vec<CharacterBinding<Ctx>>,
    mice: Vec<MouseBinding<Ctx>>,
    drags: Vec<DragBinding<Ctx>>,
}

impl<Ctx> Default for BindingBuilder<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> BindingBuilder<Ctx> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            characters: Vec::new(),
            mice: Vec::new(),
            drags: Vec::new(),
        }
    }

    pub fn key(&mut self, binding: Binding<Ctx>) -> &mut Self {
        self.keys.push(binding);
        self
    }

    pub fn character(&mut self, binding: CharacterBinding<Ctx>) -> &mut Self {
        self.characters.push(binding);
        self
    }

    pub fn mouse(&mut self, binding: MouseBinding<Ctx>) -> &mut Self {
        self.mice.push(binding);
        self
    }

    pub fn drag(&mut self, binding: DragBinding<Ctx>) -> &mut Self {
        self.drags.push(binding);
        self
    }

    pub fn keys(&self) -> &[Binding<Ctx>] {
        &self.keys
    }

    pub fn characters(&self) -> &[CharacterBinding<Ctx>] {
        &self.characters
    }

    pub fn mice(&self) -> &[MouseBinding<Ctx>] {
        &self.mice
    }

    pub fn drags(&self) -> &[DragBinding<Ctx>] {
        &self.drags
    }

    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        Vec<Binding<Ctx>>,
        Vec<CharacterBinding<Ctx>>,
        Vec<MouseBinding<Ctx>>,
        Vec<DragBinding<Ctx>>,
    ) {
        (self.keys, self.characters, self.mice, self.drags)
    }
}

/// Opaque handle into a `ChordTrie`'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordNode(usize);

struct TrieNode<Ctx> {
    terminal: Option<Binding<Ctx>>,
    edges: SmallVec<[(KeyStep, usize); 4]>,
}

impl<Ctx> TrieNode<Ctx> {
    fn new() -> Self {
        Self {
            terminal: None,
            edges: SmallVec::new(),
        }
    }
}

/// Result of a single trie lookup, matching the §4.4 contract:
/// {match, is_leaf, has_action, has_children, node-reference}.
#[derive(Debug, Clone, Copy)]
pub struct Lookup {
    pub node: Option<ChordNode>,
    pub is_leaf: bool,
    pub has_action: bool,
    pub has_children: bool,
}

impl Lookup {
    pub fn matched(&self) -> bool {
        self.node.is_some()
    }
}

/// Prefix tree keyed by `KeyStep`, built by inserting all the bindings from
/// a source set. Later insertions at the same terminal override earlier
/// ones.
pub struct ChordTrie<Ctx> {
    nodes: Vec<TrieNode<Ctx>>,
}

impl<Ctx> Default for ChordTrie<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> ChordTrie<Ctx> {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::new()],
        }
    }

    pub fn root(&self) -> ChordNode {
        ChordNode(0)
    }

    /// Builds a trie from an iterator of bindings, in order.
    pub fn build(bindings: impl IntoIterator<Item = Binding<Ctx>>) -> Self {
        let mut trie = Self::new();
        for binding in bindings {
            trie.insert(binding);
        }
        trie
    }

    /// Walks the trie by `binding.steps`; stores the binding at the
    /// terminal node. A pre-existing terminal at that node is replaced.
    pub fn insert(&mut self, binding: Binding<Ctx>) {
        let mut cur = 0usize;
        for step in binding.steps.clone() {
            cur = match self.nodes[cur].edges.iter().find(|(s, _)| *s == step) {
                Some((_, next)) => *next,
                None => {
                    let idx = self.nodes.len();
                    self.nodes.push(TrieNode::new());
                    self.nodes[cur].edges.push((step, idx));
                    idx
                }
            };
        }
        if self.nodes[cur].terminal.is_some() {
            tracing::trace!(target: "bindings.trie", node = cur, "terminal_override");
        }
        self.nodes[cur].terminal = Some(binding);
    }

    fn child(&self, from: ChordNode, step: KeyStep) -> Option<ChordNode> {
        self.nodes[from.0]
            .edges
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, next)| ChordNode(*next))
    }

    pub fn has_action(&self, node: ChordNode) -> bool {
        self.nodes[node.0].terminal.is_some()
    }

    pub fn has_children(&self, node: ChordNode) -> bool {
        !self.nodes[node.0].edges.is_empty()
    }

    pub fn is_leaf(&self, node: ChordNode) -> bool {
        self.has_action(node) && !self.has_children(node)
    }

    pub fn action(&self, node: ChordNode) -> Option<&Binding<Ctx>> {
        self.nodes[node.0].terminal.as_ref()
    }

    /// Looks up `step` from `from`, advancing one level.
    pub fn lookup(&self, from: ChordNode, step: KeyStep) -> Lookup {
        match self.child(from, step) {
            Some(node) => Lookup {
                node: Some(node),
                is_leaf: self.is_leaf(node),
                has_action: self.has_action(node),
                has_children: self.has_children(node),
            },
            None => Lookup {
                node: None,
                is_leaf: false,
                has_action: false,
                has_children: false,
            },
        }
    }

    /// Constructs a `KeyStep` from `event` and delegates to `lookup`.
    pub fn lookup_event(&self, from: ChordNode, event: &KeyEvent) -> Lookup {
        self.lookup(from, event.step())
    }
}
