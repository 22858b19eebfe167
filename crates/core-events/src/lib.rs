//! Platform-independent input event types, plus the channel plumbing used
//! to get them from the terminal into the render loop.
//!
//! `Key`/`Modifiers`/`KeyStep`/`KeyEvent`/`MouseEvent` are the vocabulary
//! shared by the binding model, the router, and the input backend; none of
//! them depend on any particular terminal library's own event enum.

use std::fmt;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT   = 0b0000_0001;
        const ALT     = 0b0000_0010;
        const CONTROL = 0b0000_0100;
    }
}

impl Modifiers {
    /// Shift and Control may not both be required by a single binding. This
    /// does not reject events (a real keypress can carry both); it is the
    /// check a binding constructor runs over its own requirement.
    pub fn is_valid_requirement(self) -> bool {
        !(self.contains(Modifiers::SHIFT) && self.contains(Modifiers::CONTROL))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumpadKey {
    N0,
    N1,
    N2,
    N3,
    N4,
    N5,
    N6,
    N7,
    N8,
    N9,
    Add,
    Subtract,
    Multiply,
    Divide,
    Decimal,
    Enter,
}

/// Platform-independent key identifier. `Char` covers letters, digits, and
/// punctuation uniformly, matching how terminals themselves report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    None,
    Char(char),
    Function(u8),
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    Backspace,
    Tab,
    Enter,
    Escape,
    Space,
    Numpad(NumpadKey),
}

impl Default for Key {
    fn default() -> Self {
        Key::None
    }
}

/// Pair (Key, Modifiers). Structural equality; this is the chord trie key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyStep {
    pub key: Key,
    pub mods: Modifiers,
}

impl KeyStep {
    pub fn new(key: Key, mods: Modifiers) -> Self {
        Self { key, mods }
    }
}

impl fmt::Display for KeyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}+{:?}", self.mods, self.key)
    }
}

/// A produced keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub text: String,
    pub mods: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key, text: impl Into<String>, mods: Modifiers) -> Self {
        Self {
            key,
            text: text.into(),
            mods,
        }
    }

    pub fn step(&self) -> KeyStep {
        KeyStep::new(self.key, self.mods)
    }

    /// `true` when `text` is non-empty and either multi-grapheme (paste,
    /// emoji, IME) or not itself a control character.
    pub fn is_printable(&self) -> bool {
        if self.text.is_empty() {
            return false;
        }
        let mut chars = self.text.chars();
        let first = chars.next().unwrap();
        chars.next().is_some() || !first.is_control()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    None,
    Left,
    Middle,
    Right,
    ScrollUp,
    ScrollDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseAction {
    Move,
    Down,
    Up,
    Drag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseEvent {
    pub button: MouseButton,
    pub action: MouseAction,
    pub x: u16,
    pub y: u16,
    pub mods: Modifiers,
    pub click_count: u8,
}

impl MouseEvent {
    pub fn new(
        button: MouseButton,
        action: MouseAction,
        x: u16,
        y: u16,
        mods: Modifiers,
        click_count: u8,
    ) -> Self {
        Self {
            button,
            action,
            x,
            y,
            mods,
            click_count: click_count.max(1),
        }
    }
}

/// Normalized input events drained by the render loop each frame.
#[derive(Debug, Clone)]
pub enum InputEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    /// Raw bytes of a terminal capability response (e.g. the DA1 reply),
    /// surfaced so `core-terminal`'s capability detector can consume it.
    TerminalResponse(Vec<u8>),
}

#[derive(Debug, Clone)]
pub enum CommandEvent {
    Quit,
}

/// Top-level event consumed by the render loop.
#[derive(Debug, Clone)]
pub enum Event {
    Input(InputEvent),
    Command(CommandEvent),
    /// Raised by an `invalidate` callback to wake the loop without new input.
    RenderRequested,
    Tick,
    Shutdown,
}

/// Optional hooks observing events at the loop boundary. Default is a no-op;
/// hooks must not block.
pub trait EventHooks: Send + Sync + 'static {
    fn pre_handle(&self, _event: &Event) {}
    fn post_handle(&self, _event: &Event) {}
}

pub struct NoopEventHooks;

impl EventHooks for NoopEventHooks {}

/// An async producer of `Event`s. Implementors spawn one background task
/// that pushes events into the shared channel and must terminate promptly
/// once the channel closes.
pub trait AsyncEventSource: Send + 'static {
    fn name(&self) -> &'static str;
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources, spawned together at startup.
#[derive(Default)]
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    /// Spawns all registered sources, returning their join handles. Callers
    /// should drop their own `Sender` before awaiting these handles during
    /// shutdown, so sources observe the closed channel and exit.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Monotonic tick source used to drive idle housekeeping without polling.
pub struct TickEventSource {
    interval: std::time::Duration,
}

impl TickEventSource {
    pub fn new(interval: std::time::Duration) -> Self {
        Self { interval }
    }
}

impl AsyncEventSource for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).await.is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn key_event_is_printable_for_single_non_control_char() {
        let ev = KeyEvent::new(Key::Char('a'), "a", Modifiers::empty());
        assert!(ev.is_printable());
    }

    #[test]
    fn key_event_not_printable_when_empty() {
        let ev = KeyEvent::new(Key::Enter, "", Modifiers::empty());
        assert!(!ev.is_printable());
    }

    #[test]
    fn key_event_printable_for_multi_grapheme_paste() {
        let ev = KeyEvent::new(Key::None, "hi", Modifiers::empty());
        assert!(ev.is_printable());
    }

    #[test]
    fn key_event_not_printable_for_lone_control_char() {
        let ev = KeyEvent::new(Key::Escape, "\u{1b}", Modifiers::empty());
        assert!(!ev.is_printable());
    }

    #[test]
    fn modifiers_reject_shift_and_control_together() {
        let mods = Modifiers::SHIFT | Modifiers::CONTROL;
        assert!(!mods.is_valid_requirement());
        assert!((Modifiers::SHIFT | Modifiers::ALT).is_valid_requirement());
    }

    #[test]
    fn mouse_event_click_count_floors_at_one() {
        let ev = MouseEvent::new(MouseButton::Left, MouseAction::Down, 1, 1, Modifiers::empty(), 0);
        assert_eq!(ev.click_count, 1);
    }

    #[tokio::test]
    async fn tick_source_emits_until_channel_closes() {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Event>(8);
        let mut registry = EventSourceRegistry::new();
        registry.register(TickEventSource::new(std::time::Duration::from_millis(5)));
        let handles = registry.spawn_all(&tx);

        let ev = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv())
            .await
            .expect("tick within timeout")
            .expect("channel open");
        assert!(matches!(ev, Event::Tick));

        drop(tx);
        drop(rx);
        for handle in handles {
            let _ = tokio::time::timeout(std::time::Duration::from_millis(50), handle).await;
        }
    }
}
