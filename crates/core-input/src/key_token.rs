use core_events::{Key, KeyEvent, Modifiers};
use crossterm::event::{
    KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyEventKind as CKeyEventKind,
    KeyModifiers as CKeyModifiers,
};

/// Maps a crossterm key event into a [`core_events::KeyEvent`].
///
/// Returns `None` for key codes we do not represent (media keys, caps
/// lock and friends) and for release events, which crossterm only
/// reports when the kitty keyboard protocol is negotiated.
pub(crate) fn map_key_event(event: &CKeyEvent) -> Option<KeyEvent> {
    if matches!(event.kind, CKeyEventKind::Release) {
        return None;
    }
    let key = map_key_code(&event.code)?;
    let mods = map_modifiers(event.modifiers);
    let text = key_text(&event.code, mods);
    Some(KeyEvent::new(key, text, mods))
}

fn map_key_code(code: &CKeyCode) -> Option<Key> {
    let key = match code {
        CKeyCode::Char(' ') => Key::Space,
        CKeyCode::Char(c) => Key::Char(*c),
        CKeyCode::Enter => Key::Enter,
        CKeyCode::Esc => Key::Escape,
        CKeyCode::Backspace => Key::Backspace,
        CKeyCode::Tab | CKeyCode::BackTab => Key::Tab,
        CKeyCode::Up => Key::Up,
        CKeyCode::Down => Key::Down,
        CKeyCode::Left => Key::Left,
        CKeyCode::Right => Key::Right,
        CKeyCode::Home => Key::Home,
        CKeyCode::End => Key::End,
        CKeyCode::PageUp => Key::PageUp,
        CKeyCode::PageDown => Key::PageDown,
        CKeyCode::Insert => Key::Insert,
        CKeyCode::Delete => Key::Delete,
        CKeyCode::F(n) => Key::Function(*n),
        CKeyCode::KeypadBegin => return None,
        CKeyCode::Media(_) => return None,
        CKeyCode::Null
        | CKeyCode::CapsLock
        | CKeyCode::ScrollLock
        | CKeyCode::NumLock
        | CKeyCode::PrintScreen
        | CKeyCode::Pause
        | CKeyCode::Menu
        | CKeyCode::Modifier(_) => return None,
    };
    Some(key)
}

fn map_modifiers(mods: CKeyModifiers) -> Modifiers {
    let mut out = Modifiers::empty();
    if mods.contains(CKeyModifiers::SHIFT) {
        out |= Modifiers::SHIFT;
    }
    if mods.contains(CKeyModifiers::ALT) {
        out |= Modifiers::ALT;
    }
    if mods.contains(CKeyModifiers::CONTROL) {
        out |= Modifiers::CONTROL;
    }
    out
}

/// The literal text a keystroke inserts, if any. Only plain characters
/// (optionally shifted) produce text; everything else is empty, letting
/// the router fall through to named-key bindings instead of a character
/// binding.
fn key_text(code: &CKeyCode, mods: Modifiers) -> String {
    if mods.contains(Modifiers::CONTROL) || mods.contains(Modifiers::ALT) {
        return String::new();
    }
    match code {
        CKeyCode::Char(c) => c.to_string(),
        _ => String::new(),
    }
}
