//! SGR extended mouse protocol (`ESC[<Cb;Cx;Cy(M|m)`) parse/serialize.
//!
//! `Cb` is a bitfield: bits 0-1 select the button (`00` left, `01` middle,
//! `10` right, `11` none/release), bit 2 Shift, bit 3 Alt, bit 4 Control,
//! bit 5 motion (drag), bit 6 scroll (with the button field giving
//! direction: 0 up, 1 down). `Cx`/`Cy` are 1-based; this module returns
//! and accepts 0-based coordinates, subtracting/adding the 1 at the edge.
//! The trailing byte is `M` for press/drag/move, `m` for release.
//!
//! Click-count is not part of the wire protocol; callers fill in `1` and
//! let [`crate::click::ClickCounter`] upgrade it afterward.

use core_events::{Modifiers, MouseAction, MouseButton, MouseEvent};

const CB_BUTTON_MASK: u8 = 0b0000_0011;
const CB_SHIFT: u8 = 0b0000_0100;
const CB_ALT: u8 = 0b0000_1000;
const CB_CONTROL: u8 = 0b0001_0000;
const CB_MOTION: u8 = 0b0010_0000;
const CB_SCROLL: u8 = 0b0100_0000;

/// Parses a complete SGR mouse sequence body, i.e. everything between
/// `ESC[<` and the trailing `M`/`m`, already split from the terminal
/// stream by the caller. Returns `None` for malformed input.
pub fn parse(body: &str, release: bool) -> Option<MouseEvent> {
    let mut parts = body.split(';');
    let cb: u8 = parts.next()?.parse().ok()?;
    let cx: u16 = parts.next()?.parse().ok()?;
    let cy: u16 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let mut mods = Modifiers::empty();
    if cb & CB_SHIFT != 0 {
        mods |= Modifiers::SHIFT;
    }
    if cb & CB_ALT != 0 {
        mods |= Modifiers::ALT;
    }
    if cb & CB_CONTROL != 0 {
        mods |= Modifiers::CONTROL;
    }

    let is_scroll = cb & CB_SCROLL != 0;
    let is_motion = cb & CB_MOTION != 0;
    let button_bits = cb & CB_BUTTON_MASK;

    let (button, action) = if is_scroll {
        let button = if button_bits == 1 {
            MouseButton::ScrollDown
        } else {
            MouseButton::ScrollUp
        };
        (button, MouseAction::Down)
    } else if is_motion && button_bits == 3 {
        (MouseButton::None, MouseAction::Move)
    } else {
        let button = match button_bits {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::None,
        };
        let action = if is_motion {
            MouseAction::Drag
        } else if release {
            MouseAction::Up
        } else {
            MouseAction::Down
        };
        (button, action)
    };

    Some(MouseEvent::new(
        button,
        action,
        cx.saturating_sub(1),
        cy.saturating_sub(1),
        mods,
        1,
    ))
}

/// Serializes a [`MouseEvent`] back into an SGR sequence body plus its
/// trailing byte, the inverse of [`parse`]. `Move` with no buttons held
/// serializes as a motion report with the "no button" bit pattern.
pub fn serialize(event: &MouseEvent) -> (String, char) {
    let mut cb: u8 = match event.button {
        MouseButton::Left => 0,
        MouseButton::Middle => 1,
        MouseButton::Right => 2,
        MouseButton::None => 3,
        MouseButton::ScrollUp => 0,
        MouseButton::ScrollDown => 1,
    };

    if matches!(event.button, MouseButton::ScrollUp | MouseButton::ScrollDown) {
        cb |= CB_SCROLL;
    }
    if matches!(event.action, MouseAction::Move) {
        cb |= CB_BUTTON_MASK;
    }
    if matches!(event.action, MouseAction::Drag | MouseAction::Move) {
        cb |= CB_MOTION;
    }
    if event.mods.contains(Modifiers::SHIFT) {
        cb |= CB_SHIFT;
    }
    if event.mods.contains(Modifiers::ALT) {
        cb |= CB_ALT;
    }
    if event.mods.contains(Modifiers::CONTROL) {
        cb |= CB_CONTROL;
    }

    let final_byte = if matches!(event.action, MouseAction::Up) {
        'm'
    } else {
        'M'
    };

    (
        format!("{cb};{};{}", event.x as u32 + 1, event.y as u32 + 1),
        final_byte,
    )
}

/// Full escape sequence for `event`, as the terminal would emit it.
pub fn encode(event: &MouseEvent) -> String {
    let (body, tail) = serialize(event);
    format!("\x1b[<{body}{tail}")
}
