//! Terminal backend abstraction and crossterm implementation.
//!
//! Owns the terminal's lifecycle (raw mode, alternate screen, cursor
//! visibility, mouse tracking) and the handful of escape sequences the core
//! emits outside the cell-diffing path: mouse tracking enable/disable and
//! OSC 52 clipboard writes. Every entry point restores terminal state on
//! every exit path, including panic, via `TerminalGuard` and `Drop`.

use anyhow::Result;
use base64::Engine;
use crossterm::{
    cursor::Hide,
    cursor::Show,
    execute,
    terminal::{
        EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode, enable_raw_mode,
    },
};
use std::io::{Write, stdout};

pub mod capabilities;
pub use capabilities::TerminalCapabilities;

/// SGR extended mouse mode: button tracking (1000), any-motion tracking
/// (1003), and the extended coordinate encoding (1006).
const MOUSE_ENABLE: &str = "\x1b[?1000h\x1b[?1002h\x1b[?1003h\x1b[?1006h";
const MOUSE_DISABLE: &str = "\x1b[?1006l\x1b[?1003l\x1b[?1002l\x1b[?1000l";
const DA1_QUERY: &str = "\x1b[c";

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
    fn set_title(&mut self, title: &str) -> Result<()>;
    fn enable_mouse_tracking(&mut self) -> Result<()>;
    fn disable_mouse_tracking(&mut self) -> Result<()>;
    fn query_capabilities(&mut self) -> Result<()>;
    fn write_clipboard(&mut self, text: &str) -> Result<()>;
}

pub struct CrosstermBackend {
    entered: bool,
    mouse_enabled: bool,
}

/// RAII guard ensuring terminal state restoration even if the caller
/// early-returns or panics.
pub struct TerminalGuard<'a> {
    backend: &'a mut CrosstermBackend,
    active: bool,
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermBackend {
    pub fn new() -> Self {
        Self {
            entered: false,
            mouse_enabled: false,
        }
    }

    /// Enters the terminal and returns a guard that leaves on drop.
    pub fn enter_guard(&mut self) -> Result<TerminalGuard<'_>> {
        self.enter()?;
        Ok(TerminalGuard {
            backend: self,
            active: true,
        })
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        if !self.entered {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide)?;
            self.entered = true;
            tracing::info!(target: "terminal.lifecycle", "entered alternate screen");
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.entered {
            if self.mouse_enabled {
                let _ = self.disable_mouse_tracking();
            }
            execute!(stdout(), LeaveAlternateScreen, Show)?;
            disable_raw_mode()?;
            self.entered = false;
            tracing::info!(target: "terminal.lifecycle", "left alternate screen");
        }
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        execute!(stdout(), SetTitle(title))?;
        Ok(())
    }

    fn enable_mouse_tracking(&mut self) -> Result<()> {
        write!(stdout(), "{MOUSE_ENABLE}")?;
        stdout().flush()?;
        self.mouse_enabled = true;
        Ok(())
    }

    fn disable_mouse_tracking(&mut self) -> Result<()> {
        write!(stdout(), "{MOUSE_DISABLE}")?;
        stdout().flush()?;
        self.mouse_enabled = false;
        Ok(())
    }

    fn query_capabilities(&mut self) -> Result<()> {
        write!(stdout(), "{DA1_QUERY}")?;
        stdout().flush()?;
        Ok(())
    }

    fn write_clipboard(&mut self, text: &str) -> Result<()> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(text);
        write!(stdout(), "\x1b]52;c;{encoded}\x1b\\")?;
        stdout().flush()?;
        Ok(())
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl Drop for TerminalGuard<'_> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.backend.leave();
        }
    }
}

impl TerminalGuard<'_> {
    pub fn backend_mut(&mut self) -> &mut CrosstermBackend {
        self.backend
    }
}
