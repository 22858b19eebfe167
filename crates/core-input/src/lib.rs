//! Async crossterm-backed input source, click-count computation, and a
//! standalone SGR mouse protocol codec.

mod async_service;
mod click;
mod key_token;
pub mod mouse_proto;

pub use async_service::{InputShutdown, TerminalInputSource};
pub use click::{ClickCounter, DEFAULT_THRESHOLD};
