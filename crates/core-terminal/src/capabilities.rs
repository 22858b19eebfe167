//! Terminal capability probing.
//!
//! [`TerminalCapabilities::detect`] returns the optimistic defaults used
//! before any terminal has answered the DA1 query `core_terminal` sends on
//! startup (`DA1_QUERY`). [`TerminalCapabilities::from_da1_response`] parses
//! the reply (`ESC[?<id>;<ext>;...c`) and is the real capability source once
//! it arrives; a terminal that completes the DA1 handshake at all implements
//! at least VT102, which includes scroll regions (DECSTBM), so any
//! well-formed reply confirms `supports_scroll_region`.
//!
//! Extensible: struct is non-exhaustive so additional capabilities can be
//! read from the same response's extension parameters without breaking
//! downstream code.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct TerminalCapabilities {
    pub supports_scroll_region: bool,
}

impl TerminalCapabilities {
    /// Optimistic defaults assumed before a DA1 reply has arrived (or for a
    /// terminal that never answers one at all).
    pub fn detect() -> Self {
        Self {
            supports_scroll_region: true,
        }
    }

    /// Parses a DA1 reply (`ESC[?<id>;<ext1>;<ext2>;...c`). Returns `None`
    /// if `bytes` isn't a well-formed CSI `c`-terminated response, in which
    /// case callers should keep whatever capabilities they already had.
    pub fn from_da1_response(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?;
        let body = text.strip_prefix("\x1b[?")?;
        let body = body.strip_suffix('c')?;
        if body.is_empty() || !body.split(';').all(|part| part.chars().all(|c| c.is_ascii_digit())) {
            return None;
        }
        Some(Self {
            supports_scroll_region: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_sets_scroll_region_true() {
        let caps = TerminalCapabilities::detect();
        assert!(caps.supports_scroll_region);
    }

    #[test]
    fn parses_a_well_formed_da1_reply() {
        let caps = TerminalCapabilities::from_da1_response(b"\x1b[?62;1;2;6c").unwrap();
        assert!(caps.supports_scroll_region);
    }

    #[test]
    fn rejects_a_reply_missing_the_csi_prefix() {
        assert!(TerminalCapabilities::from_da1_response(b"?62;1c").is_none());
    }

    #[test]
    fn rejects_a_reply_missing_the_terminator() {
        assert!(TerminalCapabilities::from_da1_response(b"\x1b[?62;1").is_none());
    }

    #[test]
    fn rejects_non_numeric_parameters() {
        assert!(TerminalCapabilities::from_da1_response(b"\x1b[?62;x;1c").is_none());
    }
}
